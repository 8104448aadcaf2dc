//! Barometric altitude hold.

use micromath::F32Ext;

use crate::config::{Model, ALTITUDE_TASK_PERIOD_US};
use crate::drivers::pid::AxisPid;
use crate::hal::AltitudeHold;
use crate::state::Orientation;

/// Standard sea-level pressure.
const P0_PA: f32 = 101_325.0;
/// Throttle is never divided by less than this when compensating tilt.
const MIN_TILT_FACTOR: f32 = 0.5;

/// Hypsometric altitude above the standard sea-level reference.
pub fn pressure_to_altitude(pressure_pa: f32) -> f32 {
    44_330.0 * (1.0 - (pressure_pa / P0_PA).powf(1.0 / 5.255))
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VerticalState {
    /// Altitude above the first barometer sample, m.
    pub position: f32,
    /// m/s, positive up.
    pub velocity: f32,
}

/// Two-state (position, velocity) Kalman filter with a barometric position measurement.
pub struct VerticalKalman {
    x: [f32; 2],
    p: [[f32; 2]; 2],
    // process noise
    q: [f32; 2],
    // baro noise
    r: f32,
}

impl Default for VerticalKalman {
    fn default() -> Self {
        Self::new()
    }
}

impl VerticalKalman {
    pub fn new() -> Self {
        Self {
            x: [0.0, 0.0],
            p: [[100.0, 0.0], [0.0, 100.0]],
            q: [0.01, 0.1],
            r: 50.0,
        }
    }

    /// `accel_z`: earth-frame vertical acceleration with gravity removed, m/s².
    pub fn predict(&mut self, dt: f32, accel_z: f32) {
        self.x[0] += self.x[1] * dt + 0.5 * accel_z * dt * dt;
        self.x[1] += accel_z * dt;

        // P = F P F' + Q with F = [[1, dt], [0, 1]]
        let [[p00, p01], [p10, p11]] = self.p;
        self.p = [
            [p00 + dt * (p10 + p01) + dt * dt * p11 + self.q[0], p01 + dt * p11],
            [p10 + dt * p11, p11 + self.q[1]],
        ];
    }

    pub fn update(&mut self, measured_alt: f32) {
        let s = self.p[0][0] + self.r;
        let k0 = self.p[0][0] / s;
        let k1 = self.p[1][0] / s;

        let innovation = measured_alt - self.x[0];
        self.x[0] += k0 * innovation;
        self.x[1] += k1 * innovation;

        let [[p00, p01], _] = self.p;
        self.p[0][0] -= k0 * p00;
        self.p[0][1] -= k0 * p01;
        self.p[1][0] -= k1 * p00;
        self.p[1][1] -= k1 * p01;
    }

    pub fn state(&self) -> VerticalState {
        VerticalState {
            position: self.x[0],
            velocity: self.x[1],
        }
    }
}

/// Holds the altitude captured when the aux switch leaves neutral. The pilot's throttle
/// at that moment becomes the hover throttle and the PID trims around it.
pub struct BaroAltitudeHold {
    kalman: VerticalKalman,
    pid: AxisPid,
    dt: f32,
    ground_alt: Option<f32>,
    engaged: bool,
    target_m: f32,
    hover_throttle: f32,
    correction: f32,
    tilt_factor: f32,
    armed: bool,
}

impl BaroAltitudeHold {
    pub fn new(model: &Model) -> Self {
        Self {
            kalman: VerticalKalman::new(),
            pid: AxisPid::new(&model.altitude),
            dt: ALTITUDE_TASK_PERIOD_US as f32 * 1e-6,
            ground_alt: None,
            engaged: false,
            target_m: 0.0,
            hover_throttle: 0.0,
            correction: 0.0,
            tilt_factor: 1.0,
            armed: false,
        }
    }

    pub fn engaged(&self) -> bool {
        self.engaged
    }

    pub fn estimate(&self) -> VerticalState {
        self.kalman.state()
    }

    pub fn target(&self) -> f32 {
        self.target_m
    }
}

impl Default for BaroAltitudeHold {
    fn default() -> Self {
        Self::new(&Model::default())
    }
}

impl AltitudeHold for BaroAltitudeHold {
    fn init(&mut self, model: &Model) {
        *self = Self::new(model);
    }

    fn compute_pid(&mut self, armed: bool, pressure_pa: Option<f32>) {
        self.kalman.predict(self.dt, 0.0);

        if let Some(pressure) = pressure_pa {
            let alt = pressure_to_altitude(pressure);
            let ground = *self.ground_alt.get_or_insert(alt);
            self.kalman.update(alt - ground);
        }

        if self.engaged && armed {
            let est = self.kalman.state();
            self.correction = self.pid.update(self.dt, self.target_m, est.position, est.velocity);
        } else {
            self.pid.reset();
            self.correction = 0.0;
        }
    }

    fn handle_aux_switch(&mut self, aux_state: u8, throttle: f32) {
        match (aux_state > 0, self.engaged) {
            (true, false) => {
                self.engaged = true;
                self.target_m = self.kalman.state().position;
                self.hover_throttle = throttle.clamp(0.0, 1.0);
                self.pid.reset();
                self.correction = 0.0;
                info!("altitude hold engaged at {} m", self.target_m);
            }
            (false, true) => {
                self.engaged = false;
                self.correction = 0.0;
                info!("altitude hold released");
            }
            _ => {}
        }
    }

    fn fuse_with_imu(&mut self, orientation: &Orientation, armed: bool) {
        self.armed = armed;
        self.tilt_factor = (orientation.roll.cos() * orientation.pitch.cos()).max(MIN_TILT_FACTOR);
    }

    fn modify_demand(&mut self, throttle: &mut f32) {
        if self.engaged && self.armed {
            *throttle = ((self.hover_throttle + self.correction) / self.tilt_factor).clamp(0.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUND_PA: f32 = 100_000.0;
    // ~10 m above ground
    const RAISED_PA: f32 = 99_880.0;

    fn settle(hold: &mut BaroAltitudeHold, armed: bool, pressure: f32, steps: usize) {
        for _ in 0..steps {
            hold.compute_pid(armed, Some(pressure));
        }
    }

    fn level(hold: &mut BaroAltitudeHold, armed: bool) {
        hold.fuse_with_imu(&Orientation::default(), armed);
    }

    #[test]
    fn sea_level_is_zero_and_altitude_rises_as_pressure_falls() {
        assert!(pressure_to_altitude(P0_PA).abs() < 0.5);
        let h = pressure_to_altitude(RAISED_PA) - pressure_to_altitude(GROUND_PA);
        assert!(h > 8.0 && h < 12.0, "h = {}", h);
    }

    #[test]
    fn kalman_tracks_constant_measurement() {
        let mut kf = VerticalKalman::new();
        for _ in 0..400 {
            kf.predict(0.025, 0.0);
            kf.update(5.0);
        }
        let s = kf.state();
        assert!((s.position - 5.0).abs() < 0.5, "pos {}", s.position);
        assert!(s.velocity.abs() < 0.5);
    }

    #[test]
    fn estimate_is_relative_to_first_sample() {
        let mut hold = BaroAltitudeHold::default();
        settle(&mut hold, false, GROUND_PA, 200);
        assert!(hold.estimate().position.abs() < 0.1);

        settle(&mut hold, false, RAISED_PA, 800);
        let pos = hold.estimate().position;
        assert!(pos > 8.0 && pos < 12.0, "pos {}", pos);
    }

    #[test]
    fn throttle_untouched_until_engaged() {
        let mut hold = BaroAltitudeHold::default();
        level(&mut hold, true);
        settle(&mut hold, true, GROUND_PA, 10);
        let mut throttle = 0.37;
        hold.modify_demand(&mut throttle);
        assert_eq!(throttle, 0.37);
    }

    #[test]
    fn engage_captures_hover_throttle() {
        let mut hold = BaroAltitudeHold::default();
        level(&mut hold, true);
        settle(&mut hold, true, GROUND_PA, 200);

        hold.handle_aux_switch(1, 0.45);
        assert!(hold.engaged());
        hold.compute_pid(true, Some(GROUND_PA));

        let mut throttle = 0.9;
        hold.modify_demand(&mut throttle);
        assert!((throttle - 0.45).abs() < 0.02, "throttle {}", throttle);
    }

    #[test]
    fn sinking_below_target_adds_throttle() {
        let mut hold = BaroAltitudeHold::default();
        level(&mut hold, true);
        settle(&mut hold, true, RAISED_PA, 400);
        settle(&mut hold, true, GROUND_PA, 1);
        hold.handle_aux_switch(2, 0.5);

        // craft drops back towards the ground
        settle(&mut hold, true, GROUND_PA, 40);
        let mut throttle = 0.5;
        hold.modify_demand(&mut throttle);
        assert!(throttle > 0.5, "throttle {}", throttle);
    }

    #[test]
    fn tilt_raises_throttle() {
        let mut hold = BaroAltitudeHold::default();
        settle(&mut hold, true, GROUND_PA, 200);
        hold.handle_aux_switch(1, 0.4);
        hold.fuse_with_imu(&Orientation { roll: 0.4, pitch: 0.0, yaw: 0.0 }, true);

        let mut throttle = 0.0;
        hold.modify_demand(&mut throttle);
        assert!((throttle - 0.4 / 0.4f32.cos()).abs() < 0.01, "throttle {}", throttle);

        // upside-down is capped
        hold.fuse_with_imu(&Orientation { roll: 3.0, pitch: 0.0, yaw: 0.0 }, true);
        hold.modify_demand(&mut throttle);
        assert!((throttle - 0.8).abs() < 1e-3);
    }

    #[test]
    fn release_and_disarm_leave_throttle_alone() {
        let mut hold = BaroAltitudeHold::default();
        level(&mut hold, true);
        settle(&mut hold, true, GROUND_PA, 50);
        hold.handle_aux_switch(1, 0.5);

        level(&mut hold, false);
        let mut throttle = 0.2;
        hold.modify_demand(&mut throttle);
        assert_eq!(throttle, 0.2);

        level(&mut hold, true);
        hold.handle_aux_switch(0, 0.2);
        assert!(!hold.engaged());
        hold.modify_demand(&mut throttle);
        assert_eq!(throttle, 0.2);
    }

    #[test]
    fn switching_between_hold_positions_keeps_target() {
        let mut hold = BaroAltitudeHold::default();
        settle(&mut hold, true, GROUND_PA, 50);
        hold.handle_aux_switch(1, 0.5);
        let target = hold.target();
        settle(&mut hold, true, RAISED_PA, 50);
        hold.handle_aux_switch(2, 0.7);
        assert_eq!(hold.target(), target);
    }
}
