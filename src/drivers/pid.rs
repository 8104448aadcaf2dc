//! Attitude stabilization: level mode on roll and pitch, rate mode on yaw.

use crate::config::{Model, PidGains, FAST_TASK_PERIOD_US};
use crate::hal::Stabilizer;
use crate::state::{AngularRates, Demands, Orientation, Trims};

/// Single-axis PID with the derivative taken from the measured rate, not the error.
#[derive(Clone, Copy, Debug)]
pub struct AxisPid {
    kp: f32,
    ki: f32,
    kd: f32,
    integral: f32,
    integral_limit: f32,
    output_limit: f32,
}

impl AxisPid {
    pub fn new(gains: &PidGains) -> Self {
        Self {
            kp: gains.kp,
            ki: gains.ki,
            kd: gains.kd,
            integral: 0.0,
            integral_limit: gains.integral_limit.abs(),
            output_limit: gains.output_limit.abs(),
        }
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn update(&mut self, dt: f32, setpoint: f32, measured: f32, rate: f32) -> f32 {
        let error = setpoint - measured;

        self.integral = (self.integral + error * dt).clamp(-self.integral_limit, self.integral_limit);

        let output = self.kp * error + self.ki * self.integral - self.kd * rate;
        output.clamp(-self.output_limit, self.output_limit)
    }
}

pub struct PidStabilizer {
    roll: AxisPid,
    pitch: AxisPid,
    yaw: AxisPid,
    dt: f32,
    max_arming_angle: f32,
    max_level_angle: f32,
    max_yaw_rate: f32,
    trims: Trims,
}

impl PidStabilizer {
    pub fn new(model: &Model) -> Self {
        Self {
            roll: AxisPid::new(&model.level),
            pitch: AxisPid::new(&model.level),
            yaw: AxisPid::new(&model.yaw_rate),
            dt: FAST_TASK_PERIOD_US as f32 * 1e-6,
            max_arming_angle: model.max_arming_angle_rad,
            max_level_angle: model.max_level_angle_rad,
            max_yaw_rate: model.max_yaw_rate_rad_s,
            trims: Trims::default(),
        }
    }

    pub fn integrals(&self) -> [f32; 3] {
        [self.roll.integral(), self.pitch.integral(), self.yaw.integral()]
    }
}

impl Default for PidStabilizer {
    fn default() -> Self {
        Self::new(&Model::default())
    }
}

impl Stabilizer for PidStabilizer {
    fn init(&mut self, model: &Model) {
        *self = Self::new(model);
    }

    fn reset_integral(&mut self) {
        self.roll.reset();
        self.pitch.reset();
        self.yaw.reset();
    }

    fn update(&mut self, demands: &Demands, orientation: &Orientation, rates: &AngularRates) {
        let roll_sp = demands.roll.clamp(-1.0, 1.0) * self.max_level_angle;
        let pitch_sp = demands.pitch.clamp(-1.0, 1.0) * self.max_level_angle;
        let yaw_rate_sp = demands.yaw.clamp(-1.0, 1.0) * self.max_yaw_rate;

        self.trims = Trims {
            roll: self.roll.update(self.dt, roll_sp, orientation.roll, rates.roll),
            pitch: self.pitch.update(self.dt, pitch_sp, orientation.pitch, rates.pitch),
            // rate loop: the measured rate is the process value, no separate D
            yaw: self.yaw.update(self.dt, yaw_rate_sp, rates.yaw, 0.0),
        };
    }

    fn max_arming_angle(&self) -> f32 {
        self.max_arming_angle
    }

    fn trims(&self) -> Trims {
        self.trims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gains(kp: f32, ki: f32, kd: f32) -> PidGains {
        PidGains::new(kp, ki, kd, 1.0, 1.0)
    }

    #[test]
    fn proportional_only() {
        let mut pid = AxisPid::new(&gains(2.0, 0.0, 0.0));
        assert!((pid.update(0.01, 0.2, 0.0, 0.0) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn integral_is_clamped_and_resettable() {
        let mut pid = AxisPid::new(&PidGains::new(0.0, 1.0, 0.0, 0.05, 1.0));
        for _ in 0..1000 {
            pid.update(0.01, 1.0, 0.0, 0.0);
        }
        assert!((pid.integral() - 0.05).abs() < 1e-6);
        pid.reset();
        assert_eq!(pid.integral(), 0.0);
    }

    #[test]
    fn derivative_opposes_rate() {
        let mut pid = AxisPid::new(&gains(0.0, 0.0, 0.5));
        assert!((pid.update(0.01, 0.0, 0.0, 0.4) + 0.2).abs() < 1e-6);
    }

    #[test]
    fn output_is_limited() {
        let mut pid = AxisPid::new(&PidGains::new(100.0, 0.0, 0.0, 1.0, 0.3));
        assert_eq!(pid.update(0.01, 1.0, 0.0, 0.0), 0.3);
        assert_eq!(pid.update(0.01, -1.0, 0.0, 0.0), -0.3);
    }

    #[test]
    fn level_and_centered_gives_zero_trims() {
        let mut stab = PidStabilizer::default();
        stab.update(&Demands::default(), &Orientation::default(), &AngularRates::default());
        assert_eq!(stab.trims(), Trims::default());
    }

    #[test]
    fn roll_stick_commands_roll_trim() {
        let mut stab = PidStabilizer::default();
        let demands = Demands { roll: 0.5, ..Demands::default() };
        stab.update(&demands, &Orientation::default(), &AngularRates::default());
        let trims = stab.trims();
        assert!(trims.roll > 0.0);
        assert_eq!(trims.pitch, 0.0);
        assert_eq!(trims.yaw, 0.0);
    }

    #[test]
    fn tilted_airframe_is_pushed_back() {
        let mut stab = PidStabilizer::default();
        let tilted = Orientation { pitch: 0.2, ..Orientation::default() };
        stab.update(&Demands::default(), &tilted, &AngularRates::default());
        assert!(stab.trims().pitch < 0.0);
    }

    #[test]
    fn yaw_tracks_rate_not_heading() {
        let mut stab = PidStabilizer::default();
        let heading = Orientation { yaw: 1.0, ..Orientation::default() };
        stab.update(&Demands::default(), &heading, &AngularRates::default());
        assert_eq!(stab.trims().yaw, 0.0);

        let spinning = AngularRates { yaw: 1.0, ..AngularRates::default() };
        stab.update(&Demands::default(), &heading, &spinning);
        assert!(stab.trims().yaw < 0.0);
    }

    #[test]
    fn reset_clears_every_axis() {
        let mut stab = PidStabilizer::default();
        let demands = Demands { roll: 1.0, pitch: -1.0, yaw: 1.0, throttle: 0.5 };
        for _ in 0..10 {
            stab.update(&demands, &Orientation::default(), &AngularRates::default());
        }
        assert!(stab.integrals().iter().all(|i| *i != 0.0));
        stab.reset_integral();
        assert_eq!(stab.integrals(), [0.0; 3]);
    }

    #[test]
    fn init_applies_model() {
        let mut stab = PidStabilizer::default();
        let model = Model { max_arming_angle_rad: 0.1, ..Model::default() };
        stab.init(&model);
        assert_eq!(stab.max_arming_angle(), 0.1);
    }
}
