//! Simulation doubles for the collaborator traits.
//!
//! Fields are public so a test can script inputs between ticks and inspect what the
//! controller did. Nothing here touches real hardware.

use crate::config::Model;
use crate::error::{Error, Result};
use crate::hal::{AltitudeHold, Board, Mixer, Receiver, Stabilizer, Telemetry};
use crate::state::{AngularRates, Demands, ImuSample, Orientation, TelemetrySnapshot, Trims};

/// Scripted clock and sensors. Delays advance the clock.
#[derive(Debug, Default)]
pub struct SimBoard {
    pub now_us: u32,
    pub led: bool,
    pub led_on_count: u32,
    pub delayed_ms: u32,
    pub init_calls: u32,
    pub imu: ImuSample,
    pub imu_fails: bool,
    pub pressure_pa: Option<f32>,
}

impl SimBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_us(&mut self, us: u32) {
        self.now_us = self.now_us.wrapping_add(us);
    }
}

impl Board for SimBoard {
    fn init_hardware(&mut self) -> Result<()> {
        self.init_calls += 1;
        Ok(())
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delayed_ms += ms;
        self.advance_us(ms.saturating_mul(1000));
    }

    fn micros(&mut self) -> u32 {
        self.now_us
    }

    fn set_led(&mut self, on: bool) {
        if on {
            self.led_on_count += 1;
        }
        self.led = on;
    }

    fn read_imu(&mut self) -> Result<ImuSample> {
        if self.imu_fails {
            Err(Error::ImuRead)
        } else {
            Ok(self.imu)
        }
    }

    fn read_barometer(&mut self) -> Option<f32> {
        self.pressure_pa
    }
}

/// Receiver whose gestures and flags are set directly by the test.
#[derive(Debug, Default)]
pub struct SimReceiver {
    pub demands: Demands,
    pub changed: bool,
    pub arming: bool,
    pub disarming: bool,
    pub lost_signal: bool,
    pub throttle_down: bool,
    pub aux: u8,
    pub init_calls: u32,
    pub update_calls: u32,
    pub last_yaw_delta: Option<f32>,
}

impl SimReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm_gesture(&mut self) {
        self.changed = true;
        self.arming = true;
        self.disarming = false;
    }

    pub fn disarm_gesture(&mut self) {
        self.changed = true;
        self.arming = false;
        self.disarming = true;
    }

    pub fn release_sticks(&mut self) {
        self.changed = true;
        self.arming = false;
        self.disarming = false;
    }
}

impl Receiver for SimReceiver {
    fn init(&mut self) {
        self.init_calls += 1;
    }

    fn update(&mut self) {
        self.update_calls += 1;
    }

    fn changed(&self) -> bool {
        self.changed
    }

    fn arming(&self) -> bool {
        self.arming
    }

    fn disarming(&self) -> bool {
        self.disarming
    }

    fn lost_signal(&self) -> bool {
        self.lost_signal
    }

    fn throttle_is_down(&self) -> bool {
        self.throttle_down
    }

    fn aux_state(&self) -> u8 {
        self.aux
    }

    fn compute_expo(&mut self, yaw_delta: f32) {
        self.last_yaw_delta = Some(yaw_delta);
    }

    fn demands(&self) -> Demands {
        self.demands
    }

    fn demands_mut(&mut self) -> &mut Demands {
        &mut self.demands
    }
}

/// Stabilizer that records its inputs and returns fixed trims.
#[derive(Debug)]
pub struct SimStabilizer {
    pub max_arming_angle: f32,
    pub trims: Trims,
    pub init_calls: u32,
    pub reset_calls: u32,
    pub update_calls: u32,
    pub last_demands: Demands,
    pub last_orientation: Orientation,
    pub last_rates: AngularRates,
}

impl SimStabilizer {
    pub fn new() -> Self {
        Self {
            max_arming_angle: Model::default().max_arming_angle_rad,
            trims: Trims {
                roll: 0.01,
                pitch: -0.02,
                yaw: 0.03,
            },
            init_calls: 0,
            reset_calls: 0,
            update_calls: 0,
            last_demands: Demands::default(),
            last_orientation: Orientation::default(),
            last_rates: AngularRates::default(),
        }
    }
}

impl Default for SimStabilizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Stabilizer for SimStabilizer {
    fn init(&mut self, model: &Model) {
        self.init_calls += 1;
        self.max_arming_angle = model.max_arming_angle_rad;
    }

    fn reset_integral(&mut self) {
        self.reset_calls += 1;
    }

    fn update(&mut self, demands: &Demands, orientation: &Orientation, rates: &AngularRates) {
        self.update_calls += 1;
        self.last_demands = *demands;
        self.last_orientation = *orientation;
        self.last_rates = *rates;
    }

    fn max_arming_angle(&self) -> f32 {
        self.max_arming_angle
    }

    fn trims(&self) -> Trims {
        self.trims
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MixerCall {
    Cut,
    Disarmed,
    Armed { throttle: f32, trims: Trims },
}

/// Mixer that counts calls and keeps the last one.
#[derive(Debug, Default)]
pub struct SimMixer {
    pub init_calls: u32,
    pub cut_calls: u32,
    pub disarmed_calls: u32,
    pub armed_calls: u32,
    pub last: Option<MixerCall>,
}

impl SimMixer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_calls(&self) -> u32 {
        self.cut_calls + self.disarmed_calls + self.armed_calls
    }
}

impl Mixer for SimMixer {
    fn init(&mut self) {
        self.init_calls += 1;
    }

    fn cut_motors(&mut self) {
        self.cut_calls += 1;
        self.last = Some(MixerCall::Cut);
    }

    fn run_disarmed(&mut self) {
        self.disarmed_calls += 1;
        self.last = Some(MixerCall::Disarmed);
    }

    fn run_armed(&mut self, throttle: f32, trims: &Trims) {
        self.armed_calls += 1;
        self.last = Some(MixerCall::Armed {
            throttle,
            trims: *trims,
        });
    }
}

/// Altitude hold that records calls. `throttle_override` replaces the throttle demand
/// when set.
#[derive(Debug, Default)]
pub struct SimAltitude {
    pub init_calls: u32,
    pub compute_calls: u32,
    pub fuse_calls: u32,
    pub aux_events: u32,
    pub last_aux: Option<(u8, f32)>,
    pub last_pressure: Option<f32>,
    pub throttle_override: Option<f32>,
}

impl SimAltitude {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AltitudeHold for SimAltitude {
    fn init(&mut self, _model: &Model) {
        self.init_calls += 1;
    }

    fn compute_pid(&mut self, _armed: bool, pressure_pa: Option<f32>) {
        self.compute_calls += 1;
        self.last_pressure = pressure_pa;
    }

    fn handle_aux_switch(&mut self, aux_state: u8, throttle: f32) {
        self.aux_events += 1;
        self.last_aux = Some((aux_state, throttle));
    }

    fn fuse_with_imu(&mut self, _orientation: &Orientation, _armed: bool) {
        self.fuse_calls += 1;
    }

    fn modify_demand(&mut self, throttle: &mut f32) {
        if let Some(t) = self.throttle_override {
            *throttle = t;
        }
    }
}

#[derive(Debug, Default)]
pub struct SimTelemetry {
    pub init_calls: u32,
    pub updates: u32,
    pub last: Option<TelemetrySnapshot>,
}

impl SimTelemetry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Telemetry for SimTelemetry {
    fn init(&mut self) {
        self.init_calls += 1;
    }

    fn update(&mut self, snapshot: &TelemetrySnapshot) {
        self.updates += 1;
        self.last = Some(*snapshot);
    }
}
