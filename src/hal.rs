//! Collaborator interfaces.
//!
//! The flight controller owns one implementation of each trait. The STM32 firmware plugs
//! in the types from [`crate::drivers`]; tests plug in the doubles from `sim`.

use crate::config::Model;
use crate::error::Result;
use crate::state::{AngularRates, Demands, ImuSample, Orientation, TelemetrySnapshot, Trims};

/// Board support: clock, LED, sensor access.
pub trait Board {
    /// One-time bring-up, called before anything else.
    fn init_hardware(&mut self) -> Result<()>;

    /// Blocking delay. Only used during start-up.
    fn delay_ms(&mut self, ms: u32);

    /// Free-running microsecond counter.
    fn micros(&mut self) -> u32;

    fn set_led(&mut self, on: bool);

    /// Fused orientation and raw body rates.
    fn read_imu(&mut self) -> Result<ImuSample>;

    /// Static pressure in Pa, for boards that carry a barometer.
    fn read_barometer(&mut self) -> Option<f32> {
        None
    }
}

/// Pilot link: channel decoding, stick gestures, expo.
pub trait Receiver {
    fn init(&mut self);

    /// Pulls the latest channel frame.
    fn update(&mut self);

    /// True when the last [`update`](Self::update) brought different inputs.
    fn changed(&self) -> bool;

    /// Arm gesture present.
    fn arming(&self) -> bool;

    /// Disarm gesture present.
    fn disarming(&self) -> bool;

    fn lost_signal(&self) -> bool;

    fn throttle_is_down(&self) -> bool;

    /// Aux switch position, 0 is neutral.
    fn aux_state(&self) -> u8;

    /// Recomputes [`demands`](Self::demands) from the raw sticks. `yaw_delta` is the
    /// heading change since arming, in radians.
    fn compute_expo(&mut self, yaw_delta: f32);

    fn demands(&self) -> Demands;

    fn demands_mut(&mut self) -> &mut Demands;
}

/// Attitude stabilization.
pub trait Stabilizer {
    fn init(&mut self, model: &Model);

    fn reset_integral(&mut self);

    fn update(&mut self, demands: &Demands, orientation: &Orientation, rates: &AngularRates);

    /// Roll or pitch beyond this angle (rad) is not safe to arm.
    fn max_arming_angle(&self) -> f32;

    /// Outputs of the last [`update`](Self::update).
    fn trims(&self) -> Trims;
}

/// Motor mixing and ESC output.
pub trait Mixer {
    fn init(&mut self);

    fn cut_motors(&mut self);

    /// Output while disarmed.
    fn run_disarmed(&mut self);

    fn run_armed(&mut self, throttle: f32, trims: &Trims);
}

/// Altitude estimation and hold.
pub trait AltitudeHold {
    fn init(&mut self, model: &Model);

    /// One PID step. `pressure_pa` is the board's barometer reading, if any.
    fn compute_pid(&mut self, armed: bool, pressure_pa: Option<f32>);

    /// Aux switch moved to `aux_state` with the pilot at `throttle`.
    fn handle_aux_switch(&mut self, aux_state: u8, throttle: f32);

    fn fuse_with_imu(&mut self, orientation: &Orientation, armed: bool);

    /// Rewrites the throttle demand while hold is engaged.
    fn modify_demand(&mut self, throttle: &mut f32);
}

/// Serial telemetry, reported asynchronously from the snapshot.
pub trait Telemetry {
    fn init(&mut self);

    fn update(&mut self, snapshot: &TelemetrySnapshot);
}
