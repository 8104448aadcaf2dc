//! Shared state types for the orchestrator and its collaborators.
//!
//! All types are `Copy`; handlers pass them by reference or value, never through globals.

// ── Sensor data ───────────────────────────────────────────────────────────────

/// Euler angles in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Orientation {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

/// Body rates in rad/s.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AngularRates {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

/// One reading from the sensor-fusion provider. Yaw is in [-π, π].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ImuSample {
    pub orientation: Orientation,
    pub rates: AngularRates,
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Pilot or controller demands. Throttle in [0, 1], the other axes in [-1, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Demands {
    pub throttle: f32,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

/// Stabilizer corrections fed to the mixer.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Trims {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

// ── Orchestrator state ────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlightMode {
    Disarmed,
    Armed,
    /// Entered on signal loss while armed. Only a restart leaves it.
    Failsafe,
}

impl FlightMode {
    pub const fn from_flags(armed: bool, failsafe: bool) -> Self {
        if failsafe {
            FlightMode::Failsafe
        } else if armed {
            FlightMode::Armed
        } else {
            FlightMode::Disarmed
        }
    }
}

/// Session and safety state, owned by the flight controller and mutated only by its
/// tick handlers.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OrchestratorState {
    pub armed: bool,
    pub failsafe: bool,
    pub safe_to_arm: bool,
    /// Last aux-switch position seen by the pilot-command loop.
    pub aux_state: u8,
    /// Heading at the moment of arming, reference for headless flight.
    pub yaw_initial: f32,
    /// Latest orientation, yaw in [0, 2π).
    pub orientation: Orientation,
    /// Set by a successful IMU read, cleared by a failed one.
    pub orientation_valid: bool,
}

impl OrchestratorState {
    pub const fn new() -> Self {
        Self {
            armed: false,
            failsafe: false,
            safe_to_arm: false,
            aux_state: 0,
            yaw_initial: 0.0,
            orientation: Orientation {
                roll: 0.0,
                pitch: 0.0,
                yaw: 0.0,
            },
            orientation_valid: false,
        }
    }

    pub fn mode(&self) -> FlightMode {
        FlightMode::from_flags(self.armed, self.failsafe)
    }

    /// Heading change since arming, used for headless stick rotation.
    pub fn yaw_delta(&self) -> f32 {
        self.orientation.yaw - self.yaw_initial
    }
}

/// What the telemetry link gets to see once per stabilization pass.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetrySnapshot {
    pub orientation: Orientation,
    pub armed: bool,
    pub failsafe: bool,
    pub demands: Demands,
}

impl TelemetrySnapshot {
    pub fn mode(&self) -> FlightMode {
        FlightMode::from_flags(self.armed, self.failsafe)
    }
}
