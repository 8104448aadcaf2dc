//! Helpers for the stabilization pass.

use core::f32::consts::PI;

/// What the mixer is told to do at the end of a stabilization pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActuatorCommand {
    /// Disarmed output pattern.
    Disarmed,
    /// Trims and throttle to the mixer.
    Armed,
    /// Motors off.
    Cut,
}

/// Armed with throttle down or in failsafe means motors off, never a reduced thrust.
pub fn select_actuator_command(armed: bool, failsafe: bool, throttle_is_down: bool) -> ActuatorCommand {
    if !armed {
        ActuatorCommand::Disarmed
    } else if !failsafe && !throttle_is_down {
        ActuatorCommand::Armed
    } else {
        ActuatorCommand::Cut
    }
}

/// Maps a heading from [-π, π] to [0, 2π).
pub fn normalize_yaw(yaw: f32) -> f32 {
    let yaw = if yaw < 0.0 { yaw + 2.0 * PI } else { yaw };
    // Tiny negative headings round up to exactly 2π
    if yaw >= 2.0 * PI {
        0.0
    } else {
        yaw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actuator_command_table() {
        use ActuatorCommand::*;
        assert_eq!(select_actuator_command(false, false, false), Disarmed);
        assert_eq!(select_actuator_command(false, true, true), Disarmed);
        assert_eq!(select_actuator_command(true, false, false), Armed);
        assert_eq!(select_actuator_command(true, false, true), Cut);
        assert_eq!(select_actuator_command(true, true, false), Cut);
    }

    #[test]
    fn negative_heading_wraps_once() {
        assert_eq!(normalize_yaw(0.5), 0.5);
        assert!((normalize_yaw(-PI / 2.0) - 1.5 * PI).abs() < 1e-6);
        assert!((normalize_yaw(-PI) - PI).abs() < 1e-6);
        assert_eq!(normalize_yaw(0.0), 0.0);
    }

    #[test]
    fn heading_just_below_zero_stays_below_two_pi() {
        let yaw = normalize_yaw(-1e-8);
        assert!((0.0..2.0 * PI).contains(&yaw));
        assert_eq!(yaw, 0.0);
    }
}
