//! DShot command encoding. The bit-banging itself lives with the board.

/// Command 0: motor stop.
pub const DSHOT_CMD_MOTOR_STOP: u16 = 0;
/// Lowest throttle value; 1..=47 are special commands.
pub const DSHOT_THROTTLE_MIN: u16 = 48;
pub const DSHOT_THROTTLE_MAX: u16 = 2047;

/// Maps a unit throttle to a DShot throttle value. Disarmed always stops the motor.
pub fn unit_to_dshot(unit_throttle: f32, armed: bool) -> u16 {
    if !armed {
        return DSHOT_CMD_MOTOR_STOP;
    }

    let t = unit_throttle.clamp(0.0, 1.0);
    let min = DSHOT_THROTTLE_MIN as f32;
    let max = DSHOT_THROTTLE_MAX as f32;
    (min + t * (max - min)) as u16
}

/// Builds the 16-bit frame: 11-bit command, telemetry request bit, 4-bit checksum.
pub fn dshot_frame(command: u16, telemetry: bool) -> u16 {
    let packet = ((command & 0x07ff) << 1) | telemetry as u16;
    let csum = (packet ^ (packet >> 4) ^ (packet >> 8)) & 0x000f;
    (packet << 4) | csum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disarmed_is_motor_stop() {
        assert_eq!(unit_to_dshot(0.8, false), DSHOT_CMD_MOTOR_STOP);
    }

    #[test]
    fn throttle_range_is_clamped() {
        assert_eq!(unit_to_dshot(0.0, true), DSHOT_THROTTLE_MIN);
        assert_eq!(unit_to_dshot(1.0, true), DSHOT_THROTTLE_MAX);
        assert_eq!(unit_to_dshot(-3.0, true), DSHOT_THROTTLE_MIN);
        assert_eq!(unit_to_dshot(7.0, true), DSHOT_THROTTLE_MAX);
    }

    #[test]
    fn frame_checksum() {
        // 1046 with no telemetry request: packet 0x82C, checksum 0x6
        assert_eq!(dshot_frame(1046, false), 0x82C6);
        // Stop command is all zeros
        assert_eq!(dshot_frame(0, false), 0x0000);
        // Telemetry bit alone
        assert_eq!(dshot_frame(0, true), 0x0011);
    }
}
