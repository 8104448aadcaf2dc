//! Loop timing, boot behaviour and vehicle tuning.

use core::f32::consts::PI;

// ── Task periods ──────────────────────────────────────────────────────────────

/// Stabilization loop, ~285 Hz.
pub const FAST_TASK_PERIOD_US: u32 = 3_500;
/// Pilot-command loop, 100 Hz.
pub const SLOW_TASK_PERIOD_US: u32 = 10_000;
/// Altitude PID, 40 Hz.
pub const ALTITUDE_TASK_PERIOD_US: u32 = 25_000;
/// Arming-angle check, 2 Hz.
pub const ANGLE_CHECK_PERIOD_US: u32 = 500_000;

// ── Boot ──────────────────────────────────────────────────────────────────────

/// Settle time for the IMU after the LED flash.
pub const STARTUP_DELAY_MS: u32 = 100;
/// Total duration of the boot flash.
pub const LED_FLASH_MS: u32 = 1_000;
/// Number of on/off cycles in the boot flash.
pub const LED_FLASH_COUNT: u32 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskTiming {
    pub fast_us: u32,
    pub slow_us: u32,
    pub altitude_us: u32,
    pub angle_check_us: u32,
}

impl Default for TaskTiming {
    fn default() -> Self {
        Self {
            fast_us: FAST_TASK_PERIOD_US,
            slow_us: SLOW_TASK_PERIOD_US,
            altitude_us: ALTITUDE_TASK_PERIOD_US,
            angle_check_us: ANGLE_CHECK_PERIOD_US,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootConfig {
    pub startup_delay_ms: u32,
    pub led_flash_ms: u32,
    pub led_flash_count: u32,
}

impl BootConfig {
    /// Length of one LED half-cycle (on or off).
    pub fn flash_half_cycle_ms(&self) -> u32 {
        if self.led_flash_count == 0 {
            return 0;
        }
        self.led_flash_ms / (2 * self.led_flash_count)
    }
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            startup_delay_ms: STARTUP_DELAY_MS,
            led_flash_ms: LED_FLASH_MS,
            led_flash_count: LED_FLASH_COUNT,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OrchestratorConfig {
    pub timing: TaskTiming,
    pub boot: BootConfig,
}

// ── Vehicle model ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub integral_limit: f32,
    pub output_limit: f32,
}

impl PidGains {
    pub const fn new(kp: f32, ki: f32, kd: f32, integral_limit: f32, output_limit: f32) -> Self {
        Self { kp, ki, kd, integral_limit, output_limit }
    }
}

/// Tuning shared by the stabilizer and the altitude hold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Model {
    /// Level-mode gains for roll and pitch (angle error in rad → trim).
    pub level: PidGains,
    /// Rate gains for yaw (rate error in rad/s → trim).
    pub yaw_rate: PidGains,
    /// Roll or pitch beyond this refuses arming.
    pub max_arming_angle_rad: f32,
    /// Full stick deflection commands this angle.
    pub max_level_angle_rad: f32,
    /// Full yaw stick commands this rate.
    pub max_yaw_rate_rad_s: f32,
    /// Altitude error in m → throttle correction.
    pub altitude: PidGains,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            level: PidGains::new(4.0, 0.8, 0.08, 0.4, 0.5),
            yaw_rate: PidGains::new(0.3, 0.05, 0.0, 0.2, 0.3),
            max_arming_angle_rad: 25.0 * PI / 180.0,
            max_level_angle_rad: 35.0 * PI / 180.0,
            max_yaw_rate_rad_s: 200.0 * PI / 180.0,
            altitude: PidGains::new(0.12, 0.02, 0.08, 2.0, 0.25),
        }
    }
}
