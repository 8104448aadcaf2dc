use crate::drivers::dshot::{unit_to_dshot, DSHOT_CMD_MOTOR_STOP};
use crate::hal::Mixer;
use crate::state::Trims;

pub const MOTOR_COUNT: usize = 4;

/// Sink for per-motor DShot commands.
pub trait EscOutput {
    fn write(&mut self, commands: &[u16; MOTOR_COUNT]);
}

/// Quad-X mix, Betaflight motor order: rear-right, front-right, rear-left, front-left.
/// Columns are the roll, pitch and yaw contributions.
const QUAD_X: [[f32; 3]; MOTOR_COUNT] = [
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [1.0, -1.0, -1.0],
];

pub struct QuadXMixer<E: EscOutput> {
    esc: E,
    outputs: [f32; MOTOR_COUNT],
    commands: [u16; MOTOR_COUNT],
}

impl<E: EscOutput> QuadXMixer<E> {
    pub fn new(esc: E) -> Self {
        Self {
            esc,
            outputs: [0.0; MOTOR_COUNT],
            commands: [DSHOT_CMD_MOTOR_STOP; MOTOR_COUNT],
        }
    }

    /// Unit motor outputs of the last armed mix.
    pub fn outputs(&self) -> &[f32; MOTOR_COUNT] {
        &self.outputs
    }

    /// Last DShot commands sent to the ESCs.
    pub fn commands(&self) -> &[u16; MOTOR_COUNT] {
        &self.commands
    }

    pub fn esc(&self) -> &E {
        &self.esc
    }

    fn stop_all(&mut self) {
        self.outputs = [0.0; MOTOR_COUNT];
        self.commands = [DSHOT_CMD_MOTOR_STOP; MOTOR_COUNT];
        self.esc.write(&self.commands);
    }
}

/// Mixes throttle and trims, then shifts the set down if a motor saturates so the
/// attitude correction survives at full throttle.
pub fn mix(throttle: f32, trims: &Trims) -> [f32; MOTOR_COUNT] {
    let mut out = [0.0f32; MOTOR_COUNT];
    for (motor, row) in out.iter_mut().zip(QUAD_X.iter()) {
        *motor = throttle + row[0] * trims.roll + row[1] * trims.pitch + row[2] * trims.yaw;
    }

    let max = out.iter().copied().fold(f32::MIN, f32::max);
    if max > 1.0 {
        let excess = max - 1.0;
        for motor in out.iter_mut() {
            *motor -= excess;
        }
    }
    for motor in out.iter_mut() {
        *motor = motor.clamp(0.0, 1.0);
    }
    out
}

impl<E: EscOutput> Mixer for QuadXMixer<E> {
    fn init(&mut self) {
        self.stop_all();
    }

    fn cut_motors(&mut self) {
        self.stop_all();
    }

    // No bench motor test: disarmed means stopped.
    fn run_disarmed(&mut self) {
        self.stop_all();
    }

    fn run_armed(&mut self, throttle: f32, trims: &Trims) {
        self.outputs = mix(throttle, trims);
        for (cmd, out) in self.commands.iter_mut().zip(self.outputs.iter()) {
            *cmd = unit_to_dshot(*out, true);
        }
        self.esc.write(&self.commands);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::dshot::DSHOT_THROTTLE_MIN;

    #[derive(Default)]
    struct Capture {
        writes: u32,
        last: [u16; MOTOR_COUNT],
    }

    impl EscOutput for Capture {
        fn write(&mut self, commands: &[u16; MOTOR_COUNT]) {
            self.writes += 1;
            self.last = *commands;
        }
    }

    #[test]
    fn zero_trims_give_equal_motors() {
        let out = mix(0.5, &Trims::default());
        assert_eq!(out, [0.5; MOTOR_COUNT]);
    }

    #[test]
    fn roll_right_speeds_up_left_motors() {
        let out = mix(0.5, &Trims { roll: 0.1, pitch: 0.0, yaw: 0.0 });
        assert!(out[2] > out[0]);
        assert!(out[3] > out[1]);
    }

    #[test]
    fn saturation_keeps_differential() {
        let out = mix(0.95, &Trims { roll: 0.2, pitch: 0.0, yaw: 0.0 });
        assert!((out[2] - 1.0).abs() < 1e-6);
        assert!((out[2] - out[0] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn outputs_stay_in_unit_range() {
        let out = mix(0.02, &Trims { roll: -0.3, pitch: 0.3, yaw: 0.3 });
        assert!(out.iter().all(|m| (0.0..=1.0).contains(m)));
    }

    #[test]
    fn cut_and_disarmed_stop_every_motor() {
        let mut mixer = QuadXMixer::new(Capture::default());
        mixer.run_armed(0.6, &Trims::default());
        assert!(mixer.esc().last.iter().all(|&c| c > DSHOT_THROTTLE_MIN));

        mixer.cut_motors();
        assert_eq!(mixer.esc().last, [DSHOT_CMD_MOTOR_STOP; MOTOR_COUNT]);

        mixer.run_armed(0.6, &Trims::default());
        mixer.run_disarmed();
        assert_eq!(mixer.esc().last, [DSHOT_CMD_MOTOR_STOP; MOTOR_COUNT]);
        assert_eq!(mixer.outputs(), &[0.0; MOTOR_COUNT]);
        assert_eq!(mixer.esc().writes, 4);
    }

    #[test]
    fn armed_idle_spins_at_dshot_minimum() {
        let mut mixer = QuadXMixer::new(Capture::default());
        mixer.run_armed(0.0, &Trims::default());
        assert_eq!(mixer.commands(), &[DSHOT_THROTTLE_MIN; MOTOR_COUNT]);
    }
}
