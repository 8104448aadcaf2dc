//! DShot300 bit-banging for the four ESCs.

use core::sync::atomic::{AtomicU16, Ordering};

use cortex_m::asm;
use embassy_stm32::gpio::{AnyPin, Level, Output, Speed};
use embassy_time::{Duration, Timer};

use multirotor_fc::drivers::dshot::{dshot_frame, DSHOT_CMD_MOTOR_STOP};
use multirotor_fc::drivers::mixer::{EscOutput, MOTOR_COUNT};

/// Latest command per motor, written by the mixer, read by [`dshot_task`].
static MOTOR_CMDS: [AtomicU16; MOTOR_COUNT] = [
    AtomicU16::new(DSHOT_CMD_MOTOR_STOP),
    AtomicU16::new(DSHOT_CMD_MOTOR_STOP),
    AtomicU16::new(DSHOT_CMD_MOTOR_STOP),
    AtomicU16::new(DSHOT_CMD_MOTOR_STOP),
];

/// Mixer-side handle to the shared command slots.
pub struct AtomicEscs;

impl EscOutput for AtomicEscs {
    fn write(&mut self, commands: &[u16; MOTOR_COUNT]) {
        for (slot, &cmd) in MOTOR_CMDS.iter().zip(commands) {
            slot.store(cmd, Ordering::Relaxed);
        }
    }
}

pub struct Dshot300 {
    pin: Output<'static, AnyPin>,
}

impl Dshot300 {
    // cycles at 168 MHz
    const BIT_TOTAL_CYCLES: u32 = 560;
    const BIT1_HIGH_CYCLES: u32 = 420;
    const BIT0_HIGH_CYCLES: u32 = 210;
    const FRAME_GAP_CYCLES: u32 = 5200;

    pub fn new(pin: AnyPin) -> Self {
        Self {
            pin: Output::new(pin, Level::Low, Speed::VeryHigh),
        }
    }

    pub fn send_command(&mut self, command: u16) {
        self.send_frame(dshot_frame(command, false));
    }

    /// Interrupts are masked for the ~60 µs frame so UART ISRs cannot stretch a bit.
    fn send_frame(&mut self, frame: u16) {
        critical_section::with(|_cs| {
            for bit in (0..16).rev() {
                let high = if (frame >> bit) & 1 != 0 {
                    Self::BIT1_HIGH_CYCLES
                } else {
                    Self::BIT0_HIGH_CYCLES
                };
                self.pin.set_high();
                asm::delay(high);
                self.pin.set_low();
                asm::delay(Self::BIT_TOTAL_CYCLES - high);
            }
            asm::delay(Self::FRAME_GAP_CYCLES);
        });
    }
}

/// Refreshes every ESC at 1 kHz from the shared command slots.
#[embassy_executor::task]
pub async fn dshot_task(mut escs: [Dshot300; MOTOR_COUNT]) {
    loop {
        for (esc, slot) in escs.iter_mut().zip(MOTOR_CMDS.iter()) {
            esc.send_command(slot.load(Ordering::Relaxed));
        }
        Timer::after(Duration::from_micros(1000)).await;
    }
}
