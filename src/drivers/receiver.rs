//! Stick decoding on top of a CRSF channel source.

use micromath::F32Ext;

use crate::drivers::crsf::{RcChannels, CRSF_CHANNEL_MAX, CRSF_CHANNEL_MID, CRSF_CHANNEL_MIN};
use crate::hal::Receiver;
use crate::state::Demands;

// AETR channel order
const CH_ROLL: usize = 0;
const CH_PITCH: usize = 1;
const CH_THROTTLE: usize = 2;
const CH_YAW: usize = 3;
const CH_AUX: usize = 4;

/// Updates without a frame before the link is declared lost. At the 100 Hz pilot-command
/// rate this is 200 ms.
pub const SIGNAL_LOSS_UPDATES: u16 = 20;

const THROTTLE_DOWN: f32 = 0.05;
const YAW_GESTURE: f32 = 0.9;
const EXPO: f32 = 0.3;

// Aux switch positions in raw channel units
const AUX_LOW_MAX: u16 = 700;
const AUX_MID_MAX: u16 = 1300;

/// Source of decoded channel frames.
pub trait RcLink {
    /// Latest frame received since the previous poll, if any.
    fn poll(&mut self) -> Option<RcChannels>;

    /// True while the radio receiver itself reports failsafe.
    fn failsafe(&self) -> bool {
        false
    }
}

pub fn stick_to_unit(raw: u16) -> f32 {
    let half_range = (CRSF_CHANNEL_MAX - CRSF_CHANNEL_MID) as f32;
    ((raw as f32 - CRSF_CHANNEL_MID as f32) / half_range).clamp(-1.0, 1.0)
}

pub fn throttle_to_unit(raw: u16) -> f32 {
    let range = (CRSF_CHANNEL_MAX - CRSF_CHANNEL_MIN) as f32;
    ((raw as f32 - CRSF_CHANNEL_MIN as f32) / range).clamp(0.0, 1.0)
}

pub fn aux_position(raw: u16) -> u8 {
    if raw <= AUX_LOW_MAX {
        0
    } else if raw <= AUX_MID_MAX {
        1
    } else {
        2
    }
}

/// Cubic expo: keeps full deflection, softens the centre.
pub fn expo(x: f32, e: f32) -> f32 {
    x * (1.0 - e) + e * x * x * x
}

pub struct RcReceiver<L: RcLink> {
    link: L,
    raw: RcChannels,
    sticks: Demands,
    demands: Demands,
    changed: bool,
    missed: u16,
    lost: bool,
    headless: bool,
}

impl<L: RcLink> RcReceiver<L> {
    pub fn new(link: L) -> Self {
        let mut raw = RcChannels::default();
        raw.channels[CH_THROTTLE] = CRSF_CHANNEL_MIN;
        raw.channels[CH_AUX] = CRSF_CHANNEL_MIN;
        Self {
            link,
            raw,
            sticks: decode_sticks(&raw),
            demands: Demands::default(),
            changed: false,
            missed: SIGNAL_LOSS_UPDATES,
            lost: true,
            headless: false,
        }
    }

    /// Rotates roll and pitch by the heading change since arming.
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn raw(&self) -> &RcChannels {
        &self.raw
    }
}

fn decode_sticks(rc: &RcChannels) -> Demands {
    Demands {
        throttle: throttle_to_unit(rc.channels[CH_THROTTLE]),
        roll: stick_to_unit(rc.channels[CH_ROLL]),
        pitch: stick_to_unit(rc.channels[CH_PITCH]),
        yaw: stick_to_unit(rc.channels[CH_YAW]),
    }
}

impl<L: RcLink> Receiver for RcReceiver<L> {
    fn init(&mut self) {
        self.changed = false;
        self.missed = SIGNAL_LOSS_UPDATES;
        self.lost = true;
    }

    fn update(&mut self) {
        match self.link.poll() {
            Some(frame) => {
                self.changed = frame != self.raw;
                self.raw = frame;
                self.sticks = decode_sticks(&frame);
                self.missed = 0;
            }
            None => {
                self.changed = false;
                self.missed = self.missed.saturating_add(1);
            }
        }

        // Link-reported failsafe wins over frames still trickling in
        let lost = self.link.failsafe() || self.missed >= SIGNAL_LOSS_UPDATES;
        if lost != self.lost {
            if lost {
                warn!("rc link lost");
            } else {
                info!("rc link up");
            }
            self.lost = lost;
        }
    }

    fn changed(&self) -> bool {
        self.changed
    }

    fn arming(&self) -> bool {
        self.throttle_is_down() && self.sticks.yaw > YAW_GESTURE
    }

    fn disarming(&self) -> bool {
        self.throttle_is_down() && self.sticks.yaw < -YAW_GESTURE
    }

    fn lost_signal(&self) -> bool {
        self.lost
    }

    fn throttle_is_down(&self) -> bool {
        self.sticks.throttle < THROTTLE_DOWN
    }

    fn aux_state(&self) -> u8 {
        aux_position(self.raw.channels[CH_AUX])
    }

    fn compute_expo(&mut self, yaw_delta: f32) {
        let mut roll = expo(self.sticks.roll, EXPO);
        let mut pitch = expo(self.sticks.pitch, EXPO);

        if self.headless {
            let (s, c) = (yaw_delta.sin(), yaw_delta.cos());
            (roll, pitch) = (roll * c + pitch * s, pitch * c - roll * s);
        }

        self.demands = Demands {
            throttle: self.sticks.throttle,
            roll,
            pitch,
            yaw: expo(self.sticks.yaw, EXPO),
        };
    }

    fn demands(&self) -> Demands {
        self.demands
    }

    fn demands_mut(&mut self) -> &mut Demands {
        &mut self.demands
    }
}
