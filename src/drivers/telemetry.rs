//! CRSF telemetry back to the pilot's radio.

use crate::drivers::crsf::{
    build_frame, payload_attitude, payload_flight_mode, CRSF_FRAMETYPE_ATTITUDE, CRSF_FRAMETYPE_FLIGHT_MODE,
};
use crate::error::Result;
use crate::hal::Telemetry;
use crate::state::{FlightMode, TelemetrySnapshot};

/// Attitude every 15 stabilization passes, ~19 Hz.
pub const ATTITUDE_EVERY: u32 = 15;
/// Flight mode every 143 passes, ~2 Hz.
pub const FLIGHT_MODE_EVERY: u32 = 143;

/// Non-blocking outlet for serialized frames, usually a queue in front of the UART.
pub trait FrameSink {
    fn try_send(&mut self, frame: &[u8]) -> Result<()>;
}

pub fn mode_name(mode: FlightMode) -> &'static str {
    match mode {
        FlightMode::Disarmed => "DISARM",
        FlightMode::Armed => "ANGL",
        FlightMode::Failsafe => "!FS!",
    }
}

pub struct CrsfTelemetry<S: FrameSink> {
    sink: S,
    tick: u32,
    dropped: u32,
}

impl<S: FrameSink> CrsfTelemetry<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            tick: 0,
            dropped: 0,
        }
    }

    /// Frames the sink refused.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn send(&mut self, frame_type: u8, payload: &[u8]) {
        let sent = build_frame(frame_type, payload).and_then(|frame| self.sink.try_send(&frame));
        if sent.is_err() {
            self.dropped = self.dropped.wrapping_add(1);
        }
    }
}

impl<S: FrameSink> Telemetry for CrsfTelemetry<S> {
    fn init(&mut self) {
        self.tick = 0;
        self.dropped = 0;
    }

    fn update(&mut self, snapshot: &TelemetrySnapshot) {
        let tick = self.tick;
        self.tick = self.tick.wrapping_add(1);

        if tick % ATTITUDE_EVERY == 0 {
            let o = &snapshot.orientation;
            self.send(CRSF_FRAMETYPE_ATTITUDE, &payload_attitude(o.pitch, o.roll, o.yaw));
        }

        if tick % FLIGHT_MODE_EVERY == 0 {
            match payload_flight_mode(mode_name(snapshot.mode())) {
                Ok(payload) => self.send(CRSF_FRAMETYPE_FLIGHT_MODE, &payload),
                Err(_) => self.dropped = self.dropped.wrapping_add(1),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::crsf::{crc8, CRSF_SYNC};
    use crate::error::Error;
    use crate::state::Orientation;

    #[derive(Default)]
    struct Capture {
        frames: heapless::Vec<heapless::Vec<u8, 64>, 32>,
        full: bool,
    }

    impl FrameSink for Capture {
        fn try_send(&mut self, frame: &[u8]) -> Result<()> {
            if self.full {
                return Err(Error::BufferFull);
            }
            let copy = heapless::Vec::from_slice(frame).map_err(|_| Error::BufferFull)?;
            self.frames.push(copy).map_err(|_| Error::BufferFull)
        }
    }

    fn snapshot(armed: bool, failsafe: bool) -> TelemetrySnapshot {
        TelemetrySnapshot {
            orientation: Orientation { roll: 0.1, pitch: -0.2, yaw: 1.5 },
            armed,
            failsafe,
            ..TelemetrySnapshot::default()
        }
    }

    fn frame_types(t: &CrsfTelemetry<Capture>) -> heapless::Vec<u8, 32> {
        t.sink().frames.iter().map(|f| f[2]).collect()
    }

    #[test]
    fn first_update_sends_attitude_and_mode() {
        let mut t = CrsfTelemetry::new(Capture::default());
        t.update(&snapshot(false, false));
        assert_eq!(frame_types(&t).as_slice(), &[CRSF_FRAMETYPE_ATTITUDE, CRSF_FRAMETYPE_FLIGHT_MODE]);

        let mode = &t.sink().frames[1];
        assert_eq!(&mode[3..mode.len() - 1], b"DISARM\0");
    }

    #[test]
    fn attitude_is_decimated() {
        let mut t = CrsfTelemetry::new(Capture::default());
        for _ in 0..ATTITUDE_EVERY * 3 {
            t.update(&snapshot(true, false));
        }
        let attitude = frame_types(&t).iter().filter(|&&ty| ty == CRSF_FRAMETYPE_ATTITUDE).count();
        assert_eq!(attitude, 3);
    }

    #[test]
    fn attitude_frame_is_well_formed() {
        let mut t = CrsfTelemetry::new(Capture::default());
        t.update(&snapshot(true, false));
        let f = &t.sink().frames[0];
        assert_eq!(f[0], CRSF_SYNC);
        assert_eq!(f.len(), 10);
        assert_eq!(i16::from_be_bytes([f[3], f[4]]), -2000);
        assert_eq!(i16::from_be_bytes([f[5], f[6]]), 1000);
        assert_eq!(f[9], crc8(&f[2..9]));
    }

    #[test]
    fn failsafe_wins_over_armed() {
        let mut t = CrsfTelemetry::new(Capture::default());
        t.update(&snapshot(true, true));
        let mode = &t.sink().frames[1];
        assert_eq!(&mode[3..mode.len() - 1], b"!FS!\0");
    }

    #[test]
    fn full_sink_counts_drops() {
        let mut t = CrsfTelemetry::new(Capture { full: true, ..Capture::default() });
        t.update(&snapshot(false, false));
        assert_eq!(t.dropped(), 2);
        assert!(t.sink().frames.is_empty());
    }
}
