//! CRSF (Crossfire / ELRS) framing: RC channel and link statistics input, telemetry output.
//!
//! Frame layout: `[sync] [len] [type] [payload..] [crc]`, where `len` counts type, payload
//! and crc, and the CRC-8 (poly 0xD5) covers type and payload.

use crate::error::{Error, Result};

pub const CRSF_SYNC: u8 = 0xC8;
pub const CRSF_MAX_FRAME_LEN: usize = 64;

pub const CRSF_FRAMETYPE_LINK_STATISTICS: u8 = 0x14;
pub const CRSF_FRAMETYPE_ATTITUDE: u8 = 0x1E;
pub const CRSF_FRAMETYPE_RC_CHANNELS_PACKED: u8 = 0x16;
pub const CRSF_FRAMETYPE_FLIGHT_MODE: u8 = 0x21;

pub const CRSF_CHANNEL_COUNT: usize = 16;
const RC_PAYLOAD_LEN: usize = 22;
const LINK_STATS_PAYLOAD_LEN: usize = 10;

/// Channel value range as sent by ELRS/Crossfire transmitters.
pub const CRSF_CHANNEL_MIN: u16 = 172;
pub const CRSF_CHANNEL_MID: u16 = 992;
pub const CRSF_CHANNEL_MAX: u16 = 1811;

pub type Frame = heapless::Vec<u8, CRSF_MAX_FRAME_LEN>;

/// Raw 11-bit channel values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RcChannels {
    pub channels: [u16; CRSF_CHANNEL_COUNT],
}

impl Default for RcChannels {
    fn default() -> Self {
        Self {
            channels: [CRSF_CHANNEL_MID; CRSF_CHANNEL_COUNT],
        }
    }
}

/// Radio link report sent by the receiver alongside the channel frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStatistics {
    pub uplink_rssi_1: u8,
    pub uplink_rssi_2: u8,
    /// Percentage of uplink packets received.
    pub uplink_link_quality: u8,
    pub uplink_snr: i8,
    pub active_antenna: u8,
    pub rf_mode: u8,
    pub uplink_tx_power: u8,
    pub downlink_rssi: u8,
    pub downlink_link_quality: u8,
    pub downlink_snr: i8,
}

impl LinkStatistics {
    pub fn from_payload(p: &[u8]) -> Option<Self> {
        if p.len() != LINK_STATS_PAYLOAD_LEN {
            return None;
        }
        Some(Self {
            uplink_rssi_1: p[0],
            uplink_rssi_2: p[1],
            uplink_link_quality: p[2],
            uplink_snr: p[3] as i8,
            active_antenna: p[4],
            rf_mode: p[5],
            uplink_tx_power: p[6],
            downlink_rssi: p[7],
            downlink_link_quality: p[8],
            downlink_snr: p[9] as i8,
        })
    }

    pub fn to_payload(&self) -> [u8; LINK_STATS_PAYLOAD_LEN] {
        [
            self.uplink_rssi_1,
            self.uplink_rssi_2,
            self.uplink_link_quality,
            self.uplink_snr as u8,
            self.active_antenna,
            self.rf_mode,
            self.uplink_tx_power,
            self.downlink_rssi,
            self.downlink_link_quality,
            self.downlink_snr as u8,
        ]
    }

    /// The receiver reports failsafe once no uplink packet gets through.
    pub fn failsafe(&self) -> bool {
        self.uplink_link_quality == 0
    }
}

/// A decoded inbound frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CrsfPacket {
    Channels(RcChannels),
    LinkStatistics(LinkStatistics),
}

/// Newest packet of each kind found in one chunk of bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Latest {
    pub channels: Option<RcChannels>,
    pub link: Option<LinkStatistics>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParseState {
    Sync,
    Len,
    Body { total: usize },
}

/// Byte-at-a-time frame parser. Bad lengths or CRCs drop the frame and resync.
pub struct CrsfParser {
    state: ParseState,
    buffer: Frame,
}

impl Default for CrsfParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CrsfParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::Sync,
            buffer: Frame::new(),
        }
    }

    pub fn push_byte(&mut self, b: u8) -> Option<CrsfPacket> {
        match self.state {
            ParseState::Sync => {
                if b == CRSF_SYNC {
                    self.restart_with_sync();
                }
                None
            }
            ParseState::Len => {
                if !(2..=CRSF_MAX_FRAME_LEN as u8 - 2).contains(&b) {
                    if b == CRSF_SYNC {
                        self.restart_with_sync();
                    } else {
                        self.reset();
                    }
                    return None;
                }
                let _ = self.buffer.push(b);
                self.state = ParseState::Body { total: 2 + b as usize };
                None
            }
            ParseState::Body { total } => {
                let _ = self.buffer.push(b);
                if self.buffer.len() < total {
                    return None;
                }
                let result = decode_frame(&self.buffer);
                self.reset();
                result
            }
        }
    }

    /// Feeds a chunk and keeps the newest packet of each kind.
    pub fn push_bytes(&mut self, data: &[u8]) -> Latest {
        let mut latest = Latest::default();
        for &b in data {
            match self.push_byte(b) {
                Some(CrsfPacket::Channels(rc)) => latest.channels = Some(rc),
                Some(CrsfPacket::LinkStatistics(stats)) => latest.link = Some(stats),
                None => {}
            }
        }
        latest
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.state = ParseState::Sync;
    }

    fn restart_with_sync(&mut self) {
        self.buffer.clear();
        let _ = self.buffer.push(CRSF_SYNC);
        self.state = ParseState::Len;
    }
}

fn decode_frame(frame: &[u8]) -> Option<CrsfPacket> {
    let (body, crc) = frame[2..].split_at(frame.len() - 3);
    if crc8(body) != crc[0] {
        return None;
    }
    let (&frame_type, payload) = body.split_first()?;
    match frame_type {
        CRSF_FRAMETYPE_RC_CHANNELS_PACKED if payload.len() == RC_PAYLOAD_LEN => {
            Some(CrsfPacket::Channels(unpack_channels(payload)))
        }
        CRSF_FRAMETYPE_LINK_STATISTICS => {
            LinkStatistics::from_payload(payload).map(CrsfPacket::LinkStatistics)
        }
        _ => None,
    }
}

pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |mut crc, &b| {
        crc ^= b;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 { (crc << 1) ^ 0xD5 } else { crc << 1 };
        }
        crc
    })
}

/// 16 channels of 11 bits, little-endian bit order.
fn unpack_channels(payload: &[u8]) -> RcChannels {
    let mut channels = [0u16; CRSF_CHANNEL_COUNT];
    let mut acc: u32 = 0;
    let mut bits = 0;
    let mut bytes = payload.iter();

    for ch in channels.iter_mut() {
        while bits < 11 {
            if let Some(&b) = bytes.next() {
                acc |= (b as u32) << bits;
            }
            bits += 8;
        }
        *ch = (acc & 0x07ff) as u16;
        acc >>= 11;
        bits -= 11;
    }
    RcChannels { channels }
}

pub fn pack_channels(rc: &RcChannels) -> [u8; RC_PAYLOAD_LEN] {
    let mut out = [0u8; RC_PAYLOAD_LEN];
    let mut acc: u32 = 0;
    let mut bits = 0;
    let mut idx = 0;

    for &ch in rc.channels.iter() {
        acc |= ((ch & 0x07ff) as u32) << bits;
        bits += 11;
        while bits >= 8 {
            out[idx] = acc as u8;
            idx += 1;
            acc >>= 8;
            bits -= 8;
        }
    }
    out
}

/// Serializes one frame. Fails when the payload does not fit.
pub fn build_frame(frame_type: u8, payload: &[u8]) -> Result<Frame> {
    let mut frame = Frame::new();
    let len = payload.len() + 2;
    if len + 2 > CRSF_MAX_FRAME_LEN {
        return Err(Error::BufferFull);
    }
    frame.push(CRSF_SYNC).map_err(|_| Error::BufferFull)?;
    frame.push(len as u8).map_err(|_| Error::BufferFull)?;
    frame.push(frame_type).map_err(|_| Error::BufferFull)?;
    frame.extend_from_slice(payload).map_err(|_| Error::BufferFull)?;
    let crc = crc8(&frame[2..]);
    frame.push(crc).map_err(|_| Error::BufferFull)?;
    Ok(frame)
}

pub fn rc_channels_frame(rc: &RcChannels) -> Result<Frame> {
    build_frame(CRSF_FRAMETYPE_RC_CHANNELS_PACKED, &pack_channels(rc))
}

/// Pitch, roll, yaw in units of 100 µrad, big-endian.
pub fn payload_attitude(pitch_rad: f32, roll_rad: f32, yaw_rad: f32) -> [u8; 6] {
    let mut buf = [0u8; 6];
    for (chunk, angle) in buf.chunks_exact_mut(2).zip([pitch_rad, roll_rad, yaw_rad]) {
        chunk.copy_from_slice(&((angle * 10_000.0) as i16).to_be_bytes());
    }
    buf
}

/// Null-terminated mode name.
pub fn payload_flight_mode(mode: &str) -> Result<heapless::Vec<u8, 16>> {
    let mut buf = heapless::Vec::new();
    buf.extend_from_slice(mode.as_bytes()).map_err(|_| Error::BufferFull)?;
    buf.push(0).map_err(|_| Error::BufferFull)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_channels() -> RcChannels {
        let mut rc = RcChannels::default();
        rc.channels[0] = CRSF_CHANNEL_MIN;
        rc.channels[2] = CRSF_CHANNEL_MAX;
        rc.channels[5] = 0x07ff;
        rc.channels[15] = 1;
        rc
    }

    #[test]
    fn crc_of_empty_is_zero() {
        assert_eq!(crc8(&[]), 0);
        assert_ne!(crc8(&[CRSF_FRAMETYPE_ATTITUDE]), 0);
    }

    #[test]
    fn parses_rc_frame() {
        let rc = sample_channels();
        let frame = rc_channels_frame(&rc).unwrap();
        assert_eq!(frame.len(), 26);
        assert_eq!(frame[1], 24);

        let mut parser = CrsfParser::new();
        assert_eq!(parser.push_bytes(&frame).channels, Some(rc));
    }

    #[test]
    fn resyncs_after_garbage() {
        let rc = sample_channels();
        let frame = rc_channels_frame(&rc).unwrap();
        let mut parser = CrsfParser::new();
        assert_eq!(parser.push_bytes(&[0x00, 0x13, 0xC8, 0x01, 0x55]), Latest::default());
        assert_eq!(parser.push_bytes(&frame).channels, Some(rc));
    }

    #[test]
    fn sync_in_length_position_restarts() {
        let rc = sample_channels();
        let frame = rc_channels_frame(&rc).unwrap();
        let mut parser = CrsfParser::new();
        parser.push_byte(CRSF_SYNC);
        assert_eq!(parser.push_bytes(&frame).channels, Some(rc));
    }

    #[test]
    fn bad_crc_is_dropped() {
        let mut frame = rc_channels_frame(&sample_channels()).unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0xff;
        let mut parser = CrsfParser::new();
        assert_eq!(parser.push_bytes(&frame), Latest::default());

        // parser is usable again
        let good = rc_channels_frame(&RcChannels::default()).unwrap();
        assert_eq!(parser.push_bytes(&good).channels, Some(RcChannels::default()));
    }

    #[test]
    fn other_frame_types_are_skipped() {
        let frame = build_frame(CRSF_FRAMETYPE_ATTITUDE, &payload_attitude(0.1, 0.2, 0.3)).unwrap();
        let mut parser = CrsfParser::new();
        assert_eq!(parser.push_bytes(&frame), Latest::default());
    }

    #[test]
    fn returns_latest_of_several_frames() {
        let first = sample_channels();
        let mut second = sample_channels();
        second.channels[3] = 1500;
        let mut bytes: heapless::Vec<u8, 128> = heapless::Vec::new();
        bytes.extend_from_slice(&rc_channels_frame(&first).unwrap()).unwrap();
        bytes.extend_from_slice(&rc_channels_frame(&second).unwrap()).unwrap();

        let mut parser = CrsfParser::new();
        assert_eq!(parser.push_bytes(&bytes).channels, Some(second));
    }

    fn link_stats(uplink_lq: u8) -> LinkStatistics {
        LinkStatistics {
            uplink_rssi_1: 60,
            uplink_rssi_2: 62,
            uplink_link_quality: uplink_lq,
            uplink_snr: -7,
            rf_mode: 4,
            downlink_link_quality: 100,
            ..Default::default()
        }
    }

    #[test]
    fn parses_link_statistics() {
        let stats = link_stats(87);
        let frame = build_frame(CRSF_FRAMETYPE_LINK_STATISTICS, &stats.to_payload()).unwrap();
        let mut parser = CrsfParser::new();
        let latest = parser.push_bytes(&frame);
        assert_eq!(latest.link, Some(stats));
        assert_eq!(latest.channels, None);
        assert!(!stats.failsafe());
        assert!(link_stats(0).failsafe());
    }

    #[test]
    fn short_link_statistics_are_dropped() {
        let frame = build_frame(CRSF_FRAMETYPE_LINK_STATISTICS, &[0u8; 6]).unwrap();
        let mut parser = CrsfParser::new();
        assert_eq!(parser.push_bytes(&frame), Latest::default());
    }

    #[test]
    fn chunk_keeps_channels_and_link_report() {
        let rc = sample_channels();
        let mut bytes: heapless::Vec<u8, 128> = heapless::Vec::new();
        bytes.extend_from_slice(&rc_channels_frame(&rc).unwrap()).unwrap();
        let stats = build_frame(CRSF_FRAMETYPE_LINK_STATISTICS, &link_stats(0).to_payload()).unwrap();
        bytes.extend_from_slice(&stats).unwrap();

        let mut parser = CrsfParser::new();
        let latest = parser.push_bytes(&bytes);
        assert_eq!(latest.channels, Some(rc));
        assert_eq!(latest.link, Some(link_stats(0)));
    }

    #[test]
    fn attitude_payload_is_big_endian_decimilliradians() {
        let p = payload_attitude(0.5, -0.25, 1.0);
        assert_eq!(i16::from_be_bytes([p[0], p[1]]), 5000);
        assert_eq!(i16::from_be_bytes([p[2], p[3]]), -2500);
        assert_eq!(i16::from_be_bytes([p[4], p[5]]), 10000);
    }

    #[test]
    fn flight_mode_frame_layout() {
        let payload = payload_flight_mode("ACRO").unwrap();
        assert_eq!(payload.as_slice(), b"ACRO\0");

        let frame = build_frame(CRSF_FRAMETYPE_FLIGHT_MODE, &payload).unwrap();
        assert_eq!(frame[0], CRSF_SYNC);
        assert_eq!(frame[1] as usize, payload.len() + 2);
        assert_eq!(frame[2], CRSF_FRAMETYPE_FLIGHT_MODE);
        assert_eq!(*frame.last().unwrap(), crc8(&frame[2..frame.len() - 1]));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        assert_eq!(build_frame(0x7f, &[0u8; 61]), Err(Error::BufferFull));
        assert!(payload_flight_mode("a mode name far too long").is_err());
    }
}
