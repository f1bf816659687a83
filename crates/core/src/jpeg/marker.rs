//! JPEG marker segments (ITU T.81 Annex B).
//!
//! Every marker is a `0xFF` prefix followed by a one-byte code. Most
//! markers carry a big-endian 2-byte length (which counts itself) and a
//! payload; a handful are bare:
//!
//! ```text
//! FF D8                      ← SOI, no length
//! FF DB 00 43 <67 bytes>     ← DQT, length 0x43 = 2 + 65
//! FF D0                      ← RST0, no length
//! FF D9                      ← EOI, no length
//! ```
//!
//! Any number of `0xFF` fill bytes may precede the code; they are kept in
//! [`Marker::prefix_count`] so a segment can be written back unchanged.

use crate::error::{PacketError, Result};

/// The marker prefix byte.
pub const PREFIX: u8 = 0xFF;

pub const SOI: u8 = 0xD8;
pub const EOI: u8 = 0xD9;
pub const SOF0: u8 = 0xC0;
pub const DHT: u8 = 0xC4;
pub const DQT: u8 = 0xDB;
pub const DRI: u8 = 0xDD;
pub const SOS: u8 = 0xDA;

/// Marker codes of Table B.1, grouped the way the packetizer dispatches on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerCode {
    /// Start of frame, `n` in 0..=15 excluding 4, 8 and 12.
    Sof(u8),
    /// Define Huffman table(s).
    Dht,
    /// Define arithmetic coding conditioning(s).
    Dac,
    /// Restart with modulo 8 count `m`.
    Rst(u8),
    Soi,
    Eoi,
    Sos,
    /// Define quantization table(s).
    Dqt,
    /// Define number of lines.
    Dnl,
    /// Define restart interval.
    Dri,
    /// Define hierarchical progression.
    Dhp,
    /// Expand reference component(s).
    Exp,
    /// Application segment `n`.
    App(u8),
    /// Reserved for JPEG extensions, `JPG` itself is `Jpg(0xC8)`.
    Jpg(u8),
    /// Comment.
    Com,
    /// Temporary private use in arithmetic coding.
    Tem,
    /// Reserved codes 0x02..=0xBF.
    Reserved(u8),
}

impl MarkerCode {
    /// Classify a code byte. `0x00` (byte stuffing) and `0xFF` (fill) are
    /// not markers and yield `None`.
    pub fn from_u8(code: u8) -> Option<MarkerCode> {
        use MarkerCode::*;
        Some(match code {
            0x00 | 0xFF => return None,
            0x01 => Tem,
            0x02..=0xBF => Reserved(code),
            0xC4 => Dht,
            0xC8 => Jpg(code),
            0xCC => Dac,
            0xC0..=0xCF => Sof(code - 0xC0),
            0xD0..=0xD7 => Rst(code - 0xD0),
            0xD8 => Soi,
            0xD9 => Eoi,
            0xDA => Sos,
            0xDB => Dqt,
            0xDC => Dnl,
            0xDD => Dri,
            0xDE => Dhp,
            0xDF => Exp,
            0xE0..=0xEF => App(code - 0xE0),
            0xF0..=0xFD => Jpg(code),
            0xFE => Com,
        })
    }

    /// The code byte written after the prefix.
    pub fn to_u8(self) -> u8 {
        use MarkerCode::*;
        match self {
            Sof(n) => 0xC0 + n,
            Dht => DHT,
            Dac => 0xCC,
            Rst(m) => 0xD0 + m,
            Soi => SOI,
            Eoi => EOI,
            Sos => SOS,
            Dqt => DQT,
            Dnl => 0xDC,
            Dri => DRI,
            Dhp => 0xDE,
            Exp => 0xDF,
            App(n) => 0xE0 + n,
            Jpg(code) | Reserved(code) => code,
            Com => 0xFE,
            Tem => 0x01,
        }
    }

    /// Whether a 2-byte length field follows the code.
    pub fn has_length(self) -> bool {
        !matches!(
            self,
            MarkerCode::Soi | MarkerCode::Eoi | MarkerCode::Rst(_) | MarkerCode::Tem
        )
    }
}

/// Largest segment payload: the 16-bit length field counts its own two bytes.
pub const MAX_SEGMENT_DATA: usize = u16::MAX as usize - 2;

/// One marker segment as found in (or destined for) a JPEG bitstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    /// Number of `0xFF` bytes before the code (at least 1 for a real marker).
    pub prefix_count: u32,
    pub code: u8,
    /// Length field value, counting its own two bytes. 0 for bare markers.
    pub declared_length: u32,
    pub data: Vec<u8>,
}

impl Marker {
    /// Build a segment with a single prefix byte. The declared length is
    /// derived from `data` unless the code has no length field.
    ///
    /// `data` must be at most [`MAX_SEGMENT_DATA`] bytes; use
    /// [`try_new`](Self::try_new) when that is not known up front.
    pub fn new(code: u8, data: Vec<u8>) -> Self {
        debug_assert!(data.len() <= MAX_SEGMENT_DATA, "segment data too long");
        let declared_length = if is_bare(code) {
            0
        } else {
            data.len() as u32 + 2
        };
        Self {
            prefix_count: 1,
            code,
            declared_length,
            data,
        }
    }

    /// Like [`new`](Self::new), rejecting data the length field cannot
    /// describe.
    pub fn try_new(code: u8, data: Vec<u8>) -> Result<Self> {
        if !is_bare(code) && data.len() > MAX_SEGMENT_DATA {
            return Err(PacketError::SegmentTooLong {
                code,
                len: data.len(),
            });
        }
        Ok(Self::new(code, data))
    }

    /// A bare marker such as SOI or EOI.
    pub fn bare(code: u8) -> Self {
        Self {
            prefix_count: 1,
            code,
            declared_length: 0,
            data: Vec::new(),
        }
    }

    /// Decoded marker code, `None` for stuffing/fill codes.
    pub fn kind(&self) -> Option<MarkerCode> {
        MarkerCode::from_u8(self.code)
    }

    /// Total number of bytes [`write_to`](Self::write_to) produces.
    pub fn encoded_len(&self) -> usize {
        let prefix = self.prefix_count as usize + 1;
        if is_bare(self.code) {
            prefix
        } else {
            prefix + 2 + self.data.len()
        }
    }

    /// Append the serialized segment: prefix bytes, code, then (unless bare)
    /// the big-endian length `data.len() + 2` and the data. Data beyond
    /// [`MAX_SEGMENT_DATA`] bytes cannot be described by the length field.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend(std::iter::repeat_n(PREFIX, self.prefix_count as usize));
        out.push(self.code);
        if is_bare(self.code) {
            return;
        }
        debug_assert!(self.data.len() <= MAX_SEGMENT_DATA, "segment data too long");
        let length = (self.data.len() + 2) as u16;
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(&self.data);
    }

    /// Serialize into a fresh buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.write_to(&mut out);
        out
    }
}

/// Codes that never carry a length field. Unknown codes are assumed to
/// have one, which is what ITU T.81 §B.1.1.4 requires of new markers.
fn is_bare(code: u8) -> bool {
    MarkerCode::from_u8(code).is_some_and(|k| !k.has_length())
}
