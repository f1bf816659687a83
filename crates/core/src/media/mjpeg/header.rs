//! RFC 2435 payload headers.
//!
//! Every packet starts with the 8-byte main header (§3.1):
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! | Type-specific |              Fragment Offset                  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |      Type     |       Q       |     Width     |     Height    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! followed, for types 64..=127, by the restart marker header (§3.1.7):
//!
//! ```text
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |       Restart Interval        |F|L|       Restart Count       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! and, in the first packet of a frame with Q >= 128, by the quantization
//! table header (§3.1.8):
//!
//! ```text
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |      MBZ      |   Precision   |             Length            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Quantization Table Data                    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::error::{PacketError, Result};

/// Largest value the 24-bit fragment offset can carry.
pub const MAX_FRAGMENT_OFFSET: u32 = 0x00FF_FFFF;

/// Largest dimension expressible in 8-pixel units.
pub const MAX_DIMENSION: u16 = 2040;

/// Restart count meaning "fragments not aligned to restart intervals".
pub const UNALIGNED_RESTART_COUNT: u16 = 0x3FFF;

/// Map a byte offset into the 24-bit field.
///
/// Offsets past [`MAX_FRAGMENT_OFFSET`] have the maximum subtracted until
/// they fit. Frames that large are already outside what RFC 2435 can
/// describe; the result is an approximation that never collides with 0, the
/// frame-start value.
pub fn wrap_fragment_offset(offset: usize) -> u32 {
    let max = MAX_FRAGMENT_OFFSET as usize;
    let mut offset = offset;
    while offset > max {
        offset -= max;
    }
    offset as u32
}

/// Pixels to 8-pixel units. Dimensions above [`MAX_DIMENSION`] are sent as
/// 0, leaving the real size to out-of-band signalling.
pub fn dimension_units(pixels: u16) -> u8 {
    if pixels > MAX_DIMENSION {
        0
    } else {
        pixels.div_ceil(8) as u8
    }
}

/// RFC 2435 main JPEG header (§3.1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MainHeader {
    pub type_specific: u8,
    /// Byte offset of this packet's data within the frame (24 bits).
    pub fragment_offset: u32,
    pub type_: u8,
    pub q: u8,
    /// Width in 8-pixel units.
    pub width: u8,
    /// Height in 8-pixel units.
    pub height: u8,
}

impl MainHeader {
    pub const LEN: usize = 8;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::LEN {
            return Err(PacketError::TruncatedPacket { len: data.len() });
        }
        Ok(Self {
            type_specific: data[0],
            fragment_offset: u32::from_be_bytes([0, data[1], data[2], data[3]]),
            type_: data[4],
            q: data[5],
            width: data[6],
            height: data[7],
        })
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        let offset = (self.fragment_offset & MAX_FRAGMENT_OFFSET).to_be_bytes();
        [
            self.type_specific,
            offset[1],
            offset[2],
            offset[3],
            self.type_,
            self.q,
            self.width,
            self.height,
        ]
    }

    /// Types 64..=127 are followed by a restart marker header.
    pub fn has_restart_header(&self) -> bool {
        (64..128).contains(&self.type_)
    }

    pub fn width_pixels(&self) -> u16 {
        self.width as u16 * 8
    }

    pub fn height_pixels(&self) -> u16 {
        self.height as u16 * 8
    }
}

/// Restart marker header (§3.1.7).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestartHeader {
    pub restart_interval: u16,
    pub first: bool,
    pub last: bool,
    /// 14-bit restart count.
    pub restart_count: u16,
}

impl RestartHeader {
    pub const LEN: usize = 4;

    /// Header for packets whose boundaries ignore restart intervals:
    /// F and L set, count 0x3FFF.
    pub fn unaligned(restart_interval: u16) -> Self {
        Self {
            restart_interval,
            first: true,
            last: true,
            restart_count: UNALIGNED_RESTART_COUNT,
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::LEN {
            return Err(PacketError::TruncatedPacket { len: data.len() });
        }
        let flags_count = u16::from_be_bytes([data[2], data[3]]);
        Ok(Self {
            restart_interval: u16::from_be_bytes([data[0], data[1]]),
            first: flags_count & 0x8000 != 0,
            last: flags_count & 0x4000 != 0,
            restart_count: flags_count & 0x3FFF,
        })
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        let flags_count = (self.restart_count & 0x3FFF)
            | if self.first { 0x8000 } else { 0 }
            | if self.last { 0x4000 } else { 0 };
        let interval = self.restart_interval.to_be_bytes();
        let flags_count = flags_count.to_be_bytes();
        [interval[0], interval[1], flags_count[0], flags_count[1]]
    }
}

/// Quantization table header (§3.1.8), without the table data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuantizationTableHeader {
    pub mbz: u8,
    pub precision: u8,
    /// Bytes of table data that follow.
    pub length: u16,
}

impl QuantizationTableHeader {
    pub const LEN: usize = 4;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::LEN {
            return Err(PacketError::TruncatedPacket { len: data.len() });
        }
        Ok(Self {
            mbz: data[0],
            precision: data[1],
            length: u16::from_be_bytes([data[2], data[3]]),
        })
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        let length = self.length.to_be_bytes();
        [self.mbz, self.precision, length[0], length[1]]
    }
}
