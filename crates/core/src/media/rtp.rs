use rand::RngExt;

use crate::error::{PacketError, Result};

/// Fixed header length without CSRCs.
pub const RTP_HEADER_LEN: usize = 12;

/// Send-side RTP state for one stream (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Every packet of a JPEG frame shares one timestamp; the sequence number
/// moves on by one per packet and wraps at 65535. Headers are always
/// written without padding, extension or CSRCs.
#[derive(Debug)]
pub struct RtpHeader {
    pub payload_type: u8,
    pub ssrc: u32,
    sequence: u16,
    timestamp: u32,
}

impl RtpHeader {
    pub fn new(payload_type: u8, ssrc: u32) -> Self {
        tracing::debug!(
            payload_type,
            ssrc = format_args!("{:#010X}", ssrc),
            "RTP stream state created"
        );
        Self {
            payload_type,
            ssrc,
            sequence: 0,
            timestamp: 0,
        }
    }

    /// Same as [`new`](Self::new) with a random SSRC (RFC 3550 §8.1).
    pub fn with_random_ssrc(payload_type: u8) -> Self {
        Self::new(payload_type, rand::rng().random::<u32>())
    }

    /// Sequence number the next packet will carry.
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Timestamp of the frame currently being sent.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Append a fixed header to `out` and step the sequence number.
    ///
    /// `marker` is set on the packet that ends a JPEG frame (RFC 2435 §3).
    pub fn write_to(&mut self, marker: bool, out: &mut Vec<u8>) {
        out.push(2 << 6);
        out.push(((marker as u8) << 7) | (self.payload_type & 0x7F));
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.ssrc.to_be_bytes());
        self.sequence = self.sequence.wrapping_add(1);
    }

    /// Move to the next frame, `increment` clock ticks later (3000 for
    /// 30 fps at 90 kHz).
    pub fn advance_timestamp(&mut self, increment: u32) {
        self.timestamp = self.timestamp.wrapping_add(increment);
    }
}

/// Read-side view of a received RTP packet.
///
/// Borrows the datagram; `payload` excludes the CSRC list, any header
/// extension and trailing padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket<'a> {
    pub marker: bool,
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub csrc: Vec<u32>,
    pub payload: &'a [u8],
}

impl<'a> RtpPacket<'a> {
    /// Parse an RTP datagram (RFC 3550 §5.1, §5.3.1).
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < RTP_HEADER_LEN {
            return Err(PacketError::InvalidRtpHeader("shorter than fixed header"));
        }
        if data[0] >> 6 != 2 {
            return Err(PacketError::InvalidRtpHeader("version is not 2"));
        }
        let padding = data[0] & 0x20 != 0;
        let extension = data[0] & 0x10 != 0;
        let csrc_count = (data[0] & 0x0F) as usize;

        let mut offset = RTP_HEADER_LEN;
        let csrc_end = offset + csrc_count * 4;
        let csrc_bytes = data
            .get(offset..csrc_end)
            .ok_or(PacketError::InvalidRtpHeader("truncated CSRC list"))?;
        let csrc = csrc_bytes
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        offset = csrc_end;

        if extension {
            let ext = data
                .get(offset..offset + 4)
                .ok_or(PacketError::InvalidRtpHeader("truncated extension header"))?;
            let words = u16::from_be_bytes([ext[2], ext[3]]) as usize;
            offset += 4 + words * 4;
            if offset > data.len() {
                return Err(PacketError::InvalidRtpHeader("truncated extension"));
            }
        }

        let mut end = data.len();
        if padding {
            let pad = data[end - 1] as usize;
            if pad == 0 || offset + pad > end {
                return Err(PacketError::InvalidRtpHeader("invalid padding"));
            }
            end -= pad;
        }

        Ok(Self {
            marker: data[1] & 0x80 != 0,
            payload_type: data[1] & 0x7F,
            sequence: u16::from_be_bytes([data[2], data[3]]),
            timestamp: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            ssrc: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
            csrc,
            payload: &data[offset..end],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_header() -> RtpHeader {
        RtpHeader::new(26, 0xAABBCCDD)
    }

    fn written(h: &mut RtpHeader, marker: bool) -> Vec<u8> {
        let mut out = Vec::new();
        h.write_to(marker, &mut out);
        out
    }

    #[test]
    fn fixed_header_layout() {
        let mut h = make_header();
        let buf = written(&mut h, true);
        assert_eq!(buf.len(), RTP_HEADER_LEN);
        assert_eq!(buf[0], 0x80);
        assert_eq!(buf[1], 0x80 | 26);
        assert_eq!(&buf[2..4], &[0, 0]);
        assert_eq!(&buf[8..12], &[0xAA, 0xBB, 0xCC, 0xDD]);

        let buf = written(&mut h, false);
        assert_eq!(buf[1], 26);
        assert_eq!(&buf[2..4], &[0, 1]);
    }

    #[test]
    fn write_appends() {
        let mut h = make_header();
        let mut out = vec![0xEE];
        h.write_to(false, &mut out);
        assert_eq!(out.len(), 1 + RTP_HEADER_LEN);
        assert_eq!(out[0], 0xEE);
    }

    #[test]
    fn sequence_wraps() {
        let mut h = make_header();
        h.sequence = u16::MAX;
        let buf = written(&mut h, false);
        assert_eq!(&buf[2..4], &[0xFF, 0xFF]);
        assert_eq!(h.sequence(), 0);
    }

    #[test]
    fn timestamp_wraps() {
        let mut h = make_header();
        h.advance_timestamp(3000);
        assert_eq!(h.timestamp(), 3000);
        h.timestamp = u32::MAX - 999;
        h.advance_timestamp(3000);
        assert_eq!(h.timestamp(), 2000);
        let buf = written(&mut h, false);
        assert_eq!(&buf[4..8], &2000u32.to_be_bytes());
    }

    #[test]
    fn random_ssrc_differs() {
        let h1 = RtpHeader::with_random_ssrc(26);
        let h2 = RtpHeader::with_random_ssrc(26);
        assert_ne!(h1.ssrc, h2.ssrc);
    }

    #[test]
    fn parse_written_header() {
        let mut h = make_header();
        h.advance_timestamp(90_000);
        let mut packet = written(&mut h, true);
        packet.extend_from_slice(&[1, 2, 3]);

        let parsed = RtpPacket::parse(&packet).unwrap();
        assert!(parsed.marker);
        assert_eq!(parsed.payload_type, 26);
        assert_eq!(parsed.sequence, 0);
        assert_eq!(parsed.timestamp, 90_000);
        assert_eq!(parsed.ssrc, 0xAABBCCDD);
        assert!(parsed.csrc.is_empty());
        assert_eq!(parsed.payload, &[1, 2, 3]);
    }

    #[test]
    fn parse_skips_csrc_extension_and_padding() {
        let mut packet = written(&mut make_header(), false);
        packet[0] |= 0x20 | 0x10 | 1;
        packet.extend_from_slice(&0x01020304u32.to_be_bytes());
        // Extension: profile 0xBEDE, one 32-bit word.
        packet.extend_from_slice(&[0xBE, 0xDE, 0x00, 0x01, 0, 0, 0, 0]);
        packet.extend_from_slice(&[9, 9]);
        packet.extend_from_slice(&[0, 0, 3]);

        let parsed = RtpPacket::parse(&packet).unwrap();
        assert_eq!(parsed.csrc, vec![0x01020304]);
        assert_eq!(parsed.payload, &[9, 9]);
    }

    #[test]
    fn parse_rejects_bad_packets() {
        assert!(RtpPacket::parse(&[0x80; 11]).is_err());

        let mut packet = written(&mut make_header(), false);
        packet[0] = 0x40;
        assert!(RtpPacket::parse(&packet).is_err());

        let mut packet = written(&mut make_header(), false);
        packet[0] |= 0x02;
        assert_eq!(
            RtpPacket::parse(&packet),
            Err(PacketError::InvalidRtpHeader("truncated CSRC list"))
        );

        let mut packet = written(&mut make_header(), false);
        packet[0] |= 0x20;
        packet.push(5);
        assert_eq!(
            RtpPacket::parse(&packet),
            Err(PacketError::InvalidRtpHeader("invalid padding"))
        );
    }
}
