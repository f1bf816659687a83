//! RTP payload formats.
//!
//! Each payload format provides two capabilities: a [`Packetizer`] turning
//! encoded frames into RTP packets, and a [`Depacketizer`] turning RTP
//! packets back into frames.
//!
//! A frame travels as one or more RTP packets that share a timestamp. The
//! sequence number orders them (and wraps at 65535); the marker bit flags
//! the packet that ends the frame. [`rtp::RtpHeader`] keeps that state on
//! the sending side, [`rtp::RtpPacket`] reads it back on the receiving side,
//! and [`assembly`] holds the pieces until a frame is whole.
//!
//! Implemented: JPEG ([`mjpeg`], RFC 2435).

pub mod assembly;
pub mod mjpeg;
pub mod rtp;

use crate::error::Result;

/// Sending half of a payload format.
///
/// Implementations wrap an [`rtp::RtpHeader`] and describe themselves for
/// SDP.
pub trait Packetizer: Send {
    /// Split one encoded frame into complete RTP packets, then move the
    /// timestamp on by `timestamp_increment`.
    ///
    /// On error nothing is emitted and neither sequence number nor
    /// timestamp changes.
    fn packetize(
        &mut self,
        encoded_data: &[u8],
        timestamp_increment: u32,
    ) -> Result<Vec<Vec<u8>>>;

    /// Codec name for the SDP `a=rtpmap` attribute (e.g. `"JPEG"`).
    fn codec_name(&self) -> &'static str;

    /// RTP clock rate in Hz.
    fn clock_rate(&self) -> u32;

    /// RTP payload type number (RFC 3551). JPEG has the static type 26.
    fn payload_type(&self) -> u8;

    /// SDP media-level attribute lines for this codec, `a=` prefix included.
    fn sdp_attributes(&self) -> Vec<String>;

    /// Sequence number of the next packet.
    fn next_sequence(&self) -> u16;

    /// RTP timestamp of the next frame.
    fn next_rtp_timestamp(&self) -> u32;
}

/// Receiving half of a payload format, fed one RTP packet at a time in
/// arrival order.
pub trait Depacketizer: Send {
    /// Consume one RTP packet (header included). Returns the frame it
    /// completed, if any.
    ///
    /// An error means the packet was rejected and its frame abandoned.
    fn depacketize(&mut self, packet: &[u8]) -> Result<Option<Vec<u8>>>;

    fn codec_name(&self) -> &'static str;

    fn clock_rate(&self) -> u32;
}
