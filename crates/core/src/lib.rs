//! JPEG over RTP (RFC 2435).
//!
//! Converts baseline JPEG bitstreams to RTP packets and back:
//!
//! ```text
//! JPEG ──► jpeg::scanner ──► media::mjpeg::packetizer ──► RTP packets
//! RTP packets ──► media::mjpeg::depacketizer ──► media::assembly ──► JPEG
//!                          │
//!                          └── jpeg::quant + jpeg::header rebuild the header
//! ```
//!
//! Transport, session negotiation and pixel encode/decode live outside this
//! crate.

pub mod error;
pub mod jpeg;
pub mod media;
pub mod sdp;

pub use error::{PacketError, Result};
pub use media::assembly::{FrameBuffer, ReassemblyBuffer};
pub use media::mjpeg::{
    DepacketizerConfig, MjpegDepacketizer, MjpegPacketizer, PacketizerConfig,
    Rfc2435Depacketizer,
};
pub use media::rtp::{RtpHeader, RtpPacket};
pub use media::{Depacketizer, Packetizer};
pub use sdp::{SessionDescription, generate_sdp};
