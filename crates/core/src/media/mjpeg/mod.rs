//! JPEG over RTP (RFC 2435).
//!
//! - [`header`]: the RFC 2435 payload headers.
//! - [`packetizer`]: baseline JPEG → RFC 2435 payloads.
//! - [`depacketizer`]: RTP packets → byte ranges in a reassembly buffer.
//!
//! [`MjpegPacketizer`] and [`MjpegDepacketizer`] wrap those in the codec
//! traits, adding the RTP header on the way out and frame grouping by RTP
//! timestamp on the way in. JPEG uses the static payload type 26:
//! `a=rtpmap:26 JPEG/90000`.

pub mod depacketizer;
pub mod header;
pub mod packetizer;

use crate::error::Result;

use super::assembly::{FrameBuffer, ReassemblyBuffer};
use super::rtp::{RTP_HEADER_LEN, RtpHeader, RtpPacket};
use super::{Depacketizer, Packetizer};

pub use depacketizer::{DepacketizerConfig, Rfc2435Depacketizer};
pub use packetizer::{DEFAULT_MTU, JpegFrame, JpegPayload, PacketizerConfig, packetize_jpeg};

/// Static RTP payload type for JPEG (RFC 3551 §6).
pub const JPEG_PAYLOAD_TYPE: u8 = 26;

/// RTP clock rate for JPEG video.
pub const JPEG_CLOCK_RATE: u32 = 90_000;

/// RFC 2435 packetizer producing complete RTP packets.
#[derive(Debug)]
pub struct MjpegPacketizer {
    header: RtpHeader,
    config: PacketizerConfig,
}

impl MjpegPacketizer {
    pub fn new(ssrc: u32, config: PacketizerConfig) -> Self {
        Self {
            header: RtpHeader::new(JPEG_PAYLOAD_TYPE, ssrc),
            config,
        }
    }

    /// Create with a random SSRC (RFC 3550 §8.1).
    pub fn with_random_ssrc(config: PacketizerConfig) -> Self {
        Self {
            header: RtpHeader::with_random_ssrc(JPEG_PAYLOAD_TYPE),
            config,
        }
    }

    pub fn config(&self) -> &PacketizerConfig {
        &self.config
    }

    pub fn ssrc(&self) -> u32 {
        self.header.ssrc
    }
}

impl Packetizer for MjpegPacketizer {
    fn packetize(
        &mut self,
        encoded_data: &[u8],
        timestamp_increment: u32,
    ) -> Result<Vec<Vec<u8>>> {
        let payloads = packetize_jpeg(encoded_data, &self.config)?;
        let packets: Vec<Vec<u8>> = payloads
            .into_iter()
            .map(|payload| {
                let mut packet = Vec::with_capacity(RTP_HEADER_LEN + payload.data.len());
                self.header.write_to(payload.marker, &mut packet);
                packet.extend_from_slice(&payload.data);
                packet
            })
            .collect();

        self.header.advance_timestamp(timestamp_increment);

        tracing::trace!(
            rtp_packets = packets.len(),
            frame_bytes = encoded_data.len(),
            seq = self.header.sequence(),
            ts = self.header.timestamp(),
            "frame packetized"
        );

        Ok(packets)
    }

    fn codec_name(&self) -> &'static str {
        "JPEG"
    }

    fn clock_rate(&self) -> u32 {
        JPEG_CLOCK_RATE
    }

    fn payload_type(&self) -> u8 {
        JPEG_PAYLOAD_TYPE
    }

    fn sdp_attributes(&self) -> Vec<String> {
        vec![
            format!("a=rtpmap:{} JPEG/{}", JPEG_PAYLOAD_TYPE, JPEG_CLOCK_RATE),
            "a=control:track1".to_string(),
        ]
    }

    fn next_sequence(&self) -> u16 {
        self.header.sequence()
    }

    fn next_rtp_timestamp(&self) -> u32 {
        self.header.timestamp()
    }
}

/// Whether RTP timestamp `a` lies after `b`, allowing for 32-bit wrap.
fn timestamp_is_newer(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) > 0
}

/// RFC 2435 receiver producing complete JPEG images.
///
/// Packets are grouped into frames by RTP timestamp. A packet with a newer
/// timestamp abandons whatever is left of the current frame; packets with
/// an older one arrived too late and are dropped. A frame that fails to
/// parse is dropped and its remaining packets are ignored.
#[derive(Debug, Default)]
pub struct MjpegDepacketizer {
    inner: Rfc2435Depacketizer,
    frame: FrameBuffer,
    timestamp: Option<u32>,
    /// The current timestamp's frame was emitted or dropped.
    finished: bool,
}

impl MjpegDepacketizer {
    pub fn new(config: DepacketizerConfig) -> Self {
        Self {
            inner: Rfc2435Depacketizer::new(config),
            ..Default::default()
        }
    }

    pub fn config(&self) -> &DepacketizerConfig {
        self.inner.config()
    }

    fn start_frame(&mut self, timestamp: u32) {
        if !self.finished && !self.frame.is_empty() {
            tracing::warn!(
                timestamp = self.timestamp,
                ranges = self.frame.len(),
                "incomplete JPEG frame abandoned"
            );
        }
        self.frame.clear();
        self.inner.reset();
        self.timestamp = Some(timestamp);
        self.finished = false;
    }

    fn finish_frame(&mut self) {
        self.frame.clear();
        self.inner.reset();
        self.finished = true;
    }
}

impl Depacketizer for MjpegDepacketizer {
    fn depacketize(&mut self, packet: &[u8]) -> Result<Option<Vec<u8>>> {
        let packet = RtpPacket::parse(packet)?;

        match self.timestamp {
            Some(current) if packet.timestamp != current => {
                if !timestamp_is_newer(packet.timestamp, current) {
                    tracing::debug!(
                        sequence = packet.sequence,
                        timestamp = packet.timestamp,
                        current,
                        "late packet from an earlier frame dropped"
                    );
                    return Ok(None);
                }
                self.start_frame(packet.timestamp);
            }
            None => self.start_frame(packet.timestamp),
            Some(_) => {}
        }
        if self.finished {
            tracing::trace!(
                sequence = packet.sequence,
                timestamp = packet.timestamp,
                "packet for finished frame ignored"
            );
            return Ok(None);
        }

        if let Err(e) = self.inner.process_packet(&packet, &mut self.frame) {
            tracing::warn!(
                error = %e,
                sequence = packet.sequence,
                timestamp = packet.timestamp,
                "JPEG frame dropped"
            );
            self.finish_frame();
            return Err(e);
        }

        if !self.frame.is_complete() {
            return Ok(None);
        }

        let jpeg = self.frame.assemble();
        tracing::debug!(
            timestamp = packet.timestamp,
            ranges = self.frame.len(),
            bytes = jpeg.len(),
            "JPEG frame reassembled"
        );
        self.finish_frame();
        Ok(Some(jpeg))
    }

    fn codec_name(&self) -> &'static str {
        "JPEG"
    }

    fn clock_rate(&self) -> u32 {
        JPEG_CLOCK_RATE
    }
}
