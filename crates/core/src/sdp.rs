//! SDP (Session Description Protocol) generation (RFC 8866).
//!
//! Describes one sendonly video stream:
//!
//! ```text
//! v=0                                          ← protocol version
//! o=<user> <sess-id> <sess-ver> IN IP4 <addr>  ← origin
//! s=<session-name>                             ← session name
//! c=IN IP4 <addr>                              ← connection address
//! t=0 0                                        ← timing (live stream)
//! a=tool:rtp-jpeg                              ← generator
//! a=sendonly                                   ← direction
//! m=video 0 RTP/AVP 26                         ← media description
//! a=rtpmap:26 JPEG/90000                       ← codec/clock rate
//! a=control:track1                             ← track control URL
//! ```

use crate::media::Packetizer;

/// Session-level SDP fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub username: String,
    pub session_id: String,
    pub session_version: String,
    pub session_name: String,
}

impl Default for SessionDescription {
    fn default() -> Self {
        Self {
            username: "-".to_string(),
            session_id: "0".to_string(),
            session_version: "0".to_string(),
            session_name: "Stream".to_string(),
        }
    }
}

/// Generate an SDP body for the stream produced by `packetizer`.
pub fn generate_sdp(packetizer: &dyn Packetizer, ip: &str, session: &SessionDescription) -> String {
    let mut sdp: Vec<String> = Vec::new();

    sdp.push("v=0".to_string());
    sdp.push(format!(
        "o={} {} {} IN IP4 {}",
        session.username, session.session_id, session.session_version, ip
    ));
    sdp.push(format!("s={}", session.session_name));
    sdp.push(format!("c=IN IP4 {}", ip));
    sdp.push("t=0 0".to_string());
    sdp.push("a=tool:rtp-jpeg".to_string());
    sdp.push("a=sendonly".to_string());
    sdp.push(format!("m=video 0 RTP/AVP {}", packetizer.payload_type()));
    sdp.extend(packetizer.sdp_attributes());

    tracing::debug!("SDP: {}", sdp.join("\r\n"));

    format!("{}\r\n", sdp.join("\r\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::mjpeg::{MjpegPacketizer, PacketizerConfig};

    #[test]
    fn generates_jpeg_sdp() {
        let packetizer = MjpegPacketizer::new(0x12345678, PacketizerConfig::default());
        let session = SessionDescription {
            username: "server".to_string(),
            session_id: "1234567890".to_string(),
            session_version: "1".to_string(),
            session_name: "Test Session".to_string(),
        };
        let sdp = generate_sdp(&packetizer, "192.168.1.100", &session);
        assert!(sdp.contains("v=0\r\n"));
        assert!(sdp.contains("o=server 1234567890 1 IN IP4 192.168.1.100\r\n"));
        assert!(sdp.contains("s=Test Session\r\n"));
        assert!(sdp.contains("c=IN IP4 192.168.1.100\r\n"));
        assert!(sdp.contains("a=sendonly\r\n"));
        assert!(
            sdp.contains("m=video 0 RTP/AVP 26\r\n"),
            "JPEG uses static payload type 26"
        );
        assert!(sdp.contains("a=rtpmap:26 JPEG/90000\r\n"));
        assert!(sdp.contains("a=control:track1\r\n"));
        assert!(!sdp.contains("a=fmtp"), "RFC 2435 defines no fmtp parameters");

        let sendonly_idx = sdp.find("a=sendonly").unwrap();
        let m_idx = sdp.find("m=video").unwrap();
        let rtpmap_idx = sdp.find("a=rtpmap").unwrap();
        assert!(sendonly_idx < m_idx, "session-level attrs must precede m= line");
        assert!(rtpmap_idx > m_idx, "media attributes must follow m=video");
        assert!(sdp.ends_with("\r\n"), "SDP must end with CRLF");
    }

    #[test]
    fn default_session_fields() {
        let packetizer = MjpegPacketizer::new(1, PacketizerConfig::default());
        let sdp = generate_sdp(&packetizer, "127.0.0.1", &SessionDescription::default());
        assert!(sdp.starts_with("v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=Stream\r\n"));
    }
}
