//! Error types for the JPEG/RTP codec.

/// Errors that can occur while packetizing or depacketizing RFC 2435 payloads.
///
/// Variants map to the failure modes of each stage:
///
/// - **JPEG input**: [`MissingStartOfImage`](Self::MissingStartOfImage),
///   [`MissingStartOfFrame`](Self::MissingStartOfFrame),
///   [`MissingStartOfScan`](Self::MissingStartOfScan),
///   [`InvalidStartOfScan`](Self::InvalidStartOfScan),
///   [`MalformedMarker`](Self::MalformedMarker),
///   [`SegmentTooLong`](Self::SegmentTooLong).
/// - **RFC 2435 fields**: [`ReservedQuality`](Self::ReservedQuality),
///   [`IllegalDynamicTable`](Self::IllegalDynamicTable),
///   [`ReservedLegacyType`](Self::ReservedLegacyType),
///   [`TruncatedPacket`](Self::TruncatedPacket).
/// - **Transport framing**: [`InvalidRtpHeader`](Self::InvalidRtpHeader),
///   [`MtuTooSmall`](Self::MtuTooSmall).
///
/// None of these are fatal: the caller decides whether to drop the packet,
/// the frame, or the whole session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    /// Q value 0 is reserved (RFC 2435 §3.1.4), and a quality of 0 cannot
    /// be turned into a scale factor.
    #[error("reserved quality value 0")]
    ReservedQuality,

    /// Q=255 demands inline tables but the table header length was 0
    /// (RFC 2435 §3.1.8).
    #[error("Q=255 requires non-empty dynamic quantization tables")]
    IllegalDynamicTable,

    /// Types 2..=5 are only meaningful to legacy (RFC 2035) receivers.
    #[error("reserved legacy type {0}")]
    ReservedLegacyType(u8),

    /// Not enough payload bytes for the fixed RFC 2435 header or a
    /// declared sub-header.
    #[error("truncated packet: {len} payload bytes")]
    TruncatedPacket { len: usize },

    /// The SOS segment length does not match its declared component count.
    #[error("invalid start-of-scan segment: length {declared}, expected {expected}")]
    InvalidStartOfScan { declared: usize, expected: usize },

    /// A marker segment declared a length that cannot be honoured.
    #[error("malformed marker 0x{code:02X}: declared {declared} bytes, {available} available")]
    MalformedMarker {
        code: u8,
        declared: usize,
        available: usize,
    },

    /// Segment data does not fit the 16-bit length field.
    #[error("marker 0x{code:02X} segment of {len} bytes exceeds the 16-bit length field")]
    SegmentTooLong { code: u8, len: usize },

    /// Input does not begin with an SOI marker.
    #[error("missing start-of-image marker")]
    MissingStartOfImage,

    /// No baseline SOF segment precedes the scan.
    #[error("missing start-of-frame marker")]
    MissingStartOfFrame,

    /// The marker scan ended before an SOS segment was found.
    #[error("missing start-of-scan marker")]
    MissingStartOfScan,

    /// The MTU cannot hold the RFC 2435 headers plus at least one scan byte.
    #[error("MTU {mtu} too small for {overhead} bytes of payload headers")]
    MtuTooSmall { mtu: usize, overhead: usize },

    /// The RTP fixed header (RFC 3550 §5.1) could not be parsed.
    #[error("invalid RTP header: {0}")]
    InvalidRtpHeader(&'static str),
}

/// Convenience alias for `Result<T, PacketError>`.
pub type Result<T> = std::result::Result<T, PacketError>;
