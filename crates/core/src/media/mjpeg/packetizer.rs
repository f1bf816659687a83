use crate::error::{PacketError, Result};
use crate::jpeg::header::{CHROMA_SAMPLING, LUMA_SAMPLING_2X1};
use crate::jpeg::marker::{DQT, DRI, EOI, PREFIX, SOF0, SOI};
use crate::jpeg::quant::{QuantizationTableSet, table_len};
use crate::jpeg::{MarkerCode, MarkerScanner};

use super::header::{
    MainHeader, QuantizationTableHeader, RestartHeader, dimension_units, wrap_fragment_offset,
};

/// Largest RFC 2435 payload (headers included) per packet.
pub const DEFAULT_MTU: usize = 1400;

/// Q value announcing that this frame's tables travel in-band.
pub const DYNAMIC_TABLE_Q: u8 = 255;

/// Lowest Q value whose tables are sent in the quantization table header.
pub const INLINE_TABLE_Q: u8 = 128;

/// Type bit signalling a restart marker header.
const RESTART_TYPE_FLAG: u8 = 0x40;

/// Packetizer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketizerConfig {
    /// Q value put on the wire. `None` sends the image's own tables with
    /// Q = 255.
    pub quality: Option<u8>,
    /// Overrides the image's DRI interval. `Some(0)` disables restart
    /// headers.
    pub restart_interval: Option<u16>,
    /// Maximum payload size, RFC 2435 headers included.
    pub mtu: usize,
}

impl Default for PacketizerConfig {
    fn default() -> Self {
        Self {
            quality: None,
            restart_interval: None,
            mtu: DEFAULT_MTU,
        }
    }
}

impl PacketizerConfig {
    /// The Q byte this configuration puts in every main header.
    pub fn q(&self) -> u8 {
        self.quality.unwrap_or(DYNAMIC_TABLE_Q)
    }
}

/// Parameters extracted from the header region of a baseline JPEG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegFrame<'a> {
    pub type_specific: u8,
    /// RFC 2435 type: bit 0 from luma sampling, 0x40 when DRI is non-zero.
    pub type_: u8,
    pub width: u16,
    pub height: u16,
    /// Interval from the DRI segment, 0 when absent.
    pub restart_interval: u16,
    /// Every DQT table met, in order, at most three.
    pub tables: QuantizationTableSet,
    /// Entropy-coded data after SOS, trailing EOI excluded.
    pub scan: &'a [u8],
}

impl<'a> JpegFrame<'a> {
    /// Walk the markers of `jpeg` up to SOS.
    ///
    /// Only SOF0, DQT, DRI and SOS affect the result; APPn, COM and DHT
    /// segments are skipped since the receiver rebuilds a fixed header.
    pub fn parse(jpeg: &'a [u8]) -> Result<Self> {
        if !jpeg.starts_with(&[PREFIX, SOI]) {
            return Err(PacketError::MissingStartOfImage);
        }
        let end = if jpeg.len() >= 4 && jpeg.ends_with(&[PREFIX, EOI]) {
            jpeg.len() - 2
        } else {
            jpeg.len()
        };

        let mut frame = JpegFrame {
            type_specific: 0,
            type_: 0,
            width: 0,
            height: 0,
            restart_interval: 0,
            tables: QuantizationTableSet::default(),
            scan: &[],
        };
        let mut seen_frame = false;

        let mut scanner = MarkerScanner::new(&jpeg[..end]);
        while let Some(marker) = scanner.next() {
            match marker.kind() {
                Some(MarkerCode::Dqt) => {
                    frame.read_tables(&marker.data, marker.declared_length as usize)?;
                }
                Some(MarkerCode::Sof(0)) => {
                    frame.read_frame(&marker.data, marker.declared_length as usize)?;
                    seen_frame = true;
                }
                Some(MarkerCode::Dri) => {
                    let &[hi, lo, ..] = marker.data.as_slice() else {
                        return Err(PacketError::MalformedMarker {
                            code: DRI,
                            declared: marker.declared_length as usize,
                            available: marker.data.len(),
                        });
                    };
                    frame.restart_interval = u16::from_be_bytes([hi, lo]);
                    if frame.restart_interval > 0 {
                        frame.type_ |= RESTART_TYPE_FLAG;
                    }
                }
                Some(MarkerCode::Sos) => {
                    if !seen_frame {
                        return Err(PacketError::MissingStartOfFrame);
                    }
                    let components = marker.data.first().copied().unwrap_or(0) as usize;
                    let expected = 2 + 1 + 2 * components + 3;
                    let declared = marker.declared_length as usize;
                    if declared != expected {
                        return Err(PacketError::InvalidStartOfScan { declared, expected });
                    }
                    frame.scan = &jpeg[scanner.position()..end];
                    return Ok(frame);
                }
                Some(kind) => {
                    tracing::trace!(?kind, len = marker.data.len(), "marker skipped");
                }
                None => {}
            }
        }

        if seen_frame {
            Err(PacketError::MissingStartOfScan)
        } else {
            Err(PacketError::MissingStartOfFrame)
        }
    }

    /// Split a DQT payload into its tables.
    fn read_tables(&mut self, data: &[u8], declared: usize) -> Result<()> {
        let mut i = 0;
        while i < data.len() {
            let sixteen_bit = data[i] >> 4 != 0;
            let len = table_len(sixteen_bit);
            let table = data
                .get(i + 1..i + 1 + len)
                .ok_or(PacketError::MalformedMarker {
                    code: DQT,
                    declared,
                    available: data.len(),
                })?;
            if !self.tables.push(sixteen_bit, table) {
                tracing::warn!(
                    table_id = data[i] & 0x0F,
                    "more than three quantization tables, extra table dropped"
                );
            }
            i += 1 + len;
        }
        Ok(())
    }

    /// Dimensions and sampling from SOF0.
    fn read_frame(&mut self, data: &[u8], declared: usize) -> Result<()> {
        let malformed = PacketError::MalformedMarker {
            code: SOF0,
            declared,
            available: data.len(),
        };
        if data.len() < 6 {
            return Err(malformed);
        }
        self.height = u16::from_be_bytes([data[1], data[2]]);
        self.width = u16::from_be_bytes([data[3], data[4]]);
        let components = data[5] as usize;
        let specs = data.get(6..6 + components * 3).ok_or(malformed)?;

        if components > 1 {
            if specs[1] != LUMA_SAMPLING_2X1 {
                self.type_ |= 1;
            }
            for spec in specs.chunks_exact(3).skip(1) {
                if spec[1] != CHROMA_SAMPLING {
                    self.type_specific = spec[1];
                }
            }
        }
        Ok(())
    }
}

/// One RFC 2435 payload, ready to follow an RTP header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegPayload {
    pub data: Vec<u8>,
    /// Set on the payload that ends the frame.
    pub marker: bool,
}

/// Split `jpeg` into RFC 2435 payloads.
///
/// The image must be a baseline JPEG starting with SOI. Each payload holds
/// the main header, the restart header when a restart interval is in
/// effect, and (first payload only, Q >= 128) the quantization table
/// header with the image's tables, then as much scan data as `config.mtu`
/// allows.
pub fn packetize_jpeg(jpeg: &[u8], config: &PacketizerConfig) -> Result<Vec<JpegPayload>> {
    let q = config.q();
    if q == 0 {
        return Err(PacketError::ReservedQuality);
    }

    let frame = JpegFrame::parse(jpeg)?;
    let inline_tables = q >= INLINE_TABLE_Q;
    if inline_tables && q == DYNAMIC_TABLE_Q && frame.tables.is_empty() {
        return Err(PacketError::IllegalDynamicTable);
    }

    let restart_interval = config.restart_interval.unwrap_or(frame.restart_interval);
    let type_ = if restart_interval > 0 {
        frame.type_ | RESTART_TYPE_FLAG
    } else {
        frame.type_ & !RESTART_TYPE_FLAG
    };

    let mut header = MainHeader {
        type_specific: frame.type_specific,
        fragment_offset: 0,
        type_,
        q,
        width: dimension_units(frame.width),
        height: dimension_units(frame.height),
    };

    let per_packet = MainHeader::LEN + if restart_interval > 0 { RestartHeader::LEN } else { 0 };
    let table_bytes = if inline_tables {
        QuantizationTableHeader::LEN + frame.tables.tables.len()
    } else {
        0
    };
    if config.mtu <= per_packet + table_bytes {
        return Err(PacketError::MtuTooSmall {
            mtu: config.mtu,
            overhead: per_packet + table_bytes,
        });
    }

    let scan = frame.scan;
    let mut payloads = Vec::with_capacity(scan.len() / (config.mtu - per_packet) + 1);
    let mut offset = 0usize;
    loop {
        header.fragment_offset = wrap_fragment_offset(offset);

        let mut data = Vec::with_capacity(config.mtu);
        data.extend_from_slice(&header.to_bytes());
        if restart_interval > 0 {
            data.extend_from_slice(&RestartHeader::unaligned(restart_interval).to_bytes());
        }
        if offset == 0 && inline_tables {
            let table_header = QuantizationTableHeader {
                mbz: 0,
                precision: frame.tables.precision,
                length: frame.tables.tables.len() as u16,
            };
            data.extend_from_slice(&table_header.to_bytes());
            data.extend_from_slice(&frame.tables.tables);
        }

        let chunk = (config.mtu - data.len()).min(scan.len() - offset);
        data.extend_from_slice(&scan[offset..offset + chunk]);
        offset += chunk;
        let marker = offset >= scan.len();

        tracing::trace!(
            fragment_offset = header.fragment_offset,
            len = data.len(),
            marker,
            "RFC 2435 payload"
        );
        payloads.push(JpegPayload { data, marker });
        if marker {
            break;
        }
    }

    tracing::debug!(
        type_,
        q,
        width = frame.width,
        height = frame.height,
        restart_interval,
        tables = frame.tables.table_count(),
        scan_len = scan.len(),
        packets = payloads.len(),
        "JPEG frame packetized"
    );

    Ok(payloads)
}
