use std::collections::HashMap;

use crate::error::{PacketError, Result};
use crate::jpeg::header::{HeaderParams, build_header};
use crate::jpeg::marker::{EOI, PREFIX};
use crate::jpeg::quant::{
    BaseTables, DEFAULT_QUALITY_CLAMP, MAX_TABLES, QuantizationTableSet, synthesize,
};
use crate::media::assembly::ReassemblyBuffer;
use crate::media::rtp::RtpPacket;

use super::header::{MainHeader, QuantizationTableHeader, RestartHeader};
use super::packetizer::{DYNAMIC_TABLE_Q, INLINE_TABLE_Q};

/// Inline-table threshold used by senders that predate RFC 2435's final Q
/// ranges.
pub const LEGACY_INLINE_TABLE_Q: u8 = 100;

/// Depacketizer settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DepacketizerConfig {
    /// Treat Q >= 100 as inline tables and accept Types 2..=5.
    pub legacy_q_mode: bool,
    /// Synthesize Q-derived tables from [`BaseTables::LegacyDefault`].
    pub use_alt_quantizer: bool,
}

impl DepacketizerConfig {
    /// Lowest Q whose tables are read from the packet.
    pub fn inline_threshold(&self) -> u8 {
        if self.legacy_q_mode {
            LEGACY_INLINE_TABLE_Q
        } else {
            INLINE_TABLE_Q
        }
    }

    fn base_tables(&self) -> BaseTables {
        if self.use_alt_quantizer {
            BaseTables::LegacyDefault
        } else {
            BaseTables::Rfc2435Default
        }
    }
}

/// Per-packet RFC 2435 receiver.
///
/// Each call to [`process_packet`](Self::process_packet) inserts the
/// packet's scan bytes into a caller-owned [`ReassemblyBuffer`] under a key
/// derived from the RTP sequence number. The packet with fragment offset 0
/// additionally gets the synthesized JPEG header one key below it; the
/// packet with the marker bit gets an EOI one key above it when its data
/// does not already end with one.
///
/// Keys are relative to the first sequence number seen since the last
/// [`reset`](Self::reset), interpreted as a signed 16-bit distance so that
/// late packets and sequence wrap both order correctly.
#[derive(Debug, Default)]
pub struct Rfc2435Depacketizer {
    config: DepacketizerConfig,
    /// Tables received for Q in 128..=254, reused when a later frame sends
    /// a zero-length table header.
    table_cache: HashMap<u8, QuantizationTableSet>,
    base_sequence: Option<u16>,
    header_written: bool,
}

impl Rfc2435Depacketizer {
    pub fn new(config: DepacketizerConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &DepacketizerConfig {
        &self.config
    }

    /// Forget the current frame. The table cache survives.
    pub fn reset(&mut self) {
        self.base_sequence = None;
        self.header_written = false;
    }

    /// Whether the current frame's header has been inserted.
    pub fn header_written(&self) -> bool {
        self.header_written
    }

    fn key(&mut self, sequence: u16) -> i64 {
        let base = *self.base_sequence.get_or_insert(sequence);
        sequence.wrapping_sub(base) as i16 as i64
    }

    /// Consume one packet of the current frame.
    ///
    /// On error nothing has been inserted for this packet; the caller
    /// decides whether to abandon the frame.
    pub fn process_packet<B: ReassemblyBuffer>(
        &mut self,
        packet: &RtpPacket<'_>,
        buffer: &mut B,
    ) -> Result<()> {
        let payload = packet.payload;
        let main = MainHeader::parse(payload)?;

        if (2..=5).contains(&main.type_) && !self.config.legacy_q_mode {
            return Err(PacketError::ReservedLegacyType(main.type_));
        }
        if main.q == 0 {
            return Err(PacketError::ReservedQuality);
        }

        let mut offset = MainHeader::LEN;
        let mut restart_interval = 0;
        if main.has_restart_header() {
            if payload.len() < offset + RestartHeader::LEN {
                return Err(PacketError::TruncatedPacket { len: payload.len() });
            }
            restart_interval = RestartHeader::parse(&payload[offset..])?.restart_interval;
            offset += RestartHeader::LEN;
        }

        let first_fragment = main.fragment_offset == 0;
        let mut inline_tables = None;
        if first_fragment && main.q >= self.config.inline_threshold() {
            if payload.len() < offset + QuantizationTableHeader::LEN {
                return Err(PacketError::TruncatedPacket { len: payload.len() });
            }
            let table_header = QuantizationTableHeader::parse(&payload[offset..])?;
            offset += QuantizationTableHeader::LEN;

            let length = table_header.length as usize;
            let remaining = payload.len() - offset;
            if length == 0 && main.q == DYNAMIC_TABLE_Q {
                return Err(PacketError::IllegalDynamicTable);
            }
            if length > remaining {
                tracing::warn!(length, remaining, "quantization table length exceeds packet");
                offset = payload.len();
            } else if length > 0 {
                let tables = QuantizationTableSet::new(
                    table_header.precision,
                    payload[offset..offset + length].to_vec(),
                );
                let whole: usize = tables.iter().map(|(_, _, table)| table.len()).sum();
                let count = tables.table_count();
                if count == 0 || (count < MAX_TABLES && whole != length) {
                    tracing::warn!(length, whole, "quantization table length splits a table");
                } else {
                    inline_tables = Some(tables);
                }
                offset += length;
            }
        }

        let key = self.key(packet.sequence);

        if first_fragment && !self.header_written {
            let tables = self.resolve_tables(main.q, inline_tables)?;
            let params = HeaderParams {
                type_specific: main.type_specific,
                type_: main.type_,
                width_units: main.width,
                height_units: main.height,
                restart_interval,
            };
            let header = build_header(&params, &tables);
            tracing::debug!(
                type_ = main.type_,
                q = main.q,
                width = main.width_pixels(),
                height = main.height_pixels(),
                restart_interval,
                header_len = header.len(),
                key = key - 1,
                "JPEG header inserted"
            );
            buffer.insert(key - 1, header);
            buffer.mark_head(key - 1);
            self.header_written = true;
        }

        let data = &payload[offset..];
        tracing::trace!(
            sequence = packet.sequence,
            fragment_offset = main.fragment_offset,
            key,
            len = data.len(),
            marker = packet.marker,
            "RFC 2435 fragment"
        );
        buffer.insert(key, data.to_vec());

        if packet.marker {
            if data.ends_with(&[PREFIX, EOI]) {
                buffer.mark_tail(key);
            } else {
                buffer.insert(key + 1, vec![PREFIX, EOI]);
                buffer.mark_tail(key + 1);
            }
        }
        Ok(())
    }

    /// Tables for the frame header: the inline ones (cached when Q allows),
    /// else a cached set for this Q, else tables synthesized from Q.
    fn resolve_tables(
        &mut self,
        q: u8,
        inline_tables: Option<QuantizationTableSet>,
    ) -> Result<QuantizationTableSet> {
        let threshold = self.config.inline_threshold();
        if let Some(tables) = inline_tables {
            if q >= INLINE_TABLE_Q && q < DYNAMIC_TABLE_Q {
                self.table_cache.insert(q, tables.clone());
            }
            tracing::debug!(q, tables = tables.table_count(), "inline quantization tables");
            return Ok(tables);
        }
        if q >= threshold {
            if let Some(tables) = self.table_cache.get(&q) {
                tracing::debug!(q, "cached quantization tables");
                return Ok(tables.clone());
            }
            tracing::warn!(q, "no inline or cached tables, synthesizing from Q");
        }
        synthesize(q, 0, self.config.base_tables(), Some(DEFAULT_QUALITY_CLAMP))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg::marker::{DQT, DRI, SOS};
    use crate::jpeg::scanner::scan;
    use crate::media::assembly::FrameBuffer;

    fn main_header(fragment_offset: u32, type_: u8, q: u8) -> Vec<u8> {
        MainHeader {
            type_specific: 0,
            fragment_offset,
            type_,
            q,
            width: 2,
            height: 2,
        }
        .to_bytes()
        .to_vec()
    }

    fn packet(payload: &[u8], sequence: u16, marker: bool) -> RtpPacket<'_> {
        RtpPacket {
            marker,
            payload_type: 26,
            sequence,
            timestamp: 0,
            ssrc: 1,
            csrc: Vec::new(),
            payload,
        }
    }

    fn table_payload(q: u8, tables: &[u8], scan: &[u8]) -> Vec<u8> {
        let mut payload = main_header(0, 1, q);
        let table_header = QuantizationTableHeader {
            mbz: 0,
            precision: 0,
            length: tables.len() as u16,
        };
        payload.extend_from_slice(&table_header.to_bytes());
        payload.extend_from_slice(tables);
        payload.extend_from_slice(scan);
        payload
    }

    #[test]
    fn single_packet_frame() {
        let mut payload = main_header(0, 1, 50);
        payload.extend_from_slice(&[0x12, 0x34]);
        let mut depacketizer = Rfc2435Depacketizer::default();
        let mut buffer = FrameBuffer::new();
        depacketizer
            .process_packet(&packet(&payload, 7, true), &mut buffer)
            .unwrap();

        assert!(buffer.is_complete());
        assert_eq!(buffer.head(), Some(-1));
        assert_eq!(buffer.tail(), Some(1));
        let jpeg = buffer.assemble();
        assert!(jpeg.starts_with(&[0xFF, 0xD8]));
        assert!(jpeg.ends_with(&[0x12, 0x34, 0xFF, 0xD9]));
    }

    #[test]
    fn existing_eoi_not_duplicated() {
        let mut payload = main_header(0, 0, 50);
        payload.extend_from_slice(&[0x12, 0xFF, 0xD9]);
        let mut depacketizer = Rfc2435Depacketizer::default();
        let mut buffer = FrameBuffer::new();
        depacketizer
            .process_packet(&packet(&payload, 0, true), &mut buffer)
            .unwrap();
        assert_eq!(buffer.tail(), Some(0));
        assert!(buffer.assemble().ends_with(&[0x12, 0xFF, 0xD9]));
    }

    #[test]
    fn out_of_order_fragments() {
        let mut first = main_header(0, 1, 60);
        first.extend_from_slice(&[1, 2]);
        let mut second = main_header(2, 1, 60);
        second.extend_from_slice(&[3, 4]);

        let mut depacketizer = Rfc2435Depacketizer::default();
        let mut buffer = FrameBuffer::new();
        depacketizer
            .process_packet(&packet(&second, 101, true), &mut buffer)
            .unwrap();
        assert!(!buffer.is_complete());
        depacketizer
            .process_packet(&packet(&first, 100, false), &mut buffer)
            .unwrap();
        assert!(buffer.is_complete());
        assert!(buffer.assemble().ends_with(&[1, 2, 3, 4, 0xFF, 0xD9]));
    }

    #[test]
    fn keys_survive_sequence_wrap() {
        let mut first = main_header(0, 1, 60);
        first.push(1);
        let mut second = main_header(1, 1, 60);
        second.push(2);
        let mut depacketizer = Rfc2435Depacketizer::default();
        let mut buffer = FrameBuffer::new();
        depacketizer
            .process_packet(&packet(&first, u16::MAX, false), &mut buffer)
            .unwrap();
        depacketizer
            .process_packet(&packet(&second, 0, true), &mut buffer)
            .unwrap();
        assert!(buffer.is_complete());
        assert!(buffer.assemble().ends_with(&[1, 2, 0xFF, 0xD9]));
    }

    #[test]
    fn inline_tables_reach_the_header() {
        let tables = [9u8; 128];
        let payload = table_payload(255, &tables, &[0xAB]);
        let mut depacketizer = Rfc2435Depacketizer::default();
        let mut buffer = FrameBuffer::new();
        depacketizer
            .process_packet(&packet(&payload, 0, true), &mut buffer)
            .unwrap();
        let header = buffer.get(-1).unwrap().to_vec();
        let dqt: Vec<_> = scan(&header[..]).filter(|m| m.code == DQT).collect();
        assert_eq!(dqt.len(), 2);
        assert!(dqt.iter().all(|m| m.data[1..].iter().all(|&c| c == 9)));
        assert_eq!(buffer.get(0), Some(&[0xAB][..]));
    }

    #[test]
    fn restart_header_becomes_dri() {
        let mut payload = main_header(0, 65, 50);
        payload.extend_from_slice(&RestartHeader::unaligned(12).to_bytes());
        payload.push(0x77);
        let mut depacketizer = Rfc2435Depacketizer::default();
        let mut buffer = FrameBuffer::new();
        depacketizer
            .process_packet(&packet(&payload, 0, true), &mut buffer)
            .unwrap();
        let header = buffer.get(-1).unwrap().to_vec();
        let dri = scan(&header[..]).find(|m| m.code == DRI).unwrap();
        assert_eq!(dri.data, vec![0, 12]);
        assert!(scan(&header[..]).any(|m| m.code == SOS));
        assert_eq!(buffer.get(0), Some(&[0x77][..]));
    }

    #[test]
    fn zero_length_table_uses_cache() {
        let mut depacketizer = Rfc2435Depacketizer::default();

        let mut buffer = FrameBuffer::new();
        let payload = table_payload(200, &[5u8; 128], &[1]);
        depacketizer
            .process_packet(&packet(&payload, 0, true), &mut buffer)
            .unwrap();
        let with_tables = buffer.get(-1).unwrap().to_vec();

        depacketizer.reset();
        let mut buffer = FrameBuffer::new();
        let payload = table_payload(200, &[], &[1]);
        depacketizer
            .process_packet(&packet(&payload, 10, true), &mut buffer)
            .unwrap();
        assert_eq!(buffer.get(-1).unwrap(), &with_tables[..]);
        assert_eq!(buffer.get(0), Some(&[1][..]));
    }

    #[test]
    fn zero_length_table_without_cache_synthesizes() {
        let mut depacketizer = Rfc2435Depacketizer::default();
        let mut buffer = FrameBuffer::new();
        let payload = table_payload(130, &[], &[1]);
        depacketizer
            .process_packet(&packet(&payload, 0, true), &mut buffer)
            .unwrap();
        let header = buffer.get(-1).unwrap().to_vec();
        let dqt: Vec<_> = scan(&header[..]).filter(|m| m.code == DQT).collect();
        assert_eq!(dqt.len(), 2);
        assert!(dqt[0].data[1..].iter().all(|&c| c == 1));
    }

    #[test]
    fn partial_table_falls_back_to_synthesized() {
        for length in [10usize, 100] {
            let payload = table_payload(200, &vec![3u8; length], &[0xAB]);
            let mut depacketizer = Rfc2435Depacketizer::default();
            let mut buffer = FrameBuffer::new();
            depacketizer
                .process_packet(&packet(&payload, 0, true), &mut buffer)
                .unwrap();
            let header = buffer.get(-1).unwrap().to_vec();
            let dqt: Vec<_> = scan(&header[..]).filter(|m| m.code == DQT).collect();
            assert_eq!(dqt.len(), 2, "length {length}");
            assert!(dqt[0].data[1..].iter().any(|&c| c != 3), "length {length}");
            assert_eq!(buffer.get(0), Some(&[0xAB][..]));
        }
    }

    #[test]
    fn oversized_table_length_falls_back() {
        let mut payload = main_header(0, 1, 255);
        let table_header = QuantizationTableHeader {
            mbz: 0,
            precision: 0,
            length: 128,
        };
        payload.extend_from_slice(&table_header.to_bytes());
        payload.extend_from_slice(&[3u8; 20]);
        let mut depacketizer = Rfc2435Depacketizer::default();
        let mut buffer = FrameBuffer::new();
        depacketizer
            .process_packet(&packet(&payload, 0, true), &mut buffer)
            .unwrap();
        assert!(buffer.contains(-1));
        assert_eq!(buffer.get(0), Some(&[][..]));
    }

    #[test]
    fn q255_zero_length_is_illegal() {
        let payload = table_payload(255, &[], &[1]);
        let mut depacketizer = Rfc2435Depacketizer::default();
        let mut buffer = FrameBuffer::new();
        assert_eq!(
            depacketizer.process_packet(&packet(&payload, 0, true), &mut buffer),
            Err(PacketError::IllegalDynamicTable)
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn reserved_values_rejected() {
        let mut buffer = FrameBuffer::new();
        let mut depacketizer = Rfc2435Depacketizer::default();

        let payload = main_header(0, 3, 50);
        assert_eq!(
            depacketizer.process_packet(&packet(&payload, 0, false), &mut buffer),
            Err(PacketError::ReservedLegacyType(3))
        );

        let payload = main_header(0, 1, 0);
        assert_eq!(
            depacketizer.process_packet(&packet(&payload, 0, false), &mut buffer),
            Err(PacketError::ReservedQuality)
        );

        assert_eq!(
            depacketizer.process_packet(&packet(&[0; 5], 0, false), &mut buffer),
            Err(PacketError::TruncatedPacket { len: 5 })
        );

        let payload = main_header(0, 64, 50);
        assert_eq!(
            depacketizer.process_packet(&packet(&payload, 0, false), &mut buffer),
            Err(PacketError::TruncatedPacket { len: 8 })
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn legacy_mode_accepts_old_types_and_lower_threshold() {
        let config = DepacketizerConfig {
            legacy_q_mode: true,
            use_alt_quantizer: false,
        };
        let mut depacketizer = Rfc2435Depacketizer::new(config);
        let mut buffer = FrameBuffer::new();
        let mut payload = main_header(0, 3, 100);
        let table_header = QuantizationTableHeader {
            mbz: 0,
            precision: 0,
            length: 64,
        };
        payload.extend_from_slice(&table_header.to_bytes());
        payload.extend_from_slice(&[4u8; 64]);
        payload.push(0x99);
        depacketizer
            .process_packet(&packet(&payload, 0, true), &mut buffer)
            .unwrap();
        let header = buffer.get(-1).unwrap().to_vec();
        let dqt: Vec<_> = scan(&header[..]).filter(|m| m.code == DQT).collect();
        assert_eq!(dqt.len(), 1);
        assert_eq!(buffer.get(0), Some(&[0x99][..]));
    }

    #[test]
    fn alt_quantizer_changes_synthesized_tables() {
        let mut payload = main_header(0, 1, 50);
        payload.push(1);
        let headers: Vec<Vec<u8>> = [false, true]
            .into_iter()
            .map(|alt| {
                let config = DepacketizerConfig {
                    legacy_q_mode: false,
                    use_alt_quantizer: alt,
                };
                let mut buffer = FrameBuffer::new();
                Rfc2435Depacketizer::new(config)
                    .process_packet(&packet(&payload, 0, true), &mut buffer)
                    .unwrap();
                buffer.get(-1).unwrap().to_vec()
            })
            .collect();
        assert_eq!(headers[0].len(), headers[1].len());
        assert_ne!(headers[0], headers[1]);
    }

    #[test]
    fn header_written_once_per_frame() {
        let mut payload = main_header(0, 1, 50);
        payload.push(1);
        let mut depacketizer = Rfc2435Depacketizer::default();
        let mut buffer = FrameBuffer::new();
        depacketizer
            .process_packet(&packet(&payload, 4, false), &mut buffer)
            .unwrap();
        assert!(depacketizer.header_written());
        depacketizer
            .process_packet(&packet(&payload, 4, false), &mut buffer)
            .unwrap();
        assert_eq!(buffer.len(), 2);
        depacketizer.reset();
        assert!(!depacketizer.header_written());
    }
}
