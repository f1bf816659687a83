//! Synthesis of a baseline JPEG header from RFC 2435 parameters.
//!
//! An RTP/JPEG receiver only gets the entropy-coded scan plus a handful of
//! numbers (type, Q, dimensions, tables, restart interval). Prepending the
//! header built here turns the reassembled scan back into an interchange
//! JPEG:
//!
//! ```text
//! SOI
//! DQT × n          (one segment per table, n ≤ 3; omitted when empty)
//! DRI              (only if restart_interval > 0)
//! SOF0             (1 or 3 components)
//! DHT × 2 or 4     (Annex K standard tables)
//! SOS
//! ```
//!
//! EOI is not written here; it is part of the scan data or is appended by
//! the depacketizer.

use super::marker::{DHT, DQT, DRI, Marker, SOF0, SOI, SOS};
use super::quant::QuantizationTableSet;

// Annex K.3 standard Huffman tables: code counts per length 1..=16, then symbols.

const LUMA_DC_CODELENS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];

const LUMA_DC_SYMBOLS: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

const LUMA_AC_CODELENS: [u8; 16] = [0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 0x7d];

const LUMA_AC_SYMBOLS: [u8; 162] = [
    0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12, 0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61, 0x07,
    0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xa1, 0x08, 0x23, 0x42, 0xb1, 0xc1, 0x15, 0x52, 0xd1, 0xf0,
    0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0a, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x25, 0x26, 0x27, 0x28,
    0x29, 0x2a, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49,
    0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69,
    0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89,
    0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7,
    0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6, 0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5,
    0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2, 0xd3, 0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe1, 0xe2,
    0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8, 0xe9, 0xea, 0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8,
    0xf9, 0xfa,
];

const CHROMA_DC_CODELENS: [u8; 16] = [0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0];

const CHROMA_DC_SYMBOLS: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

const CHROMA_AC_CODELENS: [u8; 16] = [0, 2, 1, 2, 4, 4, 3, 4, 7, 5, 4, 4, 0, 1, 2, 0x77];

const CHROMA_AC_SYMBOLS: [u8; 162] = [
    0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21, 0x31, 0x06, 0x12, 0x41, 0x51, 0x07, 0x61, 0x71,
    0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91, 0xa1, 0xb1, 0xc1, 0x09, 0x23, 0x33, 0x52, 0xf0,
    0x15, 0x62, 0x72, 0xd1, 0x0a, 0x16, 0x24, 0x34, 0xe1, 0x25, 0xf1, 0x17, 0x18, 0x19, 0x1a, 0x26,
    0x27, 0x28, 0x29, 0x2a, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48,
    0x49, 0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68,
    0x69, 0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87,
    0x88, 0x89, 0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5,
    0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6, 0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3,
    0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2, 0xd3, 0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda,
    0xe2, 0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8, 0xe9, 0xea, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8,
    0xf9, 0xfa,
];

/// Luma sampling for even types: 2×1 (4:2:2).
pub const LUMA_SAMPLING_2X1: u8 = 0x21;
/// Luma sampling for odd types: 2×2 (4:2:0).
pub const LUMA_SAMPLING_2X2: u8 = 0x22;
/// Chroma sampling assumed by RFC 2435.
pub const CHROMA_SAMPLING: u8 = 0x11;

/// Parameters taken from the RFC 2435 headers of the first packet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderParams {
    /// Non-zero values that form a valid sampling byte override the chroma
    /// sampling factors; anything else is ignored.
    pub type_specific: u8,
    pub type_: u8,
    pub width_units: u8,
    pub height_units: u8,
    pub restart_interval: u16,
}

impl HeaderParams {
    fn luma_sampling(&self) -> u8 {
        if self.type_ & 1 == 0 {
            LUMA_SAMPLING_2X1
        } else {
            LUMA_SAMPLING_2X2
        }
    }

    fn chroma_sampling(&self) -> u8 {
        let h = self.type_specific >> 4;
        let v = self.type_specific & 0x0f;
        if (1..=4).contains(&h) && (1..=4).contains(&v) {
            self.type_specific
        } else {
            CHROMA_SAMPLING
        }
    }
}

/// Build the header for `params` and `tables`.
///
/// A single table, 8- or 16-bit, yields a one-component (greyscale) frame
/// with two DHT segments; otherwise the frame has Y, Cb and Cr with four DHT
/// segments.
/// Cr uses table 2 when three tables are present, table 1 otherwise.
pub fn build_header(params: &HeaderParams, tables: &QuantizationTableSet) -> Vec<u8> {
    let mut out = Vec::with_capacity(1024);

    Marker::bare(SOI).write_to(&mut out);

    let mut table_count = 0;
    for (id, sixteen_bit, table) in tables.iter() {
        let mut data = Vec::with_capacity(1 + table.len());
        data.push(((sixteen_bit as u8) << 4) | id as u8);
        data.extend_from_slice(table);
        Marker::new(DQT, data).write_to(&mut out);
        table_count += 1;
    }

    if params.restart_interval > 0 {
        Marker::new(DRI, params.restart_interval.to_be_bytes().to_vec()).write_to(&mut out);
    }

    let monochrome = table_count == 1;
    let components: Vec<[u8; 3]> = if monochrome {
        vec![[1, CHROMA_SAMPLING, 0]]
    } else {
        let cr_table = if table_count >= 3 { 2 } else { 1 };
        let chroma = params.chroma_sampling();
        vec![
            [1, params.luma_sampling(), 0],
            [2, chroma, 1],
            [3, chroma, cr_table],
        ]
    };

    let height = params.height_units as u16 * 8;
    let width = params.width_units as u16 * 8;
    let mut sof = Vec::with_capacity(6 + components.len() * 3);
    sof.push(8);
    sof.extend_from_slice(&height.to_be_bytes());
    sof.extend_from_slice(&width.to_be_bytes());
    sof.push(components.len() as u8);
    for component in &components {
        sof.extend_from_slice(component);
    }
    Marker::new(SOF0, sof).write_to(&mut out);

    let luma_tables: [(&[u8], &[u8], u8); 2] = [
        (&LUMA_DC_CODELENS, &LUMA_DC_SYMBOLS, 0x00),
        (&LUMA_AC_CODELENS, &LUMA_AC_SYMBOLS, 0x10),
    ];
    let chroma_tables: [(&[u8], &[u8], u8); 2] = [
        (&CHROMA_DC_CODELENS, &CHROMA_DC_SYMBOLS, 0x01),
        (&CHROMA_AC_CODELENS, &CHROMA_AC_SYMBOLS, 0x11),
    ];
    let huffman = luma_tables
        .iter()
        .chain(chroma_tables.iter().filter(|_| !monochrome));
    for (codelens, symbols, class_id) in huffman {
        let mut data = Vec::with_capacity(1 + codelens.len() + symbols.len());
        data.push(*class_id);
        data.extend_from_slice(codelens);
        data.extend_from_slice(symbols);
        Marker::new(DHT, data).write_to(&mut out);
    }

    let mut sos = Vec::with_capacity(4 + components.len() * 2);
    sos.push(components.len() as u8);
    for (i, component) in components.iter().enumerate() {
        sos.push(component[0]);
        sos.push(if i == 0 { 0x00 } else { 0x11 });
    }
    // Spectral selection 0..63, no successive approximation.
    sos.extend_from_slice(&[0, 63, 0]);
    Marker::new(SOS, sos).write_to(&mut out);

    tracing::trace!(
        type_ = params.type_,
        width,
        height,
        tables = table_count,
        restart_interval = params.restart_interval,
        header_len = out.len(),
        "JPEG header synthesized"
    );

    out
}
