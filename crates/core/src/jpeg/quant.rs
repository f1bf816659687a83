//! Quantization tables: synthesis from a quality factor and the reverse
//! estimate (RFC 2435 Appendix A).
//!
//! A table is 64 coefficients in zig-zag order, each 1 byte (8-bit
//! precision) or 2 bytes big-endian (16-bit precision). A table set carries
//! a precision bitmap with one bit per table, bit 0 being the first table.
//!
//! ## Scale factor
//!
//! ```text
//! quality 1..=50   → scale = 5000 / quality
//! quality 51..=100 → scale = 200 - 2 * quality
//! coefficient      = clamp((base * scale + 50) / 100, 1, 255)
//! ```
//!
//! The estimators run the formula backwards. They are approximations good
//! to a few quality points and are meant for diagnostics, never for
//! deciding what goes on the wire.

use crate::error::{PacketError, Result};

/// Coefficients per table.
pub const TABLE_COEFFICIENTS: usize = 64;

/// RFC 2435 never carries more than three tables.
pub const MAX_TABLES: usize = 3;

/// Upper bound applied to the quality factor unless the caller opts out.
pub const DEFAULT_QUALITY_CLAMP: u8 = 100;

/// Natural-order index of each zig-zag position (ITU T.81 Figure A.6).
pub const ZIG_ZAG: [u8; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27, 20,
    13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58, 59,
    52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

// Table K.1, natural order.
const LUMA_QUANT: [u8; 64] = [
    16, 11, 10, 16, 24, 40, 51, 61, 12, 12, 14, 19, 26, 58, 60, 55, 14, 13, 16, 24, 40, 57, 69, 56,
    14, 17, 22, 29, 51, 87, 80, 62, 18, 22, 37, 56, 68, 109, 103, 77, 24, 35, 55, 64, 81, 104, 113,
    92, 49, 64, 78, 87, 103, 121, 120, 101, 72, 92, 95, 98, 112, 100, 103, 99,
];

// Table K.2, natural order.
const CHROMA_QUANT: [u8; 64] = [
    17, 18, 24, 47, 99, 99, 99, 99, 18, 21, 26, 66, 99, 99, 99, 99, 24, 26, 56, 99, 99, 99, 99, 99,
    47, 66, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99,
];

// N. Robidoux's flat-DC table, natural order, shared by luma and chroma.
const PSYCHOVISUAL_QUANT: [u16; 64] = [
    16, 16, 16, 18, 25, 37, 56, 85, 16, 17, 20, 27, 34, 40, 53, 75, 16, 20, 24, 31, 43, 62, 91,
    135, 18, 27, 31, 40, 53, 74, 106, 156, 25, 34, 43, 53, 69, 94, 131, 189, 37, 40, 62, 74, 94,
    124, 169, 238, 56, 53, 91, 106, 131, 169, 226, 311, 85, 75, 135, 156, 189, 238, 311, 418,
];

/// Luma DC coefficient of the default base, the anchor of
/// [`estimate_quality`].
const DEFAULT_LUMA_DC: u32 = LUMA_QUANT[0] as u32;

/// The base tables a quality factor scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaseTables {
    /// Annex K tables emitted in zig-zag order, as RFC 2435 receivers expect.
    #[default]
    Rfc2435Default,
    /// Annex K tables emitted in the row order printed in RFC 2435
    /// Appendix A. Older senders copied them that way.
    LegacyDefault,
    /// Psychovisually tuned tables with a flatter high-frequency ramp.
    PsychoVisual,
}

impl BaseTables {
    /// Base coefficient at zig-zag position `i` of table `table` (0 = luma).
    fn coefficient(self, table: usize, i: usize) -> u32 {
        let natural = ZIG_ZAG[i] as usize;
        match (self, table) {
            (BaseTables::Rfc2435Default, 0) => LUMA_QUANT[natural] as u32,
            (BaseTables::Rfc2435Default, _) => CHROMA_QUANT[natural] as u32,
            (BaseTables::LegacyDefault, 0) => LUMA_QUANT[i] as u32,
            (BaseTables::LegacyDefault, _) => CHROMA_QUANT[i] as u32,
            (BaseTables::PsychoVisual, _) => PSYCHOVISUAL_QUANT[natural] as u32,
        }
    }
}

/// Bytes occupied by one table of the given precision.
pub fn table_len(sixteen_bit: bool) -> usize {
    if sixteen_bit {
        TABLE_COEFFICIENTS * 2
    } else {
        TABLE_COEFFICIENTS
    }
}

/// Quantization tables as carried by the RFC 2435 table header or a set of
/// DQT segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuantizationTableSet {
    /// Bit `i` set means table `i` has 16-bit coefficients.
    pub precision: u8,
    /// Tables back to back, luma first.
    pub tables: Vec<u8>,
}

impl QuantizationTableSet {
    pub fn new(precision: u8, tables: Vec<u8>) -> Self {
        Self { precision, tables }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Whether table `index` uses 16-bit coefficients.
    pub fn is_sixteen_bit(&self, index: usize) -> bool {
        index < 8 && self.precision & (1 << index) != 0
    }

    /// Append a table. Returns `false` (and leaves the set unchanged) once
    /// [`MAX_TABLES`] tables are present.
    pub fn push(&mut self, sixteen_bit: bool, table: &[u8]) -> bool {
        let index = self.table_count();
        if index >= MAX_TABLES {
            return false;
        }
        if sixteen_bit {
            self.precision |= 1 << index;
        }
        self.tables.extend_from_slice(table);
        true
    }

    /// Number of complete tables, walking the precision bitmap.
    pub fn table_count(&self) -> usize {
        self.iter().count()
    }

    /// Iterate `(table id, 16-bit?, coefficients)` over complete tables.
    pub fn iter(&self) -> impl Iterator<Item = (usize, bool, &[u8])> + '_ {
        let mut offset = 0;
        (0..MAX_TABLES).map_while(move |id| {
            let sixteen_bit = self.is_sixteen_bit(id);
            let len = table_len(sixteen_bit);
            let table = self.tables.get(offset..offset + len)?;
            offset += len;
            Some((id, sixteen_bit, table))
        })
    }
}

/// RFC 2435 Appendix A scale factor for an (already clamped) quality.
fn scale_factor(quality: u8) -> i32 {
    let quality = quality as i32;
    if quality <= 50 {
        5000 / quality
    } else {
        200 - quality * 2
    }
}

/// Build the luma and chroma tables for `quality`.
///
/// Every RFC 2435 type (0/1, their restart variants and the dynamic range)
/// describes luma plus chroma, so the result always holds two tables: 128
/// bytes at 8-bit precision, 256 bytes when both precision bits are set.
/// `clamp_to` bounds the quality factor before scaling; `None` lets
/// values above 100 through, which drives every coefficient to 1.
pub fn synthesize(
    quality: u8,
    precision: u8,
    base: BaseTables,
    clamp_to: Option<u8>,
) -> Result<QuantizationTableSet> {
    if quality == 0 {
        return Err(PacketError::ReservedQuality);
    }
    let factor = match clamp_to {
        Some(max) => quality.clamp(1, max.max(1)),
        None => quality,
    };
    let scale = scale_factor(factor);

    let mut set = QuantizationTableSet::default();
    for table in 0..2 {
        let sixteen_bit = precision & (1 << table) != 0;
        let mut coefficients = Vec::with_capacity(table_len(sixteen_bit));
        for i in 0..TABLE_COEFFICIENTS {
            let value = (base.coefficient(table, i) as i32 * scale + 50) / 100;
            let value = value.clamp(1, 255) as u16;
            if sixteen_bit {
                coefficients.extend_from_slice(&value.to_be_bytes());
            } else {
                coefficients.push(value as u8);
            }
        }
        set.push(sixteen_bit, &coefficients);
    }
    Ok(set)
}

/// Coefficient `index` of the table starting at byte `offset`.
fn coefficient_at(tables: &[u8], offset: usize, index: usize, sixteen_bit: bool) -> Option<u32> {
    if sixteen_bit {
        let at = offset + index * 2;
        let bytes = tables.get(at..at + 2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]) as u32)
    } else {
        tables.get(offset + index).map(|&b| b as u32)
    }
}

/// Estimate the quality that produced the table starting at `offset`,
/// from its DC coefficient alone.
///
/// Returns 0 when the DC coefficient is 0 or out of range.
pub fn estimate_quality(sixteen_bit: bool, tables: &[u8], offset: usize) -> u8 {
    let Some(dc) = coefficient_at(tables, offset, 0, sixteen_bit) else {
        return 0;
    };
    let seed = 100 * dc / DEFAULT_LUMA_DC;
    if seed == 0 {
        return 0;
    }
    let quality = if seed > 100 {
        5000 / seed
    } else {
        100 - seed / 2
    };
    quality as u8
}

/// Estimate quality from every table in `tables[offset..offset + length]`.
///
/// Each table scores `100 - mean(AC coefficients)`. The luma score is then
/// pulled toward the mean chroma score with a 0.49 weight, roughly how
/// chroma error leaks into RGB after YCbCr conversion. If that blend is not
/// positive the raw luma score is returned instead, floored at 0.
pub fn estimate_average_quality(precision: u8, tables: &[u8], offset: usize, length: usize) -> u8 {
    let end = (offset + length).min(tables.len());
    let Some(region) = tables.get(offset..end) else {
        return 0;
    };
    let set = QuantizationTableSet::new(precision, region.to_vec());

    let scores: Vec<f64> = set
        .iter()
        .map(|(_, sixteen_bit, table)| {
            let ac: Vec<u32> = (1..TABLE_COEFFICIENTS)
                .filter_map(|i| coefficient_at(table, 0, i, sixteen_bit))
                .collect();
            100.0 - ac.iter().sum::<u32>() as f64 / ac.len() as f64
        })
        .collect();

    let Some((&luma, chroma)) = scores.split_first() else {
        return 0;
    };
    let chroma = if chroma.is_empty() {
        luma
    } else {
        chroma.iter().sum::<f64>() / chroma.len() as f64
    };
    let blended = (luma - 0.49 * (luma - chroma)).round();
    if blended > 0.0 {
        blended.min(100.0) as u8
    } else {
        luma.round().clamp(0.0, 100.0) as u8
    }
}
