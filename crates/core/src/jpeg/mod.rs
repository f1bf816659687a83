//! JPEG container handling needed by RFC 2435.
//!
//! Only what the payload format touches is modelled here:
//!
//! - [`marker`]: marker segments and their serialization.
//! - [`scanner`]: a lazy marker-to-marker walk over a byte stream.
//! - [`quant`]: quantization table synthesis and quality estimation.
//! - [`header`]: the baseline header a receiver prepends to the scan.
//!
//! Pixel decoding, progressive and arithmetic-coded JPEG are out of scope;
//! the codec moves already-encoded bitstreams around.

pub mod header;
pub mod marker;
pub mod quant;
pub mod scanner;

pub use header::{HeaderParams, build_header};
pub use marker::{Marker, MarkerCode};
pub use quant::{BaseTables, QuantizationTableSet};
pub use scanner::{MarkerScanner, scan};
