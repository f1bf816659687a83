//! Lazy marker scanner over a JPEG byte stream.
//!
//! The scanner walks marker to marker. Bytes between markers (entropy-coded
//! data, garbage) are skipped, `FF 00` stuffing is ignored, and a stream
//! that ends in the middle of a segment simply ends the scan: truncated
//! captures are common on lossy links and the caller gets every complete
//! marker that preceded the cut.

use std::io::{self, Read};

use super::marker::{Marker, MarkerCode, PREFIX};

/// Iterator yielding each complete [`Marker`] found in `reader`.
///
/// Restarting means building a new scanner at the desired stream position;
/// the scanner keeps no state beyond its read position.
#[derive(Debug)]
pub struct MarkerScanner<R> {
    reader: R,
    position: usize,
    done: bool,
}

impl<R: Read> MarkerScanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            position: 0,
            done: false,
        }
    }

    /// Number of bytes consumed from the reader so far. After a marker has
    /// been yielded this is the offset of the first byte following it.
    pub fn position(&self) -> usize {
        self.position
    }

    fn next_byte(&mut self) -> Option<u8> {
        let mut buf = [0u8; 1];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.position += 1;
                    return Some(buf[0]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::trace!(error = %e, "marker scan stopped on read error");
                    return None;
                }
            }
        }
    }

    fn read_data(&mut self, len: usize) -> Option<Vec<u8>> {
        let mut data = Vec::with_capacity(len);
        let read = (&mut self.reader)
            .take(len as u64)
            .read_to_end(&mut data)
            .ok()?;
        self.position += read;
        (read == len).then_some(data)
    }

    fn scan(&mut self) -> Option<Marker> {
        loop {
            if self.next_byte()? != PREFIX {
                continue;
            }

            // Fill bytes: any run of 0xFF before the code.
            let mut prefix_count = 1u32;
            let code = loop {
                match self.next_byte()? {
                    PREFIX => prefix_count += 1,
                    code => break code,
                }
            };

            let Some(kind) = MarkerCode::from_u8(code) else {
                // FF 00 inside entropy-coded data.
                continue;
            };

            if !kind.has_length() {
                return Some(Marker {
                    prefix_count,
                    code,
                    declared_length: 0,
                    data: Vec::new(),
                });
            }

            let length = u16::from_be_bytes([self.next_byte()?, self.next_byte()?]) as u32;
            if length < 2 {
                tracing::trace!(
                    code = format_args!("{:#04X}", code),
                    length,
                    "marker length shorter than its own field, skipped"
                );
                continue;
            }

            let data = self.read_data(length as usize - 2)?;
            return Some(Marker {
                prefix_count,
                code,
                declared_length: length,
                data,
            });
        }
    }
}

impl<R: Read> Iterator for MarkerScanner<R> {
    type Item = Marker;

    fn next(&mut self) -> Option<Marker> {
        if self.done {
            return None;
        }
        let marker = self.scan();
        if marker.is_none() {
            self.done = true;
        }
        marker
    }
}

/// Scan a byte stream for markers.
pub fn scan<R: Read>(reader: R) -> MarkerScanner<R> {
    MarkerScanner::new(reader)
}
