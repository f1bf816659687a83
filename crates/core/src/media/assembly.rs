//! Per-frame reassembly of depacketized byte ranges.
//!
//! The depacketizer never concatenates bytes itself. It inserts ranges under
//! integer keys that increase in byte-stream order:
//!
//! ```text
//!   key(first) - 1    synthesized JPEG header
//!   key(first)        scan bytes of the packet with fragment offset 0
//!   ...
//!   key(last)         scan bytes of the packet with the marker bit
//!   key(last) + 1     EOI, when the scan did not end with one
//! ```
//!
//! A [`ReassemblyBuffer`] keeps those ranges and reports when the run from
//! head to tail has no gaps.

use std::collections::BTreeMap;

/// Ordered, keyed storage for the ranges of one logical frame.
pub trait ReassemblyBuffer {
    /// Store `range` under `key`, replacing any previous range there.
    fn insert(&mut self, key: i64, range: Vec<u8>);

    fn contains(&self, key: i64) -> bool;

    /// The range stored under `key`.
    fn get(&self, key: i64) -> Option<&[u8]>;

    /// Record the first key of the frame (the header key).
    fn mark_head(&mut self, key: i64);

    /// Record the last key of the frame.
    fn mark_tail(&mut self, key: i64);

    /// True once both ends are known and every key between them is present.
    fn is_complete(&self) -> bool;

    /// Ranges in key order.
    fn values_in_order(&self) -> impl Iterator<Item = &[u8]> + '_;
}

/// [`ReassemblyBuffer`] backed by a `BTreeMap`.
#[derive(Debug, Default, Clone)]
pub struct FrameBuffer {
    ranges: BTreeMap<i64, Vec<u8>>,
    head: Option<i64>,
    tail: Option<i64>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored ranges.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Total bytes across all ranges.
    pub fn byte_len(&self) -> usize {
        self.ranges.values().map(Vec::len).sum()
    }

    pub fn head(&self) -> Option<i64> {
        self.head
    }

    pub fn tail(&self) -> Option<i64> {
        self.tail
    }

    /// Concatenate every range in key order.
    pub fn assemble(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        for range in self.values_in_order() {
            out.extend_from_slice(range);
        }
        out
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
        self.head = None;
        self.tail = None;
    }
}

impl ReassemblyBuffer for FrameBuffer {
    fn insert(&mut self, key: i64, range: Vec<u8>) {
        self.ranges.insert(key, range);
    }

    fn contains(&self, key: i64) -> bool {
        self.ranges.contains_key(&key)
    }

    fn get(&self, key: i64) -> Option<&[u8]> {
        self.ranges.get(&key).map(Vec::as_slice)
    }

    fn mark_head(&mut self, key: i64) {
        self.head = Some(key);
    }

    fn mark_tail(&mut self, key: i64) {
        self.tail = Some(key);
    }

    fn is_complete(&self) -> bool {
        let (Some(head), Some(tail)) = (self.head, self.tail) else {
            return false;
        };
        if tail < head {
            return false;
        }
        let present = self.ranges.range(head..=tail).count() as i64;
        present == tail - head + 1
    }

    fn values_in_order(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.ranges.values().map(Vec::as_slice)
    }
}
