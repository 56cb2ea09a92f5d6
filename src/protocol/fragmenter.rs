//! Packet fragmenter
//!
//! Splits an encoded command into transport-sized chunks, front to back.

use std::collections::VecDeque;

use bytes::Bytes;

/// Ordered queue of the chunks still to be written
#[derive(Debug, Clone)]
pub struct PacketFragmenter {
    chunks: VecDeque<Bytes>,
}

impl PacketFragmenter {
    /// Slice `data` into `chunk_size` pieces; the last may be shorter
    ///
    /// Empty input yields no chunks at all. A `chunk_size` of zero is treated
    /// as one.
    pub fn new(data: impl Into<Bytes>, chunk_size: usize) -> Self {
        let mut data: Bytes = data.into();
        let chunk_size = chunk_size.max(1);

        let mut chunks = VecDeque::with_capacity(data.len().div_ceil(chunk_size));
        while !data.is_empty() {
            let take = chunk_size.min(data.len());
            chunks.push_back(data.split_to(take));
        }

        Self { chunks }
    }

    /// Chunks not yet taken, in order
    pub fn remaining(&self) -> Vec<Bytes> {
        self.chunks.iter().cloned().collect()
    }

    /// Number of chunks not yet taken
    pub fn remaining_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl Iterator for PacketFragmenter {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        self.chunks.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.chunks.len(), Some(self.chunks.len()))
    }
}

impl ExactSizeIterator for PacketFragmenter {}
