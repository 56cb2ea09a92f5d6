//! Frame reassembler and dispatcher
//!
//! Inbound notifications arrive in arbitrary pieces, sometimes one byte at a
//! time. `FrameBuffer` accumulates them and cuts complete frames off the
//! front; `FrameReassembler` decodes each frame through the type registry and
//! hands the packet to a callback.
//!
//! An incomplete frame is never an error: the bytes stay buffered until the
//! next feed completes them. Unknown or malformed frames are dropped and the
//! frames behind them are still delivered.

use bytes::{Buf, Bytes, BytesMut};

use super::packet::RxPacket;
use super::registry;

/// Initial buffer capacity; a full frame is at most 256 bytes
const INITIAL_CAPACITY: usize = 256;

/// One complete frame cut from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub type_code: u8,
    pub payload: Bytes,
}

/// Accumulates inbound bytes and extracts complete frames
#[derive(Debug)]
pub struct FrameBuffer {
    buffer: BytesMut,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Append received bytes
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Cut the next complete frame off the front of the buffer
    ///
    /// Returns `None` when the buffer is empty or the leading frame is still
    /// incomplete; in that case nothing is consumed.
    pub fn next_frame(&mut self) -> Option<RawFrame> {
        loop {
            let length = *self.buffer.first()? as usize;

            if self.buffer.len() < length + 1 {
                return None;
            }

            if length == 0 {
                // A zero length carries no type byte; drop it and move on
                tracing::trace!("Dropping zero-length frame");
                self.buffer.advance(1);
                continue;
            }

            let mut frame = self.buffer.split_to(length + 1);
            frame.advance(1);
            let type_code = frame.get_u8();

            return Some(RawFrame {
                type_code,
                payload: frame.freeze(),
            });
        }
    }

    /// Number of buffered bytes not yet part of an extracted frame
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard everything buffered
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Tally of one `feed` call
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeedSummary {
    /// Packets handed to the callback
    pub dispatched: usize,

    /// Frames with no registry entry
    pub unknown: usize,

    /// Frames whose payload failed to decode
    pub malformed: usize,
}

/// Turns a chunked byte stream into typed packets
#[derive(Debug, Default)]
pub struct FrameReassembler {
    frames: FrameBuffer,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self {
            frames: FrameBuffer::new(),
        }
    }

    /// Append `chunk` and dispatch every packet it completes, in order
    ///
    /// The callback runs synchronously before `feed` returns.
    pub fn feed<F>(&mut self, chunk: &[u8], mut on_packet: F) -> FeedSummary
    where
        F: FnMut(RxPacket),
    {
        let mut summary = FeedSummary::default();
        if chunk.is_empty() {
            return summary;
        }

        self.frames.push(chunk);

        while let Some(frame) = self.frames.next_frame() {
            let Some(entry) = registry::lookup(frame.type_code) else {
                tracing::debug!("Skipping frame with unknown type 0x{:02x}", frame.type_code);
                summary.unknown += 1;
                continue;
            };

            match (entry.decode)(&frame.payload) {
                Ok(packet) => {
                    tracing::trace!("Decoded {} packet: {:?}", entry.name, packet);
                    summary.dispatched += 1;
                    on_packet(packet);
                }
                Err(e) => {
                    tracing::warn!("Dropping malformed {} frame: {}", entry.name, e);
                    summary.malformed += 1;
                }
            }
        }

        summary
    }

    /// Discard any partial frame left from a previous session
    pub fn clear(&mut self) {
        if !self.frames.is_empty() {
            tracing::debug!(
                "Discarding {} stale buffered bytes",
                self.frames.buffered_len()
            );
        }
        self.frames.clear();
    }

    pub fn buffered_len(&self) -> usize {
        self.frames.buffered_len()
    }
}
