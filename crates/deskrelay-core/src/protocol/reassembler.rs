//! Reassembly of length-prefixed stream frames from a TCP byte stream.
//!
//! TCP is a *stream* protocol: a single `read()` may return half a frame, or
//! the tail of one frame plus the head of three more.  [`FrameReassembler`]
//! accumulates bytes across calls and yields each payload exactly once, in
//! order, as soon as it is complete.
//!
//! ```text
//! ┌──────────────┬──────────────────────────┐
//! │ Length (4 BE)│       Payload (Length)   │
//! └──────────────┴──────────────────────────┘
//! ```
//!
//! The reassembler never inspects payload contents.  Classification happens
//! afterwards in [`crate::protocol::codec::decode_stream_payload`].

use thiserror::Error;
use tracing::trace;

use crate::protocol::codec::STREAM_HEADER_SIZE;

/// Default ceiling on a single frame's payload (16 MiB).
pub const DEFAULT_MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Errors raised while reassembling frames.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// A length prefix exceeded the configured ceiling.
    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: u32, max: u32 },
}

/// Which part of a frame the next buffered bytes belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingHeader,
    AwaitingPayload(usize),
}

/// Per-connection accumulator for length-prefixed frames.
#[derive(Debug)]
pub struct FrameReassembler {
    buf: Vec<u8>,
    phase: Phase,
    max_frame_len: u32,
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl FrameReassembler {
    /// Creates an empty reassembler that rejects frames above `max_frame_len`.
    pub fn new(max_frame_len: u32) -> Self {
        Self {
            buf: Vec::with_capacity(4096),
            phase: Phase::AwaitingHeader,
            max_frame_len,
        }
    }

    /// Appends `chunk` and returns every frame it completed, in order.
    ///
    /// A zero-length frame is returned as an empty `Vec`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::FrameTooLarge`] when a length prefix exceeds the
    /// ceiling.  The stream cannot be resynchronised after that, so the
    /// caller must drop the connection.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Vec<u8>>, FrameError> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut cursor = 0;

        loop {
            let available = self.buf.len() - cursor;
            match self.phase {
                Phase::AwaitingHeader if available >= STREAM_HEADER_SIZE => {
                    let header = &self.buf[cursor..cursor + STREAM_HEADER_SIZE];
                    let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
                    if len > self.max_frame_len {
                        self.buf.clear();
                        return Err(FrameError::FrameTooLarge {
                            len,
                            max: self.max_frame_len,
                        });
                    }
                    cursor += STREAM_HEADER_SIZE;
                    self.phase = Phase::AwaitingPayload(len as usize);
                }
                Phase::AwaitingPayload(required) if available >= required => {
                    frames.push(self.buf[cursor..cursor + required].to_vec());
                    cursor += required;
                    self.phase = Phase::AwaitingHeader;
                    trace!("reassembled frame of {required} bytes");
                }
                _ => break,
            }
        }

        // Shift the unconsumed tail to the front in one move.
        self.buf.drain(..cursor);
        Ok(frames)
    }

    /// Number of bytes held that do not yet form a complete frame.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Payload length of the frame currently being assembled, if any.
    pub fn pending_frame_len(&self) -> Option<usize> {
        match self.phase {
            Phase::AwaitingHeader => None,
            Phase::AwaitingPayload(n) => Some(n),
        }
    }

    /// `true` when the stream ended cleanly on a frame boundary.
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::AwaitingHeader && self.buf.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
