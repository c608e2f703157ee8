//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented parts:
//! - `WaitingForHeader`: Need at least 5 bytes
//! - `WaitingForBody`: Header parsed, need N more part bytes
//!
//! Parts are collected until one arrives without the `MORE` flag, at which
//! point the whole message is emitted.
//!
//! # Example
//!
//! ```
//! use beatwire::protocol::{build_message, FrameBuffer, Message};
//!
//! let mut buffer = FrameBuffer::new();
//! let bytes = build_message(&Message::from_parts(["beat", "echo", "Hello"]));
//!
//! let messages = buffer.push(&bytes).unwrap();
//! assert_eq!(messages.len(), 1);
//! assert_eq!(messages[0].part_str(2), Some("Hello"));
//! ```

use bytes::{Bytes, BytesMut};

use super::message::Message;
use super::wire_format::{PartHeader, DEFAULT_MAX_PARTS, DEFAULT_MAX_PART_SIZE, PART_HEADER_SIZE};
use crate::error::{BeatwireError, Result};

/// State machine for part parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for complete header (need 5 bytes).
    WaitingForHeader,
    /// Header parsed, waiting for part bytes.
    WaitingForBody { header: PartHeader },
}

/// Buffer for accumulating incoming bytes and extracting complete messages.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Parts of the message currently being assembled.
    parts: Vec<Bytes>,
    /// Maximum allowed part size.
    max_part_size: u32,
    /// Maximum parts per message.
    max_parts: usize,
}

impl FrameBuffer {
    /// Create a new frame buffer with default limits.
    ///
    /// Default capacity: 8KB, max part: 16MiB, max parts: 64.
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_PART_SIZE, DEFAULT_MAX_PARTS)
    }

    /// Create a new frame buffer with custom limits.
    pub fn with_limits(max_part_size: u32, max_parts: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
            state: State::WaitingForHeader,
            parts: Vec::new(),
            max_part_size,
            max_parts,
        }
    }

    /// Push data into the buffer and extract all complete messages.
    ///
    /// Partial data is buffered internally for the next push.
    ///
    /// # Errors
    ///
    /// Returns error if a part exceeds `max_part_size`, a message exceeds
    /// `max_parts`, or reserved flag bits are set.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Message>> {
        self.buffer.extend_from_slice(data);

        let mut messages = Vec::new();

        while let Some(message) = self.try_extract_one()? {
            messages.push(message);
        }

        Ok(messages)
    }

    /// Try to extract a single message from the buffer.
    fn try_extract_one(&mut self) -> Result<Option<Message>> {
        loop {
            match &self.state {
                State::WaitingForHeader => {
                    let Some(header) = PartHeader::decode(&self.buffer) else {
                        return Ok(None);
                    };
                    header.validate(self.max_part_size)?;

                    let _ = self.buffer.split_to(PART_HEADER_SIZE);
                    self.state = State::WaitingForBody { header };
                }

                State::WaitingForBody { header } => {
                    let header = *header;
                    let length = header.length as usize;

                    if self.buffer.len() < length {
                        return Ok(None);
                    }

                    let part = self.buffer.split_to(length).freeze();
                    self.state = State::WaitingForHeader;
                    self.parts.push(part);

                    if self.parts.len() > self.max_parts {
                        return Err(BeatwireError::Protocol(format!(
                            "Message exceeds {} parts",
                            self.max_parts
                        )));
                    }

                    if !header.has_more() {
                        let parts = std::mem::take(&mut self.parts);
                        return Ok(Some(Message::from_parts(parts)));
                    }
                }
            }
        }
    }

    /// Get the number of buffered bytes not yet assigned to a part.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if nothing is buffered, including partially assembled messages.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.parts.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.parts.clear();
        self.state = State::WaitingForHeader;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForBody { .. } => "WaitingForBody",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
