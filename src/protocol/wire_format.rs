//! Part header encoding and decoding.
//!
//! Every message part on a stream transport is prefixed by a 5-byte header:
//! ```text
//! ┌───────┬──────────┐
//! │ Flags │ Length   │
//! │ 1 byte│ 4 bytes  │
//! │       │ uint32 BE│
//! └───────┴──────────┘
//! ```
//!
//! A part with the `MORE` flag is followed by another part of the same
//! message. The last part of a message has `MORE` cleared.

use crate::error::{BeatwireError, Result};

/// Part header size in bytes (fixed, exactly 5).
pub const PART_HEADER_SIZE: usize = 5;

/// Default maximum size of a single part (16 MiB).
pub const DEFAULT_MAX_PART_SIZE: u32 = 16 * 1024 * 1024;

/// Default maximum number of parts in one message.
pub const DEFAULT_MAX_PARTS: usize = 64;

/// Flag constants for part headers.
pub mod flags {
    /// Another part of the same message follows.
    pub const MORE: u8 = 0b0000_0001;

    /// Reserved bits mask (bits 1-7).
    pub const RESERVED_MASK: u8 = 0b1111_1110;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }
}

/// Decoded part header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartHeader {
    /// Flags byte (see `flags` module).
    pub flags: u8,
    /// Part length in bytes.
    pub length: u32,
}

impl PartHeader {
    /// Create a new header.
    pub fn new(flags: u8, length: u32) -> Self {
        Self { flags, length }
    }

    /// Header for a part of `length` bytes, `more` if not the last part.
    pub fn for_part(length: u32, more: bool) -> Self {
        let flags = if more { flags::MORE } else { 0 };
        Self { flags, length }
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use beatwire::protocol::PartHeader;
    ///
    /// let bytes = PartHeader::for_part(4, true).encode();
    /// assert_eq!(bytes, [0x01, 0, 0, 0, 4]);
    /// ```
    pub fn encode(&self) -> [u8; PART_HEADER_SIZE] {
        let mut buf = [0u8; PART_HEADER_SIZE];
        buf[0] = self.flags;
        buf[1..5].copy_from_slice(&self.length.to_be_bytes());
        buf
    }

    /// Decode header from bytes.
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < PART_HEADER_SIZE {
            return None;
        }
        Some(Self {
            flags: buf[0],
            length: u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]),
        })
    }

    /// Validate the header for protocol compliance.
    ///
    /// Checks:
    /// - Part length doesn't exceed max
    /// - Reserved flag bits are 0
    pub fn validate(&self, max_part_size: u32) -> Result<()> {
        if self.length > max_part_size {
            return Err(BeatwireError::Protocol(format!(
                "Part size {} exceeds maximum {}",
                self.length, max_part_size
            )));
        }

        if self.flags & flags::RESERVED_MASK != 0 {
            return Err(BeatwireError::Protocol(
                "Reserved flag bits must be 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Check if another part follows.
    #[inline]
    pub fn has_more(&self) -> bool {
        flags::has_flag(self.flags, flags::MORE)
    }
}
