//! Protocol module - wire format, message framing, and the beat vocabulary.
//!
//! This module implements:
//! - 5-byte part header encoding/decoding
//! - Frame buffer for accumulating partial reads into whole messages
//! - Multi-part message type
//! - Beat/reply/handshake literals and reply parsing

mod beat;
mod frame_buffer;
mod message;
mod wire_format;

pub use beat::{
    beat_message, is_stopped, Reply, BEAT, ERROR_PREFIX, PAYLOAD_DELIMITER, STOP, STOPPED,
};
pub use frame_buffer::FrameBuffer;
pub use message::{build_message, Message};
pub use wire_format::{
    flags, PartHeader, DEFAULT_MAX_PARTS, DEFAULT_MAX_PART_SIZE, PART_HEADER_SIZE,
};
