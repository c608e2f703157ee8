//! Message struct: one or more parts delivered as a unit.
//!
//! Uses `bytes::Bytes` for zero-copy part sharing.
//!
//! # Example
//!
//! ```
//! use beatwire::protocol::Message;
//!
//! let msg = Message::from_parts(["beat", "echo", "Hello"]);
//! assert_eq!(msg.len(), 3);
//! assert_eq!(msg.part_str(1), Some("echo"));
//! ```

use std::borrow::Cow;

use bytes::{BufMut, Bytes, BytesMut};

use super::wire_format::{PartHeader, DEFAULT_MAX_PARTS, DEFAULT_MAX_PART_SIZE, PART_HEADER_SIZE};
use crate::error::{BeatwireError, Result};

/// A whole message as delivered by the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    parts: Vec<Bytes>,
}

impl Message {
    /// Create a single-part message.
    pub fn single(part: impl Into<Bytes>) -> Self {
        Self {
            parts: vec![part.into()],
        }
    }

    /// Create a message from its parts, in order.
    pub fn from_parts<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Bytes>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// All parts of the message.
    #[inline]
    pub fn parts(&self) -> &[Bytes] {
        &self.parts
    }

    /// Number of parts.
    #[inline]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Check if the message has no parts.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Check if the message has more than one part.
    #[inline]
    pub fn is_multipart(&self) -> bool {
        self.parts.len() > 1
    }

    /// A part as UTF-8, or `None` if missing or not valid UTF-8.
    pub fn part_str(&self, index: usize) -> Option<&str> {
        self.parts
            .get(index)
            .and_then(|p| std::str::from_utf8(p).ok())
    }

    /// The whole message as text, parts concatenated.
    ///
    /// Invalid UTF-8 is replaced with U+FFFD.
    pub fn text(&self) -> Cow<'_, str> {
        match self.parts.as_slice() {
            [] => Cow::Borrowed(""),
            [only] => String::from_utf8_lossy(only),
            parts => {
                let joined: Vec<u8> = parts.iter().flat_map(|p| p.iter().copied()).collect();
                Cow::Owned(String::from_utf8_lossy(&joined).into_owned())
            }
        }
    }

    /// Consume into the underlying parts.
    pub fn into_parts(self) -> Vec<Bytes> {
        self.parts
    }

    /// Size of this message on the wire (headers + parts).
    pub fn encoded_len(&self) -> usize {
        self.parts.iter().map(|p| PART_HEADER_SIZE + p.len()).sum()
    }

    /// Check that the peer's frame buffer will accept this message.
    ///
    /// Rejects parts over [`DEFAULT_MAX_PART_SIZE`] and more than
    /// [`DEFAULT_MAX_PARTS`] parts.
    pub fn validate(&self) -> Result<()> {
        if self.parts.len() > DEFAULT_MAX_PARTS {
            return Err(BeatwireError::Protocol(format!(
                "Message exceeds {} parts",
                DEFAULT_MAX_PARTS
            )));
        }

        if let Some(part) = self
            .parts
            .iter()
            .find(|p| p.len() > DEFAULT_MAX_PART_SIZE as usize)
        {
            return Err(BeatwireError::Protocol(format!(
                "Part size {} exceeds maximum {}",
                part.len(),
                DEFAULT_MAX_PART_SIZE
            )));
        }

        Ok(())
    }

    /// Append the wire encoding of this message to `buf`.
    ///
    /// Parts must fit the `u32` length field; see [`Message::validate`].
    ///
    /// An empty message is encoded as a single empty part.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        if self.parts.is_empty() {
            buf.put_slice(&PartHeader::for_part(0, false).encode());
            return;
        }

        buf.reserve(self.encoded_len());
        let last = self.parts.len() - 1;
        for (i, part) in self.parts.iter().enumerate() {
            let header = PartHeader::for_part(part.len() as u32, i < last);
            buf.put_slice(&header.encode());
            buf.put_slice(part);
        }
    }
}

impl From<&'static str> for Message {
    fn from(text: &'static str) -> Self {
        Message::single(text)
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::single(text)
    }
}

/// Build the wire encoding of a message as a contiguous buffer.
pub fn build_message(message: &Message) -> Bytes {
    let mut buf = BytesMut::with_capacity(message.encoded_len().max(PART_HEADER_SIZE));
    message.encode_into(&mut buf);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_limits() {
        assert!(Message::from_parts(["beat", "echo", "Hello"]).validate().is_ok());

        let oversized = Bytes::from(vec![0u8; DEFAULT_MAX_PART_SIZE as usize + 1]);
        let msg = Message::from_parts([Bytes::from_static(b"beat"), oversized]);
        assert!(matches!(msg.validate(), Err(BeatwireError::Protocol(_))));

        let parts: Vec<String> = (0..=DEFAULT_MAX_PARTS).map(|i| i.to_string()).collect();
        let msg = Message::from_parts(parts);
        assert!(matches!(msg.validate(), Err(BeatwireError::Protocol(_))));
    }

    #[test]
    fn test_single_part() {
        let msg = Message::single("beat");
        assert_eq!(msg.len(), 1);
        assert!(!msg.is_multipart());
        assert_eq!(msg.text(), "beat");
    }

    #[test]
    fn test_part_str_invalid_utf8() {
        let msg = Message::from_parts([Bytes::from_static(b"beat"), Bytes::from_static(&[0xff])]);
        assert_eq!(msg.part_str(0), Some("beat"));
        assert_eq!(msg.part_str(1), None);
        assert_eq!(msg.part_str(2), None);
    }

    #[test]
    fn test_text_joins_parts() {
        let msg = Message::from_parts(["beat", ":::", "42"]);
        assert_eq!(msg.text(), "beat:::42");
    }

    #[test]
    fn test_build_message_layout() {
        let msg = Message::from_parts(["ab", "c"]);
        let bytes = build_message(&msg);

        assert_eq!(bytes.len(), msg.encoded_len());
        assert_eq!(&bytes[..], &[1, 0, 0, 0, 2, b'a', b'b', 0, 0, 0, 0, 1, b'c']);
    }

    #[test]
    fn test_build_empty_message() {
        let msg = Message::from_parts(Vec::<Bytes>::new());
        let bytes = build_message(&msg);
        assert_eq!(&bytes[..], &[0, 0, 0, 0, 0]);
    }
}
