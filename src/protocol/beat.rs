//! Heartbeat vocabulary: beat messages, replies, and the stop handshake.
//!
//! ```text
//! client → peer   beat                     (no call attached)
//! client → peer   beat | <name> | <arg>    (three parts, one call attached)
//! peer → client   <meta>:::<body>          (reply carrying a payload)
//! peer → client   <meta>                   (reply without payload)
//! peer → client   STOPPED                  (shutdown handshake)
//! client → peer   STOP
//! ```

use bytes::Bytes;

use super::message::Message;

/// First part of every beat.
pub const BEAT: &str = "beat";

/// Separates reply metadata from the reply body.
pub const PAYLOAD_DELIMITER: &str = ":::";

/// A reply body starting with this marks a callee-side failure.
pub const ERROR_PREFIX: &str = "error";

/// Sent by the peer to complete the shutdown handshake.
pub const STOPPED: &str = "STOPPED";

/// Sent by the client in answer to `STOPPED`.
pub const STOP: &str = "STOP";

/// Build a beat, attaching a call when one is given.
///
/// # Example
///
/// ```
/// use beatwire::protocol::beat_message;
///
/// assert_eq!(beat_message(None).len(), 1);
/// assert_eq!(beat_message(Some(("echo", "Hello"))).len(), 3);
/// ```
pub fn beat_message(call: Option<(&str, &str)>) -> Message {
    match call {
        Some((function, argument)) => Message::from_parts([
            Bytes::from_static(BEAT.as_bytes()),
            Bytes::copy_from_slice(function.as_bytes()),
            Bytes::copy_from_slice(argument.as_bytes()),
        ]),
        None => Message::single(BEAT),
    }
}

/// A parsed reply to a beat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// No payload attached.
    Plain,
    /// The call succeeded; the body is the function's return value.
    Value(String),
    /// The callee reported a failure.
    Error(String),
}

impl Reply {
    /// Parse reply text.
    ///
    /// Everything after the first delimiter is the body. A body whose first
    /// five characters are `error` is a failure; its description is the rest
    /// of the body with a leading `:` and whitespace trimmed.
    ///
    /// # Example
    ///
    /// ```
    /// use beatwire::protocol::Reply;
    ///
    /// assert_eq!(Reply::parse("beat"), Reply::Plain);
    /// assert_eq!(Reply::parse("beat:::2.5"), Reply::Value("2.5".into()));
    /// assert_eq!(Reply::parse("beat:::error: boom"), Reply::Error("boom".into()));
    /// ```
    pub fn parse(text: &str) -> Self {
        let Some((_, body)) = text.split_once(PAYLOAD_DELIMITER) else {
            return Reply::Plain;
        };

        match body.strip_prefix(ERROR_PREFIX) {
            Some(rest) => {
                let description = rest.strip_prefix(':').unwrap_or(rest).trim_start();
                Reply::Error(description.to_string())
            }
            None => Reply::Value(body.to_string()),
        }
    }

    /// Check if this reply carries a payload.
    #[inline]
    pub fn has_payload(&self) -> bool {
        !matches!(self, Reply::Plain)
    }

    /// Encode as the single-part message a callee sends.
    ///
    /// Errors are written as `beat:::error: <description>`.
    pub fn to_message(&self) -> Message {
        let text = match self {
            Reply::Plain => BEAT.to_string(),
            Reply::Value(value) => format!("{}{}{}", BEAT, PAYLOAD_DELIMITER, value),
            Reply::Error(description) => format!(
                "{}{}{}: {}",
                BEAT, PAYLOAD_DELIMITER, ERROR_PREFIX, description
            ),
        };
        Message::from(text)
    }
}

/// Check if a message is exactly `STOPPED`.
pub fn is_stopped(message: &Message) -> bool {
    message.len() == 1 && message.parts()[0] == STOPPED.as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_beat() {
        let msg = beat_message(None);
        assert_eq!(msg.parts(), &[Bytes::from_static(b"beat")]);
    }

    #[test]
    fn test_beat_with_call() {
        let msg = beat_message(Some(("echo", "Hello")));
        assert_eq!(msg.part_str(0), Some("beat"));
        assert_eq!(msg.part_str(1), Some("echo"));
        assert_eq!(msg.part_str(2), Some("Hello"));
    }

    #[test]
    fn test_beat_with_empty_argument() {
        let msg = beat_message(Some(("ping", "")));
        assert_eq!(msg.len(), 3);
        assert_eq!(msg.part_str(2), Some(""));
    }

    #[test]
    fn test_parse_value_keeps_body_unmodified() {
        assert_eq!(
            Reply::parse("beat::: spaced value "),
            Reply::Value(" spaced value ".into())
        );
    }

    #[test]
    fn test_parse_splits_on_first_delimiter() {
        assert_eq!(Reply::parse("beat:::a:::b"), Reply::Value("a:::b".into()));
    }

    #[test]
    fn test_parse_empty_body_is_value() {
        let reply = Reply::parse("beat:::");
        assert_eq!(reply, Reply::Value(String::new()));
        assert!(reply.has_payload());
    }

    #[test]
    fn test_parse_error_variants() {
        assert_eq!(Reply::parse("beat:::error:boom"), Reply::Error("boom".into()));
        assert_eq!(
            Reply::parse("beat:::error: Malformed packet: 'x'"),
            Reply::Error("Malformed packet: 'x'".into())
        );
        assert_eq!(Reply::parse(":::error"), Reply::Error(String::new()));
    }

    #[test]
    fn test_parse_error_prefix_must_lead_body() {
        assert_eq!(
            Reply::parse("beat::: error"),
            Reply::Value(" error".into())
        );
        assert_eq!(Reply::parse("error"), Reply::Plain);
    }

    #[test]
    fn test_is_stopped() {
        assert!(is_stopped(&Message::single(STOPPED)));
        assert!(!is_stopped(&Message::single("STOPPED ")));
        assert!(!is_stopped(&Message::single("beat")));
        assert!(!is_stopped(&Message::from_parts(["STOPPED", "x"])));
    }

    #[test]
    fn test_reply_encoding_parses_back() {
        assert_eq!(Reply::Plain.to_message().text(), "beat");
        assert_eq!(Reply::Value("42".into()).to_message().text(), "beat:::42");

        let error = Reply::Error("Malformed packet: 'x'".into());
        assert_eq!(
            error.to_message().text(),
            "beat:::error: Malformed packet: 'x'"
        );
        assert_eq!(Reply::parse(&error.to_message().text()), error);
    }
}
