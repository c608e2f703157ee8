//! Error types for beatwire.

use std::time::Duration;

use thiserror::Error;

/// Connection-level error type.
///
/// Fatal variants end the connection: the channel is closed and every
/// outstanding call resolves with [`CallError::ConnectionLost`].
#[derive(Debug, Error)]
pub enum BeatwireError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Protocol error (invalid framing, oversized part, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// No response to a beat arrived within the configured window.
    #[error("No response to beat within {0:?}")]
    LivenessTimeout(Duration),

    /// A payload response arrived while no call was awaiting one.
    #[error("Unexpected payload response: {0:?}")]
    UnhandledPayload(String),

    /// The stop handshake did not complete in time.
    #[error("Stop handshake timed out after {0:?}")]
    ShutdownTimeout(Duration),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// `start()` was called on a client that is already running.
    #[error("Client already started")]
    AlreadyStarted,

    /// The operation needs a running connection.
    #[error("Client is not running")]
    NotRunning,

    /// The engine task panicked or was cancelled.
    #[error("Engine task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl BeatwireError {
    /// Whether this error is a liveness failure (timeout or lost transport).
    pub fn is_liveness_failure(&self) -> bool {
        matches!(
            self,
            BeatwireError::LivenessTimeout(_) | BeatwireError::ConnectionClosed
        )
    }
}

/// Outcome of a single remote call that did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The callee reported an error for this call.
    #[error("Remote error: {0}")]
    Remote(String),

    /// The response to the call's beat carried no payload.
    #[error("Response carried no payload")]
    NoPayload,

    /// Another call was queued before this one was sent.
    #[error("Call superseded before it was sent")]
    Superseded,

    /// The connection entered shutdown before the call completed.
    #[error("Connection stopped")]
    Stopped,

    /// The connection failed or was closed.
    #[error("Connection lost")]
    ConnectionLost,

    /// The function name or argument is over the part size limit.
    #[error("Call part of {size} bytes exceeds maximum {max}")]
    TooLarge {
        /// Size of the offending part.
        size: usize,
        /// Largest part the peer accepts.
        max: usize,
    },
}

/// Result type alias using BeatwireError.
pub type Result<T> = std::result::Result<T, BeatwireError>;
