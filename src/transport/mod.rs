//! Transport module - the message channel the heartbeat runs over.
//!
//! Provides:
//! - [`Channel`] over TCP or any `AsyncRead + AsyncWrite` stream
//! - In-memory [`Channel::pair`] for embedding and tests
//! - [`Listener`] for the accepting side

mod channel;
mod tcp;

pub use channel::{Channel, DEFAULT_LINGER};
pub use tcp::Listener;
