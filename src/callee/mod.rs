//! Callee side - function registry and the beat responder.
//!
//! Provides:
//! - [`HandlerRegistry`] - maps function names to async handlers
//! - [`Responder`] - answers beats and runs attached calls
//!
//! # Example
//!
//! ```no_run
//! use beatwire::callee::Responder;
//! use beatwire::transport::Listener;
//! use std::time::Duration;
//!
//! # async fn serve() -> beatwire::Result<()> {
//! let listener = Listener::bind("127.0.0.1:3000").await?;
//! let responder = Responder::builder()
//!     .handle("shout", |arg: String| async move { Ok(arg.to_uppercase()) })
//!     .beat_interval(Duration::from_millis(10))
//!     .accept(&listener)
//!     .await?;
//!
//! let beats = responder.run().await?;
//! # let _ = beats;
//! # Ok(())
//! # }
//! ```

mod registry;
mod responder;

pub use registry::{BoxFuture, Handler, HandlerRegistry, HandlerResult};
pub use responder::{
    Responder, ResponderBuilder, DEFAULT_BEAT_INTERVAL, MAX_BEAT_INTERVAL, MAX_PAYLOAD_PARTS,
    MIN_BEAT_INTERVAL,
};
