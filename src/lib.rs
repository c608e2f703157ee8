//! # beatwire
//!
//! Heartbeat-driven remote calls over a persistent message channel.
//!
//! The client sends a `beat` to its peer, waits for the reply, and sends the
//! next beat straight away. At most one remote call rides on each beat; its
//! result comes back attached to the reply. A beat left unanswered for the
//! configured timeout ends the connection.
//!
//! ## Architecture
//!
//! - **Engine** ([`engine`]): one task per connection running the
//!   Init → Running → Stopping → Stopped state machine
//! - **Call façade** ([`Client`]): queues a call for the next beat and hands
//!   back a [`PendingReply`]
//! - **Transport** ([`transport`]): multi-part messages over TCP, any byte
//!   stream, or an in-memory pair
//! - **Callee** ([`callee`]): a [`Responder`] answering beats with
//!   registered functions
//!
//! ## Example
//!
//! ```no_run
//! use beatwire::{CallError, Client};
//!
//! #[tokio::main]
//! async fn main() -> beatwire::Result<()> {
//!     let mut client = Client::builder()
//!         .host("127.0.0.1")
//!         .port(3000)
//!         .connect()
//!         .await?;
//!     client.start()?;
//!
//!     match client.call("echo", "Hello").await {
//!         Ok(value) => println!("echo returned {}", value),
//!         Err(CallError::Remote(e)) => eprintln!("callee failed: {}", e),
//!         Err(e) => eprintln!("call failed: {}", e),
//!     }
//!
//!     client.stop().await?;
//!     client.wait().await
//! }
//! ```

pub mod callee;
pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod transport;

mod client;
mod writer;

pub use callee::{Responder, ResponderBuilder};
pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, LivenessAction};
pub use engine::{CallResult, ConnectionState, PendingReply};
pub use error::{BeatwireError, CallError, Result};
