//! Responder - the callee side of the heartbeat.
//!
//! Answers every beat with exactly one reply, runs the call attached to a
//! beat, and ends the session when it receives `STOP`. After each reply it
//! sleeps for the beat interval, which paces the whole cycle.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;

use super::registry::{HandlerRegistry, HandlerResult};
use crate::error::{BeatwireError, Result};
use crate::protocol::{Message, Reply, STOP, STOPPED};
use crate::transport::{Channel, Listener};

/// Shortest allowed pause between replies.
pub const MIN_BEAT_INTERVAL: Duration = Duration::from_millis(1);

/// Longest allowed pause between replies.
pub const MAX_BEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Default pause between replies.
pub const DEFAULT_BEAT_INTERVAL: Duration = MAX_BEAT_INTERVAL;

/// More payload parts than this on one beat is a protocol violation.
pub const MAX_PAYLOAD_PARTS: usize = 10;

/// Builder for a [`Responder`].
#[derive(Debug)]
pub struct ResponderBuilder {
    registry: HandlerRegistry,
    beat_interval: Duration,
    debug: bool,
}

impl ResponderBuilder {
    /// Create a builder with `echo` registered.
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::with_echo(),
            beat_interval: DEFAULT_BEAT_INTERVAL,
            debug: false,
        }
    }

    /// Register a callable function.
    ///
    /// The handler returns the value to send back, or an error description.
    pub fn handle<F, Fut>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.registry.register(name, handler);
        self
    }

    /// Set the pause after each reply.
    ///
    /// Must lie within [`MIN_BEAT_INTERVAL`] and [`MAX_BEAT_INTERVAL`].
    /// Default: 1 second
    pub fn beat_interval(mut self, interval: Duration) -> Self {
        self.beat_interval = interval;
        self
    }

    /// Log every beat and reply at debug level.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Accept one connection from `listener` and serve it.
    pub async fn accept(self, listener: &Listener) -> Result<Responder> {
        self.validate()?;
        let (channel, peer) = listener.accept().await?;
        tracing::info!("Accepted connection from {}", peer);
        Ok(self.build(channel))
    }

    /// Serve an already open channel.
    pub fn serve(self, channel: Channel) -> Result<Responder> {
        self.validate()?;
        Ok(self.build(channel))
    }

    fn validate(&self) -> Result<()> {
        if !(MIN_BEAT_INTERVAL..=MAX_BEAT_INTERVAL).contains(&self.beat_interval) {
            return Err(BeatwireError::Config(format!(
                "beat interval {:?} out of bounds [{:?}, {:?}]",
                self.beat_interval, MIN_BEAT_INTERVAL, MAX_BEAT_INTERVAL
            )));
        }
        Ok(())
    }

    fn build(self, channel: Channel) -> Responder {
        Responder {
            channel,
            registry: self.registry,
            beat_interval: self.beat_interval,
            debug: self.debug,
        }
    }
}

impl Default for ResponderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Callee end of one heartbeat connection.
#[derive(Debug)]
pub struct Responder {
    channel: Channel,
    registry: HandlerRegistry,
    beat_interval: Duration,
    debug: bool,
}

impl Responder {
    /// Create a new responder builder.
    pub fn builder() -> ResponderBuilder {
        ResponderBuilder::new()
    }

    /// Answer beats until `STOP` arrives; returns the number of beats served.
    ///
    /// # Errors
    ///
    /// - `ConnectionClosed` if the peer goes away without `STOP`
    /// - `Protocol` if a beat carries more than [`MAX_PAYLOAD_PARTS`] parts
    pub async fn run(mut self) -> Result<u64> {
        let mut count = 0u64;
        tracing::info!("Beginning heartbeat");

        loop {
            let Some(message) = self.channel.recv().await else {
                tracing::warn!("Peer closed the connection after {} beats", count);
                return Err(BeatwireError::ConnectionClosed);
            };
            count += 1;

            if self.debug {
                tracing::debug!("Received {:?} ({:04})", message.text(), count);
            }

            if is_stop_request(&message) {
                tracing::info!("Terminating heartbeat");
                self.channel.send(STOPPED).await?;
                break;
            }

            let reply = self.answer(&message).await?;
            if self.debug {
                tracing::debug!("Sending {:?}", reply);
            }
            self.channel.send(reply.to_message()).await?;

            tokio::time::sleep(self.beat_interval).await;
        }

        self.channel.close().await?;
        tracing::info!("Heartbeat terminated after {} beats", count);
        Ok(count)
    }

    /// Build the reply to one beat.
    async fn answer(&self, message: &Message) -> Result<Reply> {
        let payload = message.parts().get(1..).unwrap_or_default();
        if payload.is_empty() {
            return Ok(Reply::Plain);
        }

        if payload.len() > MAX_PAYLOAD_PARTS {
            return Err(BeatwireError::Protocol(format!(
                "{} payload parts exceeds limit of {}",
                payload.len(),
                MAX_PAYLOAD_PARTS
            )));
        }

        match self.call(payload).await {
            Ok(value) => Ok(Reply::Value(value)),
            Err(reason) => {
                tracing::warn!("Malformed packet: {}", reason);
                Ok(Reply::Error(format!("Malformed packet: '{}'", reason)))
            }
        }
    }

    async fn call(&self, payload: &[Bytes]) -> HandlerResult {
        let [function, argument] = payload else {
            return Err(format!("expected 2 payload parts, got {}", payload.len()));
        };

        let function = std::str::from_utf8(function)
            .map_err(|_| "function name is not valid UTF-8".to_string())?;
        let argument = std::str::from_utf8(argument)
            .map_err(|_| "argument is not valid UTF-8".to_string())?;

        self.registry.dispatch(function, argument.to_string()).await
    }
}

fn is_stop_request(message: &Message) -> bool {
    message
        .parts()
        .first()
        .is_some_and(|part| part.starts_with(STOP.as_bytes()))
}
