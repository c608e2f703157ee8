//! Client builder and call façade.
//!
//! The [`ClientBuilder`] collects configuration and opens the connection.
//! The [`Client`] manages the lifecycle:
//! 1. `start()` spawns the heartbeat engine, which sends the first beat
//! 2. `invoke()` queues a call for the next beat
//! 3. `stop()` runs the shutdown handshake
//! 4. `wait()` returns how the connection ended
//!
//! # Example
//!
//! ```no_run
//! use beatwire::Client;
//!
//! #[tokio::main]
//! async fn main() -> beatwire::Result<()> {
//!     let mut client = Client::builder()
//!         .port(3000)
//!         .timeout_ms(2000)
//!         .announce_stop(true)
//!         .connect()
//!         .await?;
//!
//!     client.start()?;
//!     let reply = client.call("echo", "Hello").await;
//!     assert_eq!(reply.as_deref(), Ok("Hello"));
//!
//!     client.stop().await?;
//!     client.wait().await
//! }
//! ```

use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::{ClientConfig, LivenessAction};
use crate::engine::{
    CallResult, ConnectionState, Control, ControlSender, Engine, PendingReply, PendingSlot,
};
use crate::error::{BeatwireError, CallError, Result};
use crate::protocol::DEFAULT_MAX_PART_SIZE;
use crate::transport::Channel;

/// Builder for configuring and connecting a client.
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    liveness_action: LivenessAction,
}

impl ClientBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the peer host.
    ///
    /// Default: 127.0.0.1
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the peer port.
    ///
    /// Default: 3000
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the reply window for each beat and for the stop handshake.
    ///
    /// Default: 5000 ms
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.timeout_ms = timeout_ms;
        self
    }

    /// Log every beat and reply at debug level.
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Send `STOP` as soon as `stop()` is called.
    pub fn announce_stop(mut self, announce: bool) -> Self {
        self.config.announce_stop = announce;
        self
    }

    /// Run `handler` instead of the default fatal action on a liveness failure.
    ///
    /// The connection is closed before the handler runs.
    pub fn on_liveness_failure<F>(mut self, handler: F) -> Self
    where
        F: Fn(&BeatwireError) + Send + Sync + 'static,
    {
        self.liveness_action = LivenessAction::Notify(Arc::new(handler));
        self
    }

    /// Connect over TCP to the configured host and port.
    pub async fn connect(self) -> Result<Client> {
        self.config.validate()?;
        let address = self.config.address();
        tracing::debug!("Connecting to {}", address);

        let channel = Channel::connect(address.as_str()).await?;
        Ok(self.build(channel))
    }

    /// Use an already open channel.
    pub fn with_channel(self, channel: Channel) -> Result<Client> {
        self.config.validate()?;
        Ok(self.build(channel))
    }

    fn build(self, channel: Channel) -> Client {
        let slot = PendingSlot::new();
        let (engine, control, state) =
            Engine::new(channel, &self.config, self.liveness_action, slot.clone());

        Client {
            slot,
            control,
            state,
            engine: Some(engine),
            task: None,
        }
    }
}

/// A heartbeat connection to one peer.
///
/// Dropping the client closes the connection without the stop handshake.
pub struct Client {
    /// Call queued for the next beat.
    slot: PendingSlot,
    /// Requests to the engine task.
    control: ControlSender,
    /// Engine state as last published.
    state: watch::Receiver<ConnectionState>,
    /// The engine, until `start()` hands it to its task.
    engine: Option<Engine>,
    /// Engine task handle.
    task: Option<JoinHandle<Result<()>>>,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Start the heartbeat; the first beat is sent immediately.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyStarted` if called more than once.
    pub fn start(&mut self) -> Result<()> {
        let mut engine = self.engine.take().ok_or(BeatwireError::AlreadyStarted)?;
        engine.begin();
        self.task = Some(tokio::spawn(engine.run()));
        Ok(())
    }

    /// Queue a call for the next beat.
    ///
    /// A call queued earlier and not yet sent is replaced and resolves with
    /// `CallError::Superseded`. A name or argument over the part size limit
    /// is refused with `CallError::TooLarge` and leaves the queue untouched.
    pub fn invoke(&self, function: &str, argument: &str) -> PendingReply {
        let max = DEFAULT_MAX_PART_SIZE as usize;
        let size = function.len().max(argument.len());
        if size > max {
            tracing::warn!("Refusing call {:?}: {} byte part", function, size);
            return PendingReply::failed(CallError::TooLarge { size, max });
        }

        self.slot.put(function, argument)
    }

    /// Queue a call and run `on_complete` with its value.
    ///
    /// `on_complete` is not run if the call fails. Must be called from
    /// within a tokio runtime.
    pub fn invoke_with<F>(&self, function: &str, argument: &str, on_complete: F)
    where
        F: FnOnce(String) + Send + 'static,
    {
        let reply = self.invoke(function, argument);
        let function = function.to_string();

        tokio::spawn(async move {
            match reply.await {
                Ok(value) => on_complete(value),
                Err(e @ CallError::Remote(_)) => {
                    tracing::warn!("Call {:?} failed: {}", function, e)
                }
                Err(e) => tracing::debug!("Call {:?} produced no value: {}", function, e),
            }
        });
    }

    /// Queue a call and wait for its outcome.
    pub async fn call(&self, function: &str, argument: &str) -> CallResult {
        self.invoke(function, argument).await
    }

    /// Check if a call is waiting for the next beat.
    pub fn has_pending_call(&self) -> bool {
        self.slot.is_occupied()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Run the shutdown handshake and wait for it to finish.
    ///
    /// Calls in flight resolve with `CallError::Stopped`.
    ///
    /// # Errors
    ///
    /// - `NotRunning` if the client was never started or already failed
    /// - `ShutdownTimeout` if the peer does not answer with `STOPPED` in time
    pub async fn stop(&self) -> Result<()> {
        match self.state() {
            ConnectionState::Stopped => return Ok(()),
            ConnectionState::Init | ConnectionState::Failed => {
                return Err(BeatwireError::NotRunning)
            }
            ConnectionState::Running | ConnectionState::Stopping => {}
        }

        let (tx, rx) = oneshot::channel();
        self.control
            .send(Control::Stop(tx))
            .map_err(|_| BeatwireError::NotRunning)?;

        match rx.await {
            Ok(result) => result,
            // The engine ended before it saw the request.
            Err(_) if self.state() == ConnectionState::Stopped => Ok(()),
            Err(_) => Err(BeatwireError::ConnectionClosed),
        }
    }

    /// Wait until the connection ends and return how it ended.
    ///
    /// Returns `Ok(())` after a completed stop handshake and the fatal
    /// error otherwise.
    pub async fn wait(self) -> Result<()> {
        let Client { control, task, .. } = self;
        let task = task.ok_or(BeatwireError::NotRunning)?;

        let result = task.await?;
        drop(control);
        result
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state())
            .field("has_pending_call", &self.has_pending_call())
            .finish()
    }
}
