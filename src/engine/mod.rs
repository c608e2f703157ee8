//! Heartbeat engine - the beat/reply cycle and the shutdown handshake.
//!
//! One engine task owns a connection. It waits on exactly three kinds of
//! events in a single `select!`:
//! - control requests from the [`Client`](crate::Client) (stop)
//! - inbound messages from the [`Channel`]
//! - expiry of the reply timer (RUNNING) or the shutdown timer (STOPPING)
//!
//! Every inbound message goes through [`Engine::dispatch`], which routes it
//! by [`ConnectionState`]. Steady-state reply handling and the shutdown
//! handshake therefore never see the same message.
//!
//! Exactly one beat is in flight at a time: the next beat is only sent from
//! the reply handler, after the previous reply was processed.

mod pending;
mod state;
mod timer;

pub use pending::{CallResult, Completion, PendingCall, PendingReply, PendingSlot};
pub use state::ConnectionState;
pub use timer::LivenessTimer;

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};

use crate::config::{ClientConfig, LivenessAction};
use crate::error::{BeatwireError, CallError, Result};
use crate::protocol::{beat_message, is_stopped, Message, Reply, STOP};
use crate::transport::Channel;

/// Requests from the client handle to the engine task.
#[derive(Debug)]
pub(crate) enum Control {
    /// Begin the shutdown handshake; resolved when it ends.
    Stop(oneshot::Sender<Result<()>>),
}

/// Sending half of the control queue.
pub(crate) type ControlSender = mpsc::UnboundedSender<Control>;

/// What the run loop does after handling one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stopped,
    Detached,
}

/// The completion captured when a call's beat is sent.
#[derive(Debug)]
struct AwaitedResponse {
    function: String,
    completion: Completion,
}

/// Connection-scoped heartbeat state machine.
pub(crate) struct Engine {
    channel: Channel,
    timeout: Duration,
    debug: bool,
    announce_stop: bool,
    stop_announced: bool,
    liveness_action: LivenessAction,
    slot: PendingSlot,
    awaited: Option<AwaitedResponse>,
    liveness: LivenessTimer,
    shutdown: LivenessTimer,
    stop_waiters: Vec<oneshot::Sender<Result<()>>>,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    control_rx: mpsc::UnboundedReceiver<Control>,
    beats: u64,
}

impl Engine {
    /// Create an engine in the INIT state.
    pub(crate) fn new(
        channel: Channel,
        config: &ClientConfig,
        liveness_action: LivenessAction,
        slot: PendingSlot,
    ) -> (Self, ControlSender, watch::Receiver<ConnectionState>) {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Init);

        let engine = Self {
            channel,
            timeout: config.timeout(),
            debug: config.debug,
            announce_stop: config.announce_stop,
            stop_announced: false,
            liveness_action,
            slot,
            awaited: None,
            liveness: LivenessTimer::new(),
            shutdown: LivenessTimer::new(),
            stop_waiters: Vec::new(),
            state: ConnectionState::Init,
            state_tx,
            control_rx,
            beats: 0,
        };

        (engine, control_tx, state_rx)
    }

    /// Publish RUNNING before the task is polled, so `stop()` is accepted
    /// right after `start()`. No-op once started.
    pub(crate) fn begin(&mut self) {
        if self.state == ConnectionState::Init {
            self.transition(ConnectionState::Running);
        }
    }

    /// Run the connection until it stops, fails, or the client goes away.
    pub(crate) async fn run(mut self) -> Result<()> {
        self.begin();
        if let Err(e) = self.beat().await {
            return self.fail(e).await;
        }

        loop {
            let step = tokio::select! {
                biased;

                control = self.control_rx.recv() => match control {
                    Some(control) => self.on_control(control).await,
                    None => Ok(Flow::Detached),
                },
                inbound = self.channel.recv() => match inbound {
                    Some(message) => self.dispatch(message).await,
                    None => Err(BeatwireError::ConnectionClosed),
                },
                _ = self.liveness.expired() => Err(BeatwireError::LivenessTimeout(self.timeout)),
                _ = self.shutdown.expired() => Err(BeatwireError::ShutdownTimeout(self.timeout)),
            };

            match step {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stopped) => return self.finish().await,
                Ok(Flow::Detached) => return self.detach().await,
                Err(e) => return self.fail(e).await,
            }
        }
    }

    /// Route an inbound message by connection state.
    async fn dispatch(&mut self, message: Message) -> Result<Flow> {
        match self.state {
            ConnectionState::Running => self.on_reply(message).await,
            ConnectionState::Stopping => self.on_shutdown_message(message).await,
            state => {
                tracing::debug!("Dropping message received while {}", state);
                Ok(Flow::Continue)
            }
        }
    }

    /// Send the next beat, attaching the pending call if there is one.
    async fn beat(&mut self) -> Result<()> {
        let message = match self.slot.take() {
            Some(call) => {
                let message = beat_message(Some((&call.function, &call.argument)));
                self.awaited = Some(AwaitedResponse {
                    function: call.function,
                    completion: call.completion,
                });
                message
            }
            None => beat_message(None),
        };

        self.beats += 1;
        if self.debug {
            tracing::debug!("Sending beat {:04} ({} parts)", self.beats, message.len());
        }

        self.channel.send(message).await?;
        self.liveness.arm(self.timeout);
        Ok(())
    }

    /// Steady-state reply handling.
    async fn on_reply(&mut self, message: Message) -> Result<Flow> {
        self.liveness.cancel();

        let text = message.text();
        if self.debug {
            tracing::debug!("Received {:?} ({:04})", text, self.beats);
        }

        match (Reply::parse(&text), self.awaited.take()) {
            (Reply::Plain, None) => {}
            (Reply::Plain, Some(awaited)) => {
                tracing::warn!(
                    "Call {:?} registered but no payload returned",
                    awaited.function
                );
                awaited.completion.reject(CallError::NoPayload);
            }
            (Reply::Value(body) | Reply::Error(body), None) => {
                return Err(BeatwireError::UnhandledPayload(body));
            }
            (Reply::Error(description), Some(awaited)) => {
                tracing::warn!("Remote error for {:?}: {}", awaited.function, description);
                awaited.completion.reject(CallError::Remote(description));
            }
            (Reply::Value(value), Some(awaited)) => awaited.completion.complete(value),
        }

        self.beat().await?;
        Ok(Flow::Continue)
    }

    /// Shutdown handshake handling: only `STOPPED` matters.
    async fn on_shutdown_message(&mut self, message: Message) -> Result<Flow> {
        if !is_stopped(&message) {
            tracing::debug!("Ignoring {:?} while stopping", message.text());
            return Ok(Flow::Continue);
        }

        self.shutdown.cancel();
        // STOP goes out once per handshake.
        if !self.stop_announced {
            // The peer may close right after STOPPED; the handshake is complete.
            if let Err(e) = self.channel.send(STOP).await {
                tracing::debug!("Peer gone before final STOP: {}", e);
            }
        }
        self.transition(ConnectionState::Stopped);
        Ok(Flow::Stopped)
    }

    async fn on_control(&mut self, control: Control) -> Result<Flow> {
        let Control::Stop(waiter) = control;

        match self.state {
            ConnectionState::Running => {
                self.liveness.cancel();
                self.transition(ConnectionState::Stopping);

                if let Some(awaited) = self.awaited.take() {
                    awaited.completion.reject(CallError::Stopped);
                }
                self.slot.close(CallError::Stopped);

                self.stop_waiters.push(waiter);
                self.shutdown.arm(self.timeout);
                tracing::info!("Stopping after {} beats", self.beats);

                if self.announce_stop {
                    self.channel.send(STOP).await?;
                    self.stop_announced = true;
                }
            }
            ConnectionState::Stopping => self.stop_waiters.push(waiter),
            _ => {
                let _ = waiter.send(Err(BeatwireError::NotRunning));
            }
        }

        Ok(Flow::Continue)
    }

    /// Terminal success: flush `STOP`, then release the stop waiters.
    async fn finish(self) -> Result<()> {
        let Engine {
            channel,
            stop_waiters,
            beats,
            ..
        } = self;

        if let Err(e) = channel.close().await {
            tracing::warn!("Error closing channel after stop: {}", e);
        }
        tracing::info!("Connection stopped after {} beats", beats);

        for waiter in stop_waiters {
            let _ = waiter.send(Ok(()));
        }
        Ok(())
    }

    /// The client handle was dropped without stopping.
    async fn detach(mut self) -> Result<()> {
        tracing::debug!("Client dropped; closing connection");
        self.release_calls(CallError::ConnectionLost);
        self.channel.close_with_linger(Duration::ZERO).await
    }

    /// Terminal failure: close the channel, fail every outstanding call.
    async fn fail(mut self, error: BeatwireError) -> Result<()> {
        let was_running = self.state == ConnectionState::Running;

        self.liveness.cancel();
        self.shutdown.cancel();
        if !self.state.is_terminal() {
            self.transition(ConnectionState::Failed);
        }
        self.release_calls(CallError::ConnectionLost);

        let Engine {
            channel,
            liveness_action,
            stop_waiters,
            ..
        } = self;

        if let Err(e) = channel.close_with_linger(Duration::ZERO).await {
            tracing::debug!("Error closing failed channel: {}", e);
        }

        if was_running && error.is_liveness_failure() {
            liveness_action.run(&error);
        } else {
            tracing::error!("Connection failed: {}", error);
        }

        for waiter in stop_waiters {
            let _ = waiter.send(Err(replicate(&error)));
        }
        Err(error)
    }

    fn release_calls(&mut self, error: CallError) {
        if let Some(awaited) = self.awaited.take() {
            awaited.completion.reject(error.clone());
        }
        self.slot.close(error);
    }

    fn transition(&mut self, next: ConnectionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!("Connection {} -> {}", self.state, next);
        self.state = next;
        self.state_tx.send_replace(next);
    }
}

/// Copy of a fatal engine error for stop waiters.
fn replicate(error: &BeatwireError) -> BeatwireError {
    match error {
        BeatwireError::LivenessTimeout(d) => BeatwireError::LivenessTimeout(*d),
        BeatwireError::ShutdownTimeout(d) => BeatwireError::ShutdownTimeout(*d),
        BeatwireError::UnhandledPayload(body) => BeatwireError::UnhandledPayload(body.clone()),
        BeatwireError::Protocol(msg) => BeatwireError::Protocol(msg.clone()),
        _ => BeatwireError::ConnectionClosed,
    }
}
