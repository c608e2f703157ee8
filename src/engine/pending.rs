//! Single-slot queue for the call attached to the next beat.
//!
//! The slot holds at most one [`PendingCall`]. Queuing a call while another
//! one is waiting replaces it: the replaced call is never transmitted and
//! its reply resolves with [`CallError::Superseded`].

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::CallError;

/// Outcome delivered to the caller of one remote call.
pub type CallResult = std::result::Result<String, CallError>;

/// Sending half of a call's completion.
#[derive(Debug)]
pub struct Completion {
    tx: oneshot::Sender<CallResult>,
}

impl Completion {
    /// Create a completion and the reply future it resolves.
    pub fn channel() -> (Self, PendingReply) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, PendingReply { rx })
    }

    /// Deliver the function's return value.
    pub fn complete(self, value: String) {
        self.resolve(Ok(value));
    }

    /// Deliver a failure instead of a value.
    pub fn reject(self, error: CallError) {
        self.resolve(Err(error));
    }

    fn resolve(self, result: CallResult) {
        // The caller may have dropped its PendingReply; nothing to notify.
        let _ = self.tx.send(result);
    }
}

/// Future resolving exactly once with a call's outcome.
#[derive(Debug)]
pub struct PendingReply {
    rx: oneshot::Receiver<CallResult>,
}

impl PendingReply {
    /// A reply that is already resolved with `error`.
    pub(crate) fn failed(error: CallError) -> Self {
        let (completion, reply) = Completion::channel();
        completion.reject(error);
        reply
    }
}

impl Future for PendingReply {
    type Output = CallResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(CallError::ConnectionLost)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// One remote invocation waiting for the next beat.
#[derive(Debug)]
pub struct PendingCall {
    /// Name of the remote function.
    pub function: String,
    /// Argument passed to the function.
    pub argument: String,
    /// Where the outcome goes.
    pub completion: Completion,
}

#[derive(Debug, Default)]
struct SlotState {
    call: Option<PendingCall>,
    closed: bool,
}

/// Shared slot written by the call façade and drained by the engine.
#[derive(Debug, Clone, Default)]
pub struct PendingSlot {
    inner: Arc<Mutex<SlotState>>,
}

impl PendingSlot {
    /// Create an empty, open slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a call for the next beat and return its reply.
    ///
    /// Replaces any call still waiting in the slot. Once the slot is closed
    /// the reply resolves with `ConnectionLost` immediately.
    pub fn put(&self, function: &str, argument: &str) -> PendingReply {
        let (completion, reply) = Completion::channel();
        let call = PendingCall {
            function: function.to_string(),
            argument: argument.to_string(),
            completion,
        };

        let outcome = {
            let mut state = self.lock();
            if state.closed {
                Err(call)
            } else {
                Ok(state.call.replace(call))
            }
        };

        match outcome {
            Err(refused) => refused.completion.reject(CallError::ConnectionLost),
            Ok(Some(replaced)) => {
                tracing::debug!(
                    "Pending call {:?} replaced before it was sent",
                    replaced.function
                );
                replaced.completion.reject(CallError::Superseded);
            }
            Ok(None) => {}
        }

        reply
    }

    /// Remove the waiting call, if any.
    pub fn take(&self) -> Option<PendingCall> {
        self.lock().call.take()
    }

    /// Check if a call is waiting.
    pub fn is_occupied(&self) -> bool {
        self.lock().call.is_some()
    }

    /// Refuse further calls and resolve the waiting one with `error`.
    pub fn close(&self, error: CallError) {
        let waiting = {
            let mut state = self.lock();
            state.closed = true;
            state.call.take()
        };
        if let Some(call) = waiting {
            call.completion.reject(error);
        }
    }

    /// Check if the slot was closed.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        // A panic while holding the lock cannot leave SlotState half-updated.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
