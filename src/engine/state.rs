//! Connection lifecycle states.
//!
//! ```text
//! Init ──start()──► Running ──stop()──► Stopping ──"STOPPED"──► Stopped
//!                      │                    │
//!                      └─ liveness timeout ─┴─ shutdown timeout ─► Failed
//! ```

use std::fmt;

/// Lifecycle state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, no beat sent yet.
    Init,
    /// Heartbeat cycle active.
    Running,
    /// Waiting for the peer's `STOPPED`.
    Stopping,
    /// Handshake completed.
    Stopped,
    /// Ended by a fatal error.
    Failed,
}

impl ConnectionState {
    /// Check if no further transitions can happen.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Stopped | ConnectionState::Failed)
    }

    /// Check if a transition to `next` is allowed.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Init, Running)
                | (Running, Stopping)
                | (Running, Failed)
                | (Stopping, Stopped)
                | (Stopping, Failed)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Init => "init",
            ConnectionState::Running => "running",
            ConnectionState::Stopping => "stopping",
            ConnectionState::Stopped => "stopped",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}
