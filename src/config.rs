//! Client configuration.
//!
//! [`ClientConfig`] holds the serializable options; the liveness-failure
//! action is code, so it lives in [`LivenessAction`] and is set through the
//! [`ClientBuilder`](crate::ClientBuilder).
//!
//! # Example
//!
//! ```
//! use beatwire::ClientConfig;
//!
//! let config = ClientConfig::from_json(r#"{ "port": 4242, "timeout_ms": 250 }"#).unwrap();
//! assert_eq!(config.address(), "127.0.0.1:4242");
//! assert_eq!(config.timeout().as_millis(), 250);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{BeatwireError, Result};

/// Default peer host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default peer port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default time to wait for a reply to a beat, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Serializable connection options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Peer host name or IP.
    pub host: String,
    /// Peer port.
    pub port: u16,
    /// Reply window for each beat, and for the stop handshake.
    pub timeout_ms: u64,
    /// Log every beat and reply.
    pub debug: bool,
    /// Send `STOP` as soon as `stop()` is called.
    pub announce_stop: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            debug: false,
            announce_stop: false,
        }
    }
}

impl ClientConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ClientConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// `host:port` for connecting.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reply window as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Check option values.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(BeatwireError::Config("host must not be empty".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(BeatwireError::Config(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Callback run once when the connection fails its liveness check.
pub type LivenessHandler = Arc<dyn Fn(&BeatwireError) + Send + Sync>;

/// What to do when a beat goes unanswered or the transport drops.
///
/// The connection is closed either way; automatic reconnection is left to
/// the handler's owner.
#[derive(Clone, Default)]
pub enum LivenessAction {
    /// Log the failure and surface it from `Client::wait`.
    #[default]
    Fatal,
    /// Hand the failure to a callback, then surface it from `Client::wait`.
    Notify(LivenessHandler),
}

impl LivenessAction {
    /// Run the action for `error`.
    pub(crate) fn run(&self, error: &BeatwireError) {
        match self {
            LivenessAction::Fatal => tracing::error!("Liveness failure: {}", error),
            LivenessAction::Notify(handler) => {
                tracing::warn!("Liveness failure: {}", error);
                handler(error);
            }
        }
    }
}

impl fmt::Debug for LivenessAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LivenessAction::Fatal => f.write_str("Fatal"),
            LivenessAction::Notify(_) => f.write_str("Notify(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.address(), "127.0.0.1:3000");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert!(!config.debug);
        assert!(!config.announce_stop);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = ClientConfig::from_json(r#"{ "host": "10.0.0.2", "debug": true }"#).unwrap();
        assert_eq!(config.host, "10.0.0.2");
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.debug);
    }

    #[test]
    fn test_from_json_rejects_unknown_field() {
        let err = ClientConfig::from_json(r#"{ "timeout": 5 }"#).unwrap_err();
        assert!(matches!(err, BeatwireError::Json(_)));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let err = ClientConfig::from_json(r#"{ "timeout_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, BeatwireError::Config(_)));
    }

    #[test]
    fn test_validate_empty_host() {
        let config = ClientConfig {
            host: "  ".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(config.validate(), Err(BeatwireError::Config(_))));
    }

    #[test]
    fn test_notify_action_runs_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let action = LivenessAction::Notify(Arc::new(move |_: &BeatwireError| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        action.run(&BeatwireError::ConnectionClosed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(format!("{:?}", action), "Notify(..)");
    }
}
