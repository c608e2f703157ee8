//! One-shot cancellable timer used for reply windows.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Instant, Sleep};

/// A single-shot timer that is either armed or idle.
///
/// `expired()` never completes while idle, so it can sit in a `select!`
/// branch permanently.
#[derive(Debug, Default)]
pub struct LivenessTimer {
    deadline: Option<Pin<Box<Sleep>>>,
}

impl LivenessTimer {
    /// Create an idle timer.
    pub fn new() -> Self {
        Self { deadline: None }
    }

    /// Arm the timer to fire after `delay`.
    ///
    /// The timer must be idle; at most one deadline exists at a time.
    pub fn arm(&mut self, delay: Duration) {
        debug_assert!(self.deadline.is_none(), "timer armed twice");
        self.deadline = Some(Box::pin(sleep(delay)));
    }

    /// Disarm the timer. No-op when idle.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Check if the timer is armed.
    #[inline]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the timer will fire, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline.as_ref().map(|s| s.deadline())
    }

    /// Wait until the armed deadline passes, then disarm.
    ///
    /// Cancel-safe: dropping the future leaves the timer armed.
    pub async fn expired(&mut self) {
        match self.deadline.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.deadline = None;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let mut timer = LivenessTimer::new();
        timer.arm(Duration::from_millis(100));
        let start = Instant::now();

        timer.expired().await;

        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let mut timer = LivenessTimer::new();
        timer.arm(Duration::from_millis(50));
        timer.cancel();

        let fired = tokio::time::timeout(Duration::from_secs(1), timer.expired()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_after_cancel() {
        let mut timer = LivenessTimer::new();
        timer.arm(Duration::from_millis(50));
        timer.cancel();
        timer.arm(Duration::from_millis(200));

        let deadline = timer.deadline().unwrap();
        assert!(deadline >= Instant::now() + Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_is_cancel_safe() {
        let mut timer = LivenessTimer::new();
        timer.arm(Duration::from_millis(100));

        let early = tokio::time::timeout(Duration::from_millis(10), timer.expired()).await;
        assert!(early.is_err());
        assert!(timer.is_armed());

        timer.expired().await;
        assert!(!timer.is_armed());
    }
}
