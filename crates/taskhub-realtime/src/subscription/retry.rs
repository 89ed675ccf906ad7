//! Retry policy for the subscribe flow.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use taskhub_core::config::RegistryConfig;

/// How many times to try and how long to wait after each failed attempt.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Arc<dyn Fn(u32) -> Duration + Send + Sync>,
}

impl RetryPolicy {
    /// Custom policy; `backoff(n)` is the wait after failed attempt `n` (1-based).
    pub fn new(max_attempts: u32, backoff: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Arc::new(backoff),
        }
    }

    /// Waits `attempt * step` after each failed attempt.
    pub fn linear(max_attempts: u32, step: Duration) -> Self {
        Self::new(max_attempts, move |attempt| step * attempt)
    }

    /// Policy from the registry settings (3 attempts, 1000 ms step by default).
    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::linear(
            config.retry_attempts,
            Duration::from_millis(config.retry_delay_ms),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after failed attempt `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        (self.backoff)(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(3, Duration::from_millis(1000))
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

/// Source of delays, swappable in tests.
#[async_trait]
pub trait Sleeper: Send + Sync + fmt::Debug {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
