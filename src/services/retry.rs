//! Bounded retry with exponential backoff for lock contention

use std::future::Future;
use std::time::Duration;

use crate::{config::BookingConfig, error::AppResult};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total tries, first one included
    attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &BookingConfig) -> Self {
        Self::new(
            config.lock_retry_attempts,
            Duration::from_millis(config.lock_retry_base_delay_ms),
        )
    }

    /// Delay before retry number `retry` (1-based)
    fn backoff(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << (retry - 1).min(16))
    }

    /// Run `op` again while it fails with a transient error, up to the attempt budget
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e) if e.is_transient() && attempt < self.attempts => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Lock contention, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
