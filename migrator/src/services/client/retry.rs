//! Bounded exponential backoff for dashboard requests

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::errors::ApiError;

/// Retry policy for transient API failures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    /// Ceiling for both computed delays and server-provided Retry-After
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (1-based) when the server gives no hint
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let mut delay_ms = self.initial_delay_ms.min(self.max_delay_ms);
        for _ in 1..retry {
            delay_ms = self.next_delay_ms(delay_ms);
        }
        Duration::from_millis(delay_ms)
    }

    /// Worst-case time spent sleeping before giving up
    pub fn max_total_delay(&self) -> Duration {
        (1..=self.max_retries)
            .map(|retry| self.delay_for_retry(retry))
            .sum()
    }

    fn next_delay_ms(&self, current_ms: u64) -> u64 {
        ((current_ms as f64 * self.backoff_multiplier) as u64).min(self.max_delay_ms)
    }
}

/// Run `attempt_fn` until it succeeds, fails permanently, or the retry budget
/// is spent. Rate-limit responses wait for the server's Retry-After, capped
/// at `max_delay_ms`.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    mut attempt_fn: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut retry = 0;
    let mut delay_ms = config.initial_delay_ms.min(config.max_delay_ms);

    loop {
        match attempt_fn().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && retry < config.max_retries => {
                let wait_ms = error
                    .retry_after_ms()
                    .map(|ms| ms.min(config.max_delay_ms))
                    .unwrap_or(delay_ms);
                retry += 1;
                warn!(
                    "[Api] {} failed ({}), retrying in {}ms (attempt {}/{})",
                    operation, error, wait_ms, retry, config.max_retries
                );
                tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                delay_ms = config.next_delay_ms(delay_ms);
            }
            Err(error) => return Err(error),
        }
    }
}
