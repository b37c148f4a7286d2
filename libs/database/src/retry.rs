//! Startup retry for backend connections.
//!
//! Connecting is the one operation that races service orchestration: the
//! database container may accept TCP a few seconds after the worker starts.
//! These helpers retry with doubling delays so a slow backend delays startup
//! instead of failing it.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Tuning for [`retry_with_backoff`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Ceiling for the doubled delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Randomize each delay to 50-100% of its value.
    pub jitter: bool,
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay_ms: u64) -> Self {
        self.initial_delay_ms = delay_ms;
        self
    }

    pub fn with_max_delay(mut self, delay_ms: u64) -> Self {
        self.max_delay_ms = delay_ms;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            jitter: true,
        }
    }
}

/// Run `operation` until it succeeds or the retry budget is spent.
///
/// Makes `max_retries + 1` attempts in total. The error of the final attempt
/// is returned unchanged.
pub async fn retry_with_backoff<F, Fut, T, E>(mut operation: F, config: RetryConfig) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay_ms = config.initial_delay_ms;

    for attempt in 1..=config.max_retries {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("Connection attempt {} succeeded", attempt);
                }
                return Ok(value);
            }
            Err(e) => {
                let wait = if config.jitter {
                    jittered(delay_ms)
                } else {
                    delay_ms
                };
                debug!(
                    "Connection attempt {}/{} failed: {}. Next try in {}ms",
                    attempt,
                    config.max_retries + 1,
                    e,
                    wait
                );
                tokio::time::sleep(Duration::from_millis(wait)).await;
                delay_ms = delay_ms.saturating_mul(2).min(config.max_delay_ms);
            }
        }
    }

    operation().await.inspect_err(|e| {
        warn!(
            "Giving up after {} connection attempts: {}",
            config.max_retries + 1,
            e
        );
    })
}

/// [`retry_with_backoff`] with the default budget: 3 retries from 100ms.
pub async fn retry<F, Fut, T, E>(operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_with_backoff(operation, RetryConfig::default()).await
}

/// Scale a delay to a pseudo-random 50-100% of itself.
///
/// Seeded from the clock via `RandomState`; good enough to spread out a
/// thundering herd without pulling in a rand dependency.
fn jittered(delay_ms: u64) -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::BuildHasher;

    let roll = RandomState::new().hash_one(std::time::Instant::now()) % 50;
    delay_ms / 2 + delay_ms * roll / 100
}
