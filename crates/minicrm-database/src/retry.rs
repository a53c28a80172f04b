//! Exponential-backoff retries for transient database failures.

use crate::error::{DatabaseError, ErrorKind, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each following one
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryConfig {
    /// Delay slept after the failed attempt numbered `attempt` (from 0).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        1u32.checked_shl(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }
}

/// Blocks the calling thread between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Clone)]
pub struct RetryManager {
    config: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryManager {
    pub fn new(config: RetryConfig) -> Self {
        Self::with_sleeper(config, Arc::new(ThreadSleeper))
    }

    pub fn with_sleeper(config: RetryConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { config, sleeper }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation`, retrying it while it fails with a transient error.
    ///
    /// Makes at most `max_retries + 1` attempts. Permanent errors are returned
    /// as-is on first sight. When every attempt failed transiently the last
    /// error comes back wrapped in [`DatabaseError::RetriesExhausted`].
    pub fn retry_on_error<T, F>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 0u32;

        loop {
            let err = match operation() {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if err.kind() == ErrorKind::Permanent {
                return Err(err);
            }

            if attempt >= self.config.max_retries {
                return Err(DatabaseError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: Box::new(err),
                });
            }

            let delay = self.config.delay_for(attempt);
            warn!(
                attempt = attempt + 1,
                max_retries = self.config.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient database error, retrying"
            );
            self.sleeper.sleep(delay);
            attempt += 1;
        }
    }
}

impl Default for RetryManager {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl std::fmt::Debug for RetryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
