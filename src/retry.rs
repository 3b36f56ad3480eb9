//! Exponential backoff for idempotent backend reads.
//!
//! Only the subsection lookup goes through here. Mutations are never retried:
//! a failed save is re-run wholesale by the caller.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Backoff schedule for a retried operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first one)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Preset for reading a subsection (3 attempts, 500ms then 1s).
    pub fn read_request() -> Self {
        Self::new(3, Duration::from_millis(500)).with_max_delay(Duration::from_secs(2))
    }

    /// Delay before attempt `attempt` (0-indexed; the first attempt never waits).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = self.backoff_multiplier.powi(attempt as i32 - 1);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        Duration::from_millis(millis as u64).min(self.max_delay)
    }

    /// Run `operation` until it succeeds, attempts run out, or `should_retry`
    /// rejects the error. Returns the last error on failure.
    pub async fn run<T, E, F, Fut, P>(
        &self,
        operation_name: &str,
        mut operation: F,
        should_retry: P,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 0;
        loop {
            let delay = self.delay_before(attempt);
            if !delay.is_zero() {
                debug!(
                    "{}: attempt {}/{} in {:?}",
                    operation_name,
                    attempt + 1,
                    self.max_attempts,
                    delay
                );
                sleep(delay).await;
            }

            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            attempt += 1;
            if attempt >= self.max_attempts || !should_retry(&error) {
                if attempt > 1 {
                    warn!(
                        "{}: giving up after {} attempts: {}",
                        operation_name, attempt, error
                    );
                }
                return Err(error);
            }
            warn!(
                "{}: attempt {}/{} failed ({}), retrying",
                operation_name, attempt, self.max_attempts, error
            );
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::read_request()
    }
}
