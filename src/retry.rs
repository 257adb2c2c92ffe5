//! Retry logic with exponential backoff
//!
//! Provides retry policies for transient failures while fetching the price
//! list and the workflow metadata. The cost engine never retries.

use crate::error::{IsRetryable, Result, WfcostError};
use std::time::Duration;
use tracing::{info, warn};

/// Retry policy trait
#[allow(async_fn_in_trait)]
pub trait RetryPolicy: Send + Sync {
    /// Execute a function with retry logic
    async fn execute_with_retry<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: std::future::Future<Output = Result<T>> + Send;
}

/// Exponential backoff retry policy
pub struct ExponentialBackoffPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
}

impl ExponentialBackoffPolicy {
    /// Create a new exponential backoff policy
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.1,
        }
    }

    /// Create default policy (3 attempts)
    pub fn default_policy() -> Self {
        Self::new(3)
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Calculate backoff delay for given attempt number
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let exponential = self.initial_delay.as_millis() as f64 * 2f64.powi(attempt as i32);
        let delay_ms = exponential.min(self.max_delay.as_millis() as f64);

        // Add jitter to prevent thundering herd
        let jitter = delay_ms * self.jitter_factor * fastrand::f64();
        Duration::from_millis((delay_ms + jitter) as u64)
    }
}

impl RetryPolicy for ExponentialBackoffPolicy {
    async fn execute_with_retry<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: std::future::Future<Output = Result<T>> + Send,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!("Operation succeeded after {} retries", attempt);
                    }
                    return Ok(result);
                }
                Err(e) => {
                    if !e.is_retryable() {
                        warn!("Non-retryable error, aborting: {}", e);
                        return Err(e);
                    }

                    if attempt + 1 >= self.max_attempts {
                        warn!("Max retries ({}) reached", self.max_attempts);
                        return Err(WfcostError::Retryable {
                            attempt: attempt + 1,
                            max_attempts: self.max_attempts,
                            reason: e.to_string(),
                            source: Some(Box::new(e)),
                        });
                    }

                    let backoff = self.calculate_backoff(attempt);
                    warn!(
                        "Retryable error (attempt {}/{}), retrying in {:?}: {}",
                        attempt + 1,
                        self.max_attempts,
                        backoff,
                        e
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = ExponentialBackoffPolicy::new(10);
        let first = policy.calculate_backoff(0);
        let third = policy.calculate_backoff(2);
        assert!(first >= Duration::from_millis(100));
        assert!(first < Duration::from_millis(111));
        assert!(third >= Duration::from_millis(400));
        assert!(policy.calculate_backoff(20) <= Duration::from_millis(33_000));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(ExponentialBackoffPolicy::new(0).max_attempts(), 1);
        assert_eq!(ExponentialBackoffPolicy::default_policy().max_attempts(), 3);
    }
}
