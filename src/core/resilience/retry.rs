//! Bounded retry with exponential backoff for idempotent directory reads
//!
//! Only availability failures are retried. Domain rejections are final, and
//! `authenticate` never goes through this path at all: replaying a password
//! attempt against a lockout-counting backend amplifies lockout risk.

use std::time::Duration;
use tracing::{debug, error};

use super::types::RetryConfig;
use crate::error::Result;

/// Retry policy for idempotent reads
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute `f`, retrying availability failures up to the configured
    /// attempt budget
    pub async fn call<F, Fut, R>(&self, mut f: F) -> Result<R>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<R>>,
    {
        let mut attempt = 0;
        let mut delay = self.config.base_delay;

        loop {
            attempt += 1;

            match f().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!(attempt, "retry succeeded");
                    }
                    return Ok(result);
                }
                Err(err) if !err.is_unavailable() => return Err(err),
                Err(err) => {
                    if attempt >= self.config.max_attempts.max(1) {
                        error!(attempt, %err, "giving up after retries");
                        return Err(err);
                    }

                    debug!(attempt, %err, ?delay, "directory read failed, retrying");

                    let actual_delay = if self.config.jitter {
                        let jitter = delay.as_millis() as f64 * 0.1 * (rand::random::<f64>() - 0.5);
                        Duration::from_millis((delay.as_millis() as f64 + jitter).max(0.0) as u64)
                    } else {
                        delay
                    };
                    tokio::time::sleep(actual_delay).await;

                    delay = std::cmp::min(
                        Duration::from_millis(
                            (delay.as_millis() as f64 * self.config.backoff_multiplier) as u64,
                        ),
                        self.config.max_delay,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuthError, Error};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
        })
    }

    #[tokio::test]
    async fn test_first_success_needs_no_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = fast_policy(3)
            .call(|| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::Relaxed);
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_retries_availability_failures_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = fast_policy(3)
            .call(|| {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::Relaxed);
                    if n < 2 {
                        Err(AuthError::DirectoryUnavailable("flaky".to_string()).into())
                    } else {
                        Ok("recovered")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_attempt_budget_is_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<()> = fast_policy(3)
            .call(|| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::Relaxed);
                    Err(AuthError::DirectoryUnavailable("down".to_string()).into())
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_domain_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<()> = fast_policy(5)
            .call(|| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::Relaxed);
                    Err(AuthError::InvalidCredentials("mallory".to_string()).into())
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(Error::Auth(AuthError::InvalidCredentials(_)))
        ));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }
}
