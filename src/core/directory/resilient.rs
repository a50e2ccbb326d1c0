//! Resilience decorator for directory backends
//!
//! Wraps every call with a timeout and a circuit breaker, and adds bounded
//! retry for the idempotent reads only. `authenticate` is never retried:
//! replaying a password attempt against a lockout-counting backend amplifies
//! lockout risk.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::Directory;
use crate::config::ResilienceConfig;
use crate::core::resilience::{CircuitBreaker, CircuitState, RetryPolicy};
use crate::core::types::{AuthenticatedUser, Credentials};
use crate::error::{AuthError, Result};

/// Timeout + circuit breaker + bounded-retry wrapper around a [`Directory`]
pub struct ResilientDirectory {
    inner: Arc<dyn Directory>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl ResilientDirectory {
    pub fn new(inner: Arc<dyn Directory>, config: &ResilienceConfig) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new(config.breaker()),
            retry: RetryPolicy::new(config.retry()),
            call_timeout: config.call_timeout(),
        }
    }

    /// Current breaker state, exposed for health reporting
    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// One guarded attempt: timeout inside the breaker
    async fn once<R>(&self, fut: impl std::future::Future<Output = Result<R>>) -> Result<R> {
        self.breaker
            .call(async {
                match tokio::time::timeout(self.call_timeout, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(AuthError::DirectoryUnavailable(format!(
                        "directory call timed out after {:?}",
                        self.call_timeout
                    ))
                    .into()),
                }
            })
            .await
    }
}

#[async_trait]
impl Directory for ResilientDirectory {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthenticatedUser> {
        // single attempt by design
        self.once(self.inner.authenticate(credentials)).await
    }

    async fn find_by_username(&self, username: &str) -> Result<AuthenticatedUser> {
        self.retry
            .call(|| self.once(self.inner.find_by_username(username)))
            .await
    }

    async fn is_available(&self) -> bool {
        let probe = self
            .retry
            .call(|| {
                self.once(async {
                    if self.inner.is_available().await {
                        Ok(())
                    } else {
                        Err(AuthError::DirectoryUnavailable(
                            "health probe failed".to_string(),
                        )
                        .into())
                    }
                })
            })
            .await;

        if probe.is_err() {
            debug!("directory health probe failed after retries");
        }
        probe.is_ok()
    }
}
