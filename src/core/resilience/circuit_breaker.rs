//! Circuit breaker guarding the directory backend
//!
//! Only availability failures count against the breaker: a rejected password
//! is a healthy backend answering, and must neither trip the circuit nor be
//! rewritten by it. Domain errors always propagate unchanged.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

use super::types::{CircuitBreakerConfig, CircuitState};
use crate::error::{AuthError, Error, Result};

/// Circuit breaker for directory calls
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<CircuitState>,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    request_count: AtomicU32,
    last_failure_at: Mutex<Option<Instant>>,
    window_start: Mutex<Instant>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            request_count: AtomicU32::new(0),
            last_failure_at: Mutex::new(None),
            window_start: Mutex::new(Instant::now()),
        }
    }

    /// Run `f` under the breaker.
    ///
    /// While open, fails immediately with `DirectoryUnavailable` without
    /// polling the future. The wrapped call's own error is returned as-is.
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: std::future::Future<Output = Result<R>>,
    {
        if !self.can_execute() {
            return Err(AuthError::DirectoryUnavailable("circuit breaker is open".to_string()).into());
        }

        self.request_count.fetch_add(1, Ordering::Relaxed);

        match f.await {
            Ok(result) => {
                self.on_success();
                Ok(result)
            }
            Err(error) => {
                if error.is_unavailable() {
                    self.on_failure();
                } else {
                    // the backend answered; a domain rejection is not an outage
                    self.on_success();
                }
                Err(error)
            }
        }
    }

    /// Current breaker state
    pub fn state(&self) -> CircuitState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Force the breaker back to closed
    pub fn reset(&self) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = CircuitState::Closed;
        self.failure_count.store(0, Ordering::Relaxed);
        self.success_count.store(0, Ordering::Relaxed);
        self.request_count.store(0, Ordering::Relaxed);
        *self.last_failure_at.lock().unwrap_or_else(|p| p.into_inner()) = None;
        *self.window_start.lock().unwrap_or_else(|p| p.into_inner()) = Instant::now();
        debug!("circuit breaker reset");
    }

    fn can_execute(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());

        match *state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let last_failure = *self.last_failure_at.lock().unwrap_or_else(|p| p.into_inner());
                match last_failure {
                    Some(at) if at.elapsed() >= self.config.open_cooldown => {
                        debug!("circuit breaker transitioning open -> half-open");
                        *state = CircuitState::HalfOpen;
                        self.success_count.store(0, Ordering::Relaxed);
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    fn on_success(&self) {
        let successes = self.success_count.fetch_add(1, Ordering::Relaxed) + 1;

        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if *state == CircuitState::HalfOpen && successes >= self.config.success_threshold {
            debug!("circuit breaker transitioning half-open -> closed");
            *state = CircuitState::Closed;
            self.failure_count.store(0, Ordering::Relaxed);
            self.success_count.store(0, Ordering::Relaxed);
        }
    }

    fn on_failure(&self) {
        let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        let requests = self.request_count.load(Ordering::Relaxed);

        *self.last_failure_at.lock().unwrap_or_else(|p| p.into_inner()) = Some(Instant::now());

        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());

        {
            let mut window_start = self.window_start.lock().unwrap_or_else(|p| p.into_inner());
            if window_start.elapsed() >= self.config.window_size {
                *window_start = Instant::now();
                self.failure_count.store(1, Ordering::Relaxed);
                self.request_count.store(1, Ordering::Relaxed);
                return;
            }
        }

        if requests >= self.config.min_requests
            && failures >= self.config.failure_threshold
            && *state != CircuitState::Open
        {
            warn!(failures, requests, "circuit breaker opening");
            *state = CircuitState::Open;
        }

        if *state == CircuitState::HalfOpen {
            debug!("circuit breaker transitioning half-open -> open");
            *state = CircuitState::Open;
        }
    }
}
