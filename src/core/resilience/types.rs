//! Settings and state types for directory-call resilience

use std::time::Duration;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow normally
    Closed,
    /// Requests are rejected without touching the backend
    Open,
    /// A limited number of probe requests are allowed through
    HalfOpen,
}

/// Circuit breaker settings
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failures within the window required to open the circuit
    pub failure_threshold: u32,
    /// Successes in half-open state required to close the circuit
    pub success_threshold: u32,
    /// Minimum calls before the failure threshold is considered
    pub min_requests: u32,
    /// How long the circuit stays open before probing
    pub open_cooldown: Duration,
    /// Rolling window for failure counting
    pub window_size: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            min_requests: 10,
            open_cooldown: Duration::from_secs(60),
            window_size: Duration::from_secs(60),
        }
    }
}

/// Retry settings for idempotent directory reads
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Ceiling for backoff growth
    pub max_delay: Duration,
    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,
    /// Whether delays are jittered
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}
