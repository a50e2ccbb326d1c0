//! Resilience settings for directory calls

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::resilience::{CircuitBreakerConfig, RetryConfig};

/// Timeout, circuit-breaker, and retry settings wrapped around every
/// directory call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Per-call timeout in seconds
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    /// Consecutive failures within the window before the circuit opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Successes in half-open state required to close the circuit
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    /// Minimum calls before the failure threshold is considered
    #[serde(default = "default_min_requests")]
    pub min_requests: u32,
    /// Seconds the circuit stays open before probing
    #[serde(default = "default_open_cooldown")]
    pub open_cooldown_secs: u64,
    /// Rolling window for failure counting, in seconds
    #[serde(default = "default_window")]
    pub window_secs: u64,
    /// Retry attempts for idempotent reads
    #[serde(default = "default_max_attempts")]
    pub retry_max_attempts: u32,
    /// Base retry delay in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Maximum retry delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// Exponential backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub retry_backoff_multiplier: f64,
    /// Whether retry delays are jittered
    #[serde(default = "default_true")]
    pub retry_jitter: bool,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout(),
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            min_requests: default_min_requests(),
            open_cooldown_secs: default_open_cooldown(),
            window_secs: default_window(),
            retry_max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_base_delay_ms(),
            retry_max_delay_ms: default_max_delay_ms(),
            retry_backoff_multiplier: default_backoff_multiplier(),
            retry_jitter: true,
        }
    }
}

impl ResilienceConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.call_timeout_secs == 0 {
            return Err("resilience.call_timeout_secs must be non-zero".to_string());
        }
        if self.failure_threshold == 0 {
            return Err("resilience.failure_threshold must be non-zero".to_string());
        }
        if self.retry_backoff_multiplier < 1.0 {
            return Err("resilience.retry_backoff_multiplier must be >= 1.0".to_string());
        }
        Ok(())
    }

    /// Per-call timeout for directory operations
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Runtime circuit breaker settings
    pub fn breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            min_requests: self.min_requests,
            open_cooldown: Duration::from_secs(self.open_cooldown_secs),
            window_size: Duration::from_secs(self.window_secs),
        }
    }

    /// Runtime retry settings for idempotent reads
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry_max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            backoff_multiplier: self.retry_backoff_multiplier,
            jitter: self.retry_jitter,
        }
    }
}

fn default_call_timeout() -> u64 {
    5
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    3
}

fn default_min_requests() -> u32 {
    10
}

fn default_open_cooldown() -> u64 {
    60
}

fn default_window() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    2000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ResilienceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.call_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_breaker_conversion() {
        let config = ResilienceConfig::default();
        let breaker = config.breaker();
        assert_eq!(breaker.failure_threshold, 5);
        assert_eq!(breaker.open_cooldown, Duration::from_secs(60));
    }

    #[test]
    fn test_sub_unity_backoff_rejected() {
        let config = ResilienceConfig {
            retry_backoff_multiplier: 0.5,
            ..ResilienceConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
