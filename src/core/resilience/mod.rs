//! Resilience primitives wrapped around the directory gateway
//!
//! - `circuit_breaker` — trips after repeated availability failures and
//!   fails fast while open
//! - `retry` — bounded exponential backoff, idempotent reads only

mod circuit_breaker;
mod retry;
mod types;

pub use circuit_breaker::CircuitBreaker;
pub use retry::RetryPolicy;
pub use types::{CircuitBreakerConfig, CircuitState, RetryConfig};
