//! Core engine modules
//!
//! - `types` — immutable domain values shared across the engine
//! - `tokens` — signing and verification of session token pairs
//! - `directory` — polymorphic identity backends (LDAP, AD, Keycloak)
//! - `resilience` — circuit breaker and bounded retry for directory calls
//! - `session` — per-device refresh sessions and the revocation list
//! - `audit` — fire-and-forget security audit trail
//! - `auth` — the sign-in / sign-out / refresh state machine
//! - `password` — recovery-token lifecycle and password changes

pub mod audit;
pub mod auth;
pub mod directory;
pub mod password;
pub mod resilience;
pub mod session;
pub mod tokens;
pub mod types;
