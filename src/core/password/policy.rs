//! Password complexity policy
//!
//! A simple predicate check: violations are collected and reported together
//! rather than failing on the first one.

use crate::config::PasswordConfig;
use crate::error::PasswordError;

/// Validates candidate passwords against the configured complexity rules
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    config: PasswordConfig,
}

impl PasswordPolicy {
    pub fn new(config: PasswordConfig) -> Self {
        Self { config }
    }

    /// Check `candidate` against the policy, aggregating all violations
    pub fn validate(&self, candidate: &str) -> Result<(), PasswordError> {
        if candidate.is_empty() {
            return Err(PasswordError::ValidationFailed(vec![
                "password cannot be empty".to_string(),
            ]));
        }

        let mut violations = Vec::new();

        if candidate.chars().count() < self.config.min_length {
            violations.push(format!(
                "password must be at least {} characters",
                self.config.min_length
            ));
        }
        if candidate.chars().count() > self.config.max_length {
            violations.push(format!(
                "password must not exceed {} characters",
                self.config.max_length
            ));
        }
        if self.config.require_uppercase && !candidate.chars().any(|c| c.is_ascii_uppercase()) {
            violations.push("password must contain at least one uppercase letter".to_string());
        }
        if self.config.require_lowercase && !candidate.chars().any(|c| c.is_ascii_lowercase()) {
            violations.push("password must contain at least one lowercase letter".to_string());
        }
        if self.config.require_digit && !candidate.chars().any(|c| c.is_ascii_digit()) {
            violations.push("password must contain at least one digit".to_string());
        }
        if self.config.require_special && !candidate.chars().any(is_special) {
            violations.push("password must contain at least one special character".to_string());
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(PasswordError::ValidationFailed(violations))
        }
    }
}

fn is_special(c: char) -> bool {
    r##"!@#$%^&*()_+-=[]{};':"\|,.<>/?"##.contains(c)
}
