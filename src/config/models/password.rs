//! Password policy and reset-token configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Password complexity rules and reset-token settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordConfig {
    /// Minimum password length
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    /// Maximum password length
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Require at least one uppercase letter
    #[serde(default = "default_true")]
    pub require_uppercase: bool,
    /// Require at least one lowercase letter
    #[serde(default = "default_true")]
    pub require_lowercase: bool,
    /// Require at least one digit
    #[serde(default = "default_true")]
    pub require_digit: bool,
    /// Require at least one special character
    #[serde(default = "default_true")]
    pub require_special: bool,
    /// Reset token validity in seconds
    #[serde(default = "default_reset_token_ttl")]
    pub reset_token_ttl_secs: u64,
    /// Base URL for reset links handed to the notification sink
    #[serde(default = "default_reset_base_url")]
    pub reset_base_url: String,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            max_length: default_max_length(),
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
            reset_token_ttl_secs: default_reset_token_ttl(),
            reset_base_url: default_reset_base_url(),
        }
    }
}

impl PasswordConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_length == 0 {
            return Err("password.min_length must be non-zero".to_string());
        }
        if self.max_length < self.min_length {
            return Err("password.max_length must be >= min_length".to_string());
        }
        if self.reset_token_ttl_secs == 0 {
            return Err("password.reset_token_ttl_secs must be non-zero".to_string());
        }
        Ok(())
    }

    /// Reset token validity window
    pub fn reset_token_ttl(&self) -> Duration {
        Duration::from_secs(self.reset_token_ttl_secs)
    }
}

fn default_min_length() -> usize {
    8
}

fn default_max_length() -> usize {
    128
}

fn default_reset_token_ttl() -> u64 {
    1800
}

fn default_reset_base_url() -> String {
    "http://localhost:3000/reset-password".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PasswordConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reset_token_ttl(), Duration::from_secs(1800));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let config = PasswordConfig {
            min_length: 20,
            max_length: 10,
            ..PasswordConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
