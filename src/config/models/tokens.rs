//! Token signing configuration

use rand::distributions::Alphanumeric;
use rand::{Rng, thread_rng};
use serde::{Deserialize, Serialize};

/// Signing and lifetime settings for issued token pairs.
///
/// Access and refresh tokens are signed with distinct secrets so one key
/// leaking never compromises the other class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// HMAC secret for access tokens
    #[serde(default = "generate_secret")]
    pub access_secret: String,
    /// HMAC secret for refresh tokens
    #[serde(default = "generate_secret")]
    pub refresh_secret: String,
    /// Access token lifetime in seconds
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: u64,
    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: u64,
    /// Issuer claim stamped into every token
    #[serde(default = "default_issuer")]
    pub issuer: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_secret: generate_secret(),
            refresh_secret: generate_secret(),
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
            issuer: default_issuer(),
        }
    }
}

impl TokenConfig {
    /// Merge token configurations (other takes precedence over defaults)
    pub fn merge(mut self, other: Self) -> Self {
        if !other.access_secret.is_empty() {
            self.access_secret = other.access_secret;
        }
        if !other.refresh_secret.is_empty() {
            self.refresh_secret = other.refresh_secret;
        }
        if other.access_ttl_secs != default_access_ttl() {
            self.access_ttl_secs = other.access_ttl_secs;
        }
        if other.refresh_ttl_secs != default_refresh_ttl() {
            self.refresh_ttl_secs = other.refresh_ttl_secs;
        }
        if other.issuer != default_issuer() {
            self.issuer = other.issuer;
        }
        self
    }

    /// Validate signing configuration
    pub fn validate(&self) -> Result<(), String> {
        for (name, secret) in [
            ("access_secret", &self.access_secret),
            ("refresh_secret", &self.refresh_secret),
        ] {
            if secret.len() < 32 {
                return Err(format!("{name} must be at least 32 characters long"));
            }
            if secret == "change-me" || secret == "your-secret-key" {
                return Err(format!("{name} must not use a placeholder value"));
            }
        }

        if self.access_secret == self.refresh_secret {
            return Err("access and refresh secrets must differ".to_string());
        }

        if self.access_ttl_secs == 0 || self.refresh_ttl_secs == 0 {
            return Err("token lifetimes must be non-zero".to_string());
        }

        if self.refresh_ttl_secs <= self.access_ttl_secs {
            return Err("refresh lifetime must exceed access lifetime".to_string());
        }

        if self.issuer.trim().is_empty() {
            return Err("issuer cannot be blank".to_string());
        }

        Ok(())
    }
}

fn default_access_ttl() -> u64 {
    900
}

fn default_refresh_ttl() -> u64 {
    604_800
}

fn default_issuer() -> String {
    "authgate".to_string()
}

/// Generate a 64-character random secret
fn generate_secret() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TokenConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.access_ttl_secs, 900);
        assert_eq!(config.refresh_ttl_secs, 604_800);
    }

    #[test]
    fn test_generated_secrets_differ() {
        let config = TokenConfig::default();
        assert_ne!(config.access_secret, config.refresh_secret);
    }

    #[test]
    fn test_short_secret_rejected() {
        let config = TokenConfig {
            access_secret: "short".to_string(),
            ..TokenConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_identical_secrets_rejected() {
        let secret = "x".repeat(64);
        let config = TokenConfig {
            access_secret: secret.clone(),
            refresh_secret: secret,
            ..TokenConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_refresh_must_outlive_access() {
        let config = TokenConfig {
            access_ttl_secs: 900,
            refresh_ttl_secs: 900,
            ..TokenConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
