//! Redis configuration

use serde::{Deserialize, Serialize};

/// Settings for the session/revocation/audit backing store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Connection URL
    #[serde(default = "default_url")]
    pub url: String,
    /// Whether the store is enabled; disabled falls back to a no-op pool
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            enabled: true,
            connection_timeout: default_connection_timeout(),
        }
    }
}

impl RedisConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.enabled && self.url.is_empty() {
            return Err("redis.url is required when redis is enabled".to_string());
        }
        Ok(())
    }
}

fn default_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_true() -> bool {
    true
}
