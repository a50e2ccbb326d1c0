//! Configuration management for the engine
//!
//! This module handles loading, validation, and merging of all engine
//! configuration.

pub mod models;

pub use models::*;

use crate::error::{Error, Result};
use std::env;
use std::path::Path;
use tracing::{debug, info};

/// Root configuration for the engine
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Config {
    /// Directory gateway settings
    #[serde(default)]
    pub directory: DirectoryConfig,
    /// Token signing settings
    #[serde(default)]
    pub tokens: TokenConfig,
    /// Session/revocation/audit store settings
    #[serde(default)]
    pub redis: RedisConfig,
    /// Timeout/breaker/retry settings for directory calls
    #[serde(default)]
    pub resilience: ResilienceConfig,
    /// Password policy and reset-token settings
    #[serde(default)]
    pub password: PasswordConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::config(format!("failed to read config file: {e}")))?;
        let content = expand_env_vars(&content);

        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| Error::config(format!("failed to parse config: {e}")))?;

        config.validate()?;

        debug!("configuration loaded successfully");
        Ok(config)
    }

    /// Load configuration from environment variables, on top of defaults
    pub fn from_env() -> Result<Self> {
        info!("loading configuration from environment variables");

        let mut config = Self::default();

        if let Ok(url) = env::var("REDIS_URL") {
            config.redis.url = url;
        }
        if let Ok(secret) = env::var("AUTHGATE_ACCESS_SECRET") {
            config.tokens.access_secret = secret;
        }
        if let Ok(secret) = env::var("AUTHGATE_REFRESH_SECRET") {
            config.tokens.refresh_secret = secret;
        }
        if let Ok(issuer) = env::var("AUTHGATE_ISSUER") {
            config.tokens.issuer = issuer;
        }
        if let Ok(ttl) = env::var("AUTHGATE_ACCESS_TTL_SECS") {
            config.tokens.access_ttl_secs = ttl
                .parse()
                .map_err(|e| Error::config(format!("invalid access ttl: {e}")))?;
        }
        if let Ok(ttl) = env::var("AUTHGATE_REFRESH_TTL_SECS") {
            config.tokens.refresh_ttl_secs = ttl
                .parse()
                .map_err(|e| Error::config(format!("invalid refresh ttl: {e}")))?;
        }
        if let Ok(backend) = env::var("AUTHGATE_DIRECTORY_BACKEND") {
            config.directory.backend = serde_yaml::from_str(&backend)
                .map_err(|e| Error::config(format!("invalid directory backend: {e}")))?;
        }
        if let Ok(url) = env::var("LDAP_URL") {
            config.directory.ldap.url = url;
        }
        if let Ok(base) = env::var("LDAP_USER_SEARCH_BASE") {
            config.directory.ldap.user_search_base = base;
        }
        if let Ok(url) = env::var("KEYCLOAK_SERVER_URL") {
            config.directory.keycloak.server_url = url;
        }
        if let Ok(realm) = env::var("KEYCLOAK_REALM") {
            config.directory.keycloak.realm = realm;
        }
        if let Ok(client_id) = env::var("KEYCLOAK_CLIENT_ID") {
            config.directory.keycloak.client_id = client_id;
        }
        if let Ok(secret) = env::var("KEYCLOAK_CLIENT_SECRET") {
            config.directory.keycloak.client_secret = secret;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        debug!("validating configuration");

        self.directory
            .validate()
            .map_err(|e| Error::config(format!("directory config error: {e}")))?;
        self.tokens
            .validate()
            .map_err(|e| Error::config(format!("token config error: {e}")))?;
        self.redis
            .validate()
            .map_err(|e| Error::config(format!("redis config error: {e}")))?;
        self.resilience
            .validate()
            .map_err(|e| Error::config(format!("resilience config error: {e}")))?;
        self.password
            .validate()
            .map_err(|e| Error::config(format!("password config error: {e}")))?;

        debug!("configuration validation completed");
        Ok(())
    }

    /// Merge with another configuration (other takes precedence)
    pub fn merge(mut self, other: Self) -> Self {
        self.directory = self.directory.merge(other.directory);
        self.tokens = self.tokens.merge(other.tokens);
        if other.redis != RedisConfig::default() {
            self.redis = other.redis;
        }
        if other.resilience != ResilienceConfig::default() {
            self.resilience = other.resilience;
        }
        if other.password != PasswordConfig::default() {
            self.password = other.password;
        }
        self
    }
}

/// Expand `${VAR_NAME}` references in configuration text
fn expand_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    for (key, value) in env::vars() {
        let pattern = format!("${{{key}}}");
        if result.contains(&pattern) {
            result = result.replace(&pattern, &value);
        }
    }
    result
}
