//! # authgate
//!
//! Directory-backed authentication engine with rotating session tokens,
//! refresh-token reuse detection, and a password-reset lifecycle.
//!
//! ## Features
//!
//! - **Interchangeable identity backends**: generic LDAP, Active Directory,
//!   and Keycloak/OIDC behind one `Directory` trait, selected by
//!   configuration
//! - **Dual-key token pairs**: short-lived access and long-lived refresh
//!   JWTs signed with distinct secrets, type-checked after signature
//!   verification
//! - **Refresh rotation with reuse detection**: every refresh retires its
//!   predecessor; a replayed token invalidates every session the user holds
//! - **Single active session per device**: the session store keeps exactly
//!   one refresh record per (user, device)
//! - **Resilient directory calls**: per-call timeout, circuit breaker, and
//!   bounded retry for idempotent reads only
//! - **Fire-and-forget audit trail** of every security-relevant outcome
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use authgate::{AuthEngine, Config, Credentials, RequestContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("authgate.yaml").await?;
//!     let engine = AuthEngine::from_config(&config).await?;
//!
//!     let credentials = Credentials::new("alice", "correct horse", Some("laptop-1"))?;
//!     let ctx = RequestContext::generated("203.0.113.7", "cli/1.0");
//!
//!     let outcome = engine.authenticator().sign_in(&credentials, &ctx).await?;
//!     println!("access token: {}", outcome.tokens.access_token);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
mod error;
pub mod storage;

pub use crate::config::{Config, DirectoryBackend};
pub use crate::error::{AuthError, Error, PasswordError, Result, TokenError};

pub use crate::core::audit::{AuditEvent, AuditRecord, AuditSink};
pub use crate::core::auth::Authenticator;
pub use crate::core::directory::{Directory, DirectoryPasswords, UserLookup};
pub use crate::core::password::{PasswordFlows, PasswordPolicy, ResetEventSink, ResetTokenStore};
pub use crate::core::session::{RevocationList, SessionStore};
pub use crate::core::tokens::TokenCodec;
pub use crate::core::types::{
    AuthenticatedUser, AuthenticationResult, Credentials, PasswordChangeKind,
    PasswordChangeResult, PasswordResetToken, RequestContext, TokenClaims, TokenKind, TokenPair,
};

use std::sync::Arc;
use tracing::info;

use crate::core::audit::RedisAuditSink;
use crate::core::directory::KeycloakDirectory;
use crate::core::password::{LogEventSink, RedisResetTokenStore};
use crate::core::session::{RedisRevocationList, RedisSessionStore};
use crate::storage::RedisPool;

/// Fully wired engine: authenticator plus, when the backend supports it,
/// the password flows
pub struct AuthEngine {
    authenticator: Authenticator,
    passwords: Option<PasswordFlows>,
}

impl AuthEngine {
    /// Wire the engine from configuration: Redis-backed stores, the
    /// configured directory backend behind the resilience decorator, and
    /// the password flows when the backend exposes a password surface
    /// (Keycloak).
    pub async fn from_config(config: &Config) -> Result<Self> {
        info!("wiring authentication engine");

        let pool = RedisPool::new(&config.redis).await?;

        let directory = crate::core::directory::from_config(&config.directory, &config.resilience)?;
        let codec = TokenCodec::new(&config.tokens);
        let sessions = Arc::new(RedisSessionStore::new(pool.clone()));
        let revocations = Arc::new(RedisRevocationList::new(pool.clone()));
        let audit: Arc<dyn AuditSink> = Arc::new(RedisAuditSink::new(pool.clone()));

        let authenticator = Authenticator::new(
            directory,
            codec,
            sessions,
            revocations,
            Arc::clone(&audit),
        );

        let passwords = match config.directory.backend {
            DirectoryBackend::Keycloak => {
                let keycloak = Arc::new(KeycloakDirectory::new(config.directory.keycloak.clone())?);
                Some(PasswordFlows::new(
                    keycloak.clone(),
                    keycloak,
                    Arc::new(RedisResetTokenStore::new(pool.clone())),
                    Arc::new(LogEventSink),
                    audit,
                    &config.password,
                ))
            }
            _ => None,
        };

        Ok(Self {
            authenticator,
            passwords,
        })
    }

    /// The sign-in / sign-out / refresh state machine
    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Password recovery/reset/update flows; `None` when the configured
    /// backend has no password surface
    pub fn passwords(&self) -> Option<&PasswordFlows> {
        self.passwords.as_ref()
    }
}

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(NAME, "authgate");
        assert!(!VERSION.is_empty());
    }
}
