//! Session store and revocation list
//!
//! Two keyed, TTL'd contracts over an external store:
//!
//! - the session store holds the claims of the *currently valid* refresh
//!   token per (user, device) — at most one record, writes overwrite
//! - the revocation list holds revoked jtis for each token's remaining
//!   natural lifetime, so it prunes itself and never needs maintenance

mod memory;
mod redis;

pub use memory::{MemoryRevocationList, MemorySessionStore};
pub use redis::{RedisRevocationList, RedisSessionStore};

use async_trait::async_trait;
use std::time::Duration;

use crate::core::types::TokenClaims;
use crate::error::Result;

/// Single active refresh session per (user, device)
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store the refresh claims for (user, device), overwriting any
    /// previous record
    async fn store(
        &self,
        user_id: &str,
        device_id: &str,
        claims: &TokenClaims,
        ttl: Duration,
    ) -> Result<()>;

    /// The claims currently stored for (user, device), if any
    async fn retrieve(&self, user_id: &str, device_id: &str) -> Result<Option<TokenClaims>>;

    /// Drop the session for one device
    async fn delete(&self, user_id: &str, device_id: &str) -> Result<()>;

    /// Drop every session the user holds, on any device
    async fn delete_all(&self, user_id: &str) -> Result<()>;
}

/// TTL'd set of revoked token identifiers
#[async_trait]
pub trait RevocationList: Send + Sync {
    /// Mark `jti` revoked for `ttl`; a blank jti is a no-op
    async fn revoke(&self, jti: &str, ttl: Duration) -> Result<()>;

    /// Whether `jti` is currently revoked
    async fn is_revoked(&self, jti: &str) -> Result<bool>;
}
