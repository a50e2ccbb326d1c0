//! Redis implementations of the session store and revocation list

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use super::{RevocationList, SessionStore};
use crate::core::types::TokenClaims;
use crate::error::Result;
use crate::storage::RedisPool;

const SESSION_PREFIX: &str = "session";
const REVOKED_PREFIX: &str = "revoked";
const REVOKED_VALUE: &str = "1";

fn session_key(user_id: &str, device_id: &str) -> String {
    format!("{SESSION_PREFIX}:{user_id}:{device_id}")
}

fn revoked_key(jti: &str) -> String {
    format!("{REVOKED_PREFIX}:{jti}")
}

/// Session store over Redis, keyed `session:{user}:{device}`
#[derive(Clone)]
pub struct RedisSessionStore {
    pool: RedisPool,
}

impl RedisSessionStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn store(
        &self,
        user_id: &str,
        device_id: &str,
        claims: &TokenClaims,
        ttl: Duration,
    ) -> Result<()> {
        let serialized = serde_json::to_string(claims)?;
        self.pool
            .set_ex(&session_key(user_id, device_id), &serialized, ttl)
            .await?;
        debug!(user_id, device_id, "session stored");
        Ok(())
    }

    async fn retrieve(&self, user_id: &str, device_id: &str) -> Result<Option<TokenClaims>> {
        let Some(serialized) = self.pool.get(&session_key(user_id, device_id)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&serialized)?))
    }

    async fn delete(&self, user_id: &str, device_id: &str) -> Result<()> {
        self.pool.delete(&session_key(user_id, device_id)).await?;
        debug!(user_id, device_id, "session deleted");
        Ok(())
    }

    async fn delete_all(&self, user_id: &str) -> Result<()> {
        let removed = self
            .pool
            .delete_matching(&format!("{SESSION_PREFIX}:{user_id}:*"))
            .await?;
        debug!(user_id, removed, "all sessions deleted");
        Ok(())
    }
}

/// Revocation list over Redis, keyed `revoked:{jti}`
#[derive(Clone)]
pub struct RedisRevocationList {
    pool: RedisPool,
}

impl RedisRevocationList {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevocationList for RedisRevocationList {
    async fn revoke(&self, jti: &str, ttl: Duration) -> Result<()> {
        if jti.trim().is_empty() {
            warn!("ignoring revocation of blank jti");
            return Ok(());
        }
        self.pool
            .set_ex(&revoked_key(jti), REVOKED_VALUE, ttl)
            .await?;
        debug!(jti, ttl_secs = ttl.as_secs(), "token revoked");
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool> {
        if jti.trim().is_empty() {
            return Ok(false);
        }
        self.pool.exists(&revoked_key(jti)).await
    }
}
