//! Reset-token persistence
//!
//! Tokens live under `reset:token:{token}` with a per-user index at
//! `reset:user:{user_id}` so superseded tokens can be cancelled in bulk.
//! Records are retained past their expiry for a grace period so a late
//! attempt reports `Expired` rather than `Invalid`.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use crate::core::types::{PasswordResetToken, ResetTokenStatus};
use crate::error::Result;
use crate::storage::RedisPool;

/// How long a record outlives its expiry before the store drops it
const RETENTION_AFTER_EXPIRY: Duration = Duration::from_secs(86_400);

fn token_key(token: &str) -> String {
    format!("reset:token:{token}")
}

fn user_index_key(user_id: &str) -> String {
    format!("reset:user:{user_id}")
}

/// Persistence contract for password-reset tokens
#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    /// Persist a token (insert or update)
    async fn save(&self, token: &PasswordResetToken) -> Result<()>;

    /// Load a token by its opaque token string
    async fn find_by_token(&self, token: &str) -> Result<Option<PasswordResetToken>>;

    /// Transition a token to `Used`
    async fn mark_used(&self, token: &str) -> Result<()>;

    /// Cancel every `Pending` token the user holds
    async fn cancel_all_pending(&self, user_id: &str) -> Result<()>;
}

/// Reset-token store over Redis
#[derive(Clone)]
pub struct RedisResetTokenStore {
    pool: RedisPool,
}

impl RedisResetTokenStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    fn record_ttl(token: &PasswordResetToken) -> Duration {
        let remaining = (token.expires_at - Utc::now()).num_seconds().max(0) as u64;
        Duration::from_secs(remaining) + RETENTION_AFTER_EXPIRY
    }

    async fn write(&self, token: &PasswordResetToken) -> Result<()> {
        let serialized = serde_json::to_string(token)?;
        self.pool
            .set_ex(&token_key(&token.token), &serialized, Self::record_ttl(token))
            .await
    }

    async fn user_tokens(&self, user_id: &str) -> Result<Vec<String>> {
        let Some(serialized) = self.pool.get(&user_index_key(user_id)).await? else {
            return Ok(Vec::new());
        };
        Ok(serde_json::from_str(&serialized)?)
    }
}

#[async_trait]
impl ResetTokenStore for RedisResetTokenStore {
    async fn save(&self, token: &PasswordResetToken) -> Result<()> {
        self.write(token).await?;

        // maintain the per-user index for bulk cancellation
        let mut tokens = self.user_tokens(&token.user_id).await?;
        if !tokens.contains(&token.token) {
            tokens.push(token.token.clone());
            let serialized = serde_json::to_string(&tokens)?;
            self.pool
                .set_ex(
                    &user_index_key(&token.user_id),
                    &serialized,
                    Self::record_ttl(token),
                )
                .await?;
        }

        debug!(user_id = %token.user_id, "reset token saved");
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<PasswordResetToken>> {
        let Some(serialized) = self.pool.get(&token_key(token)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&serialized)?))
    }

    async fn mark_used(&self, token: &str) -> Result<()> {
        if let Some(record) = self.find_by_token(token).await? {
            self.write(&record.mark_used()).await?;
        }
        Ok(())
    }

    async fn cancel_all_pending(&self, user_id: &str) -> Result<()> {
        for token in self.user_tokens(user_id).await? {
            if let Some(record) = self.find_by_token(&token).await? {
                if record.status == ResetTokenStatus::Pending {
                    self.write(&record.mark_cancelled()).await?;
                }
            }
        }
        debug!(user_id, "pending reset tokens cancelled");
        Ok(())
    }
}

/// In-memory reset-token store for tests and development
#[derive(Default)]
pub struct MemoryResetTokenStore {
    tokens: Mutex<HashMap<String, PasswordResetToken>>,
}

impl MemoryResetTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All tokens currently held for a user, any status
    pub fn tokens_for_user(&self, user_id: &str) -> Vec<PasswordResetToken> {
        self.tokens
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ResetTokenStore for MemoryResetTokenStore {
    async fn save(&self, token: &PasswordResetToken) -> Result<()> {
        self.tokens
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<PasswordResetToken>> {
        Ok(self
            .tokens
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(token)
            .cloned())
    }

    async fn mark_used(&self, token: &str) -> Result<()> {
        let mut tokens = self.tokens.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(record) = tokens.remove(token) {
            tokens.insert(token.to_string(), record.mark_used());
        }
        Ok(())
    }

    async fn cancel_all_pending(&self, user_id: &str) -> Result<()> {
        let mut tokens = self.tokens.lock().unwrap_or_else(|p| p.into_inner());
        for record in tokens.values_mut() {
            if record.user_id == user_id && record.status == ResetTokenStatus::Pending {
                record.status = ResetTokenStatus::Cancelled;
            }
        }
        Ok(())
    }
}
