//! In-memory implementations of the session store and revocation list
//!
//! Used by tests and by development setups running without Redis. TTLs are
//! honored lazily: expired entries are dropped when read.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::{RevocationList, SessionStore};
use crate::core::types::TokenClaims;
use crate::error::Result;

/// In-memory session store
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<(String, String), (TokenClaims, Instant)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) sessions, for assertions in tests
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .filter(|(_, deadline)| *deadline > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn store(
        &self,
        user_id: &str,
        device_id: &str,
        claims: &TokenClaims,
        ttl: Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + ttl;
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(
                (user_id.to_string(), device_id.to_string()),
                (claims.clone(), deadline),
            );
        Ok(())
    }

    async fn retrieve(&self, user_id: &str, device_id: &str) -> Result<Option<TokenClaims>> {
        let key = (user_id.to_string(), device_id.to_string());
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());

        match entries.get(&key) {
            Some((_, deadline)) if *deadline <= Instant::now() => {
                entries.remove(&key);
                Ok(None)
            }
            Some((claims, _)) => Ok(Some(claims.clone())),
            None => Ok(None),
        }
    }

    async fn delete(&self, user_id: &str, device_id: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&(user_id.to_string(), device_id.to_string()));
        Ok(())
    }

    async fn delete_all(&self, user_id: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .retain(|(uid, _), _| uid != user_id);
        Ok(())
    }
}

/// In-memory revocation list
#[derive(Default)]
pub struct MemoryRevocationList {
    entries: Mutex<HashMap<String, Instant>>,
}

impl MemoryRevocationList {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevocationList for MemoryRevocationList {
    async fn revoke(&self, jti: &str, ttl: Duration) -> Result<()> {
        if jti.trim().is_empty() {
            return Ok(());
        }
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(jti.to_string(), Instant::now() + ttl);
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool> {
        if jti.trim().is_empty() {
            return Ok(false);
        }
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        match entries.get(jti) {
            Some(deadline) if *deadline <= Instant::now() => {
                entries.remove(jti);
                Ok(false)
            }
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }
}
