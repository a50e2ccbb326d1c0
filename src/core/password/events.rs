//! Reset-notification events
//!
//! The engine never sends mail itself. When a recovery token is minted it
//! publishes an event carrying the token and reset link; the edge owns
//! delivery.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;

/// Payload published when a recovery token is created
#[derive(Debug, Clone, PartialEq)]
pub struct PasswordResetRequested {
    pub user_id: String,
    pub email: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub reset_url: String,
}

/// Destination for reset notifications
#[async_trait]
pub trait ResetEventSink: Send + Sync {
    async fn password_reset_requested(&self, event: PasswordResetRequested) -> Result<()>;
}

/// Sink that only logs; the default when no delivery channel is wired
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

#[async_trait]
impl ResetEventSink for LogEventSink {
    async fn password_reset_requested(&self, event: PasswordResetRequested) -> Result<()> {
        info!(
            user_id = %event.user_id,
            email = %event.email,
            expires_at = %event.expires_at,
            "password reset requested"
        );
        debug!(reset_url = %event.reset_url, "reset link");
        Ok(())
    }
}

/// Sink that captures events for tests
#[derive(Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<PasswordResetRequested>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PasswordResetRequested> {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl ResetEventSink for MemoryEventSink {
    async fn password_reset_requested(&self, event: PasswordResetRequested) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(event);
        Ok(())
    }
}
