//! Audit sink for security-relevant outcomes
//!
//! Every sign-in, sign-out, refresh, reuse detection, and password change is
//! audited. Audit writes are fire-and-forget: they run on a detached task,
//! their failure is logged and discarded, and they never delay or change the
//! client-visible result.

mod memory;
mod redis;

pub use memory::MemoryAuditSink;
pub use redis::RedisAuditSink;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::core::types::RequestContext;
use crate::error::Result;

/// Catalogue of audited events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEvent {
    SignInSuccess,
    SignInFailure,
    SignOut,
    TokenRefresh,
    TokenReuseDetected,
    PasswordResetRequested,
    PasswordResetCompleted,
    PasswordResetFailed,
    PasswordUpdated,
}

/// One audit record, append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event_type: AuditEvent,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub ip_address: String,
    pub user_agent: String,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    /// Record for a successful outcome
    pub fn success(
        event_type: AuditEvent,
        user_id: Option<&str>,
        username: Option<&str>,
        ctx: &RequestContext,
    ) -> Self {
        Self {
            event_type,
            user_id: user_id.map(str::to_string),
            username: username.map(str::to_string),
            success: true,
            failure_reason: None,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            correlation_id: ctx.correlation_id.clone(),
            timestamp: Utc::now(),
        }
    }

    /// Record for a failed outcome, with the reason
    pub fn failure(
        event_type: AuditEvent,
        username: Option<&str>,
        reason: &str,
        ctx: &RequestContext,
    ) -> Self {
        Self {
            event_type,
            user_id: None,
            username: username.map(str::to_string),
            success: false,
            failure_reason: Some(reason.to_string()),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            correlation_id: ctx.correlation_id.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only audit destination
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord) -> Result<()>;
}

/// Write an audit record on a detached task.
///
/// The caller's flow continues immediately; a failed write is only logged.
pub fn record_detached(sink: &Arc<dyn AuditSink>, record: AuditRecord) {
    let sink = Arc::clone(sink);
    tokio::spawn(async move {
        let event = record.event_type;
        if let Err(e) = sink.record(record).await {
            warn!(?event, "failed to record audit event: {e}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RequestContext {
        RequestContext::new("corr-1", "10.0.0.1", "test-agent")
    }

    #[test]
    fn test_success_record_carries_context() {
        let record = AuditRecord::success(
            AuditEvent::SignInSuccess,
            Some("u1"),
            Some("alice"),
            &ctx(),
        );
        assert!(record.success);
        assert_eq!(record.correlation_id, "corr-1");
        assert_eq!(record.user_id.as_deref(), Some("u1"));
        assert_eq!(record.failure_reason, None);
    }

    #[test]
    fn test_failure_record_carries_reason() {
        let record = AuditRecord::failure(
            AuditEvent::SignInFailure,
            Some("alice"),
            "invalid credentials for user: alice",
            &ctx(),
        );
        assert!(!record.success);
        assert!(record.failure_reason.as_deref().unwrap().contains("invalid"));
    }

    #[test]
    fn test_event_type_serialization() {
        let json = serde_json::to_string(&AuditEvent::TokenReuseDetected).unwrap();
        assert_eq!(json, r#""TOKEN_REUSE_DETECTED""#);
    }

    #[tokio::test]
    async fn test_record_detached_delivers_eventually() {
        let sink = Arc::new(MemoryAuditSink::new());
        let dyn_sink: Arc<dyn AuditSink> = sink.clone();

        record_detached(
            &dyn_sink,
            AuditRecord::success(AuditEvent::SignOut, Some("u1"), Some("alice"), &ctx()),
        );

        // the write runs on a detached task; give it a moment
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(sink.records().len(), 1);
    }
}
