//! Redis audit sink: JSON records appended to a list

use async_trait::async_trait;
use tracing::debug;

use super::{AuditRecord, AuditSink};
use crate::error::Result;
use crate::storage::RedisPool;

const AUDIT_KEY: &str = "audit:events";

/// Append-only audit log over a Redis list
#[derive(Clone)]
pub struct RedisAuditSink {
    pool: RedisPool,
}

impl RedisAuditSink {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for RedisAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<()> {
        let serialized = serde_json::to_string(&record)?;
        self.pool.rpush(AUDIT_KEY, &serialized).await?;
        debug!(event = ?record.event_type, "audit event recorded");
        Ok(())
    }
}
