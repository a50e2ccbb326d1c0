//! Password-reset token value object

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Lifecycle state of a reset token.
///
/// `Expired` is derived rather than eagerly written: a token past its
/// `expires_at` stays `Pending` in the store but is treated as invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResetTokenStatus {
    Pending,
    Used,
    Expired,
    Cancelled,
}

/// A single-use password recovery token.
///
/// At most one `Pending` token exists per user; creating a new one cancels
/// all predecessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordResetToken {
    /// Record id
    pub id: String,
    /// Opaque token string handed to the user
    pub token: String,
    /// Owning user
    pub user_id: String,
    /// Email the recovery was requested for
    pub email: String,
    /// Creation instant
    pub created_at: DateTime<Utc>,
    /// Expiry instant
    pub expires_at: DateTime<Utc>,
    /// Consumption instant, once used
    pub used_at: Option<DateTime<Utc>>,
    /// Current lifecycle state
    pub status: ResetTokenStatus,
}

impl PasswordResetToken {
    /// Mint a fresh pending token for `user_id` valid for `validity`
    pub fn create(user_id: impl Into<String>, email: impl Into<String>, validity: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            token: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            email: email.into(),
            created_at: now,
            expires_at: now + chrono::TimeDelta::seconds(validity.as_secs() as i64),
            used_at: None,
            status: ResetTokenStatus::Pending,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.status == ResetTokenStatus::Expired || Utc::now() > self.expires_at
    }

    pub fn is_used(&self) -> bool {
        self.status == ResetTokenStatus::Used
    }

    /// Pending and not past expiry
    pub fn is_valid(&self) -> bool {
        self.status == ResetTokenStatus::Pending && !self.is_expired()
    }

    pub fn mark_used(mut self) -> Self {
        self.used_at = Some(Utc::now());
        self.status = ResetTokenStatus::Used;
        self
    }

    pub fn mark_cancelled(mut self) -> Self {
        self.status = ResetTokenStatus::Cancelled;
        self
    }
}

/// What kind of password change completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordChangeKind {
    /// Change through a recovery token
    Reset,
    /// Change with knowledge of the current password
    Update,
}

/// Outcome of a completed password change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordChangeResult {
    /// User whose password changed
    pub user_id: String,
    /// How the change was performed
    pub change_type: PasswordChangeKind,
}
