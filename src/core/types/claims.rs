//! Token claims and the session records built from them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Discriminator between the two halves of a token pair.
///
/// The claim must match the verification context: an access-signed token can
/// never pass refresh validation and vice versa, independent of signature
/// validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Access => write!(f, "access"),
            Self::Refresh => write!(f, "refresh"),
        }
    }
}

/// Verified claims of a session token.
///
/// The `jti` is the identity key for both the revocation list and session
/// matching. Stored verbatim (JSON) as the session record for the currently
/// valid refresh token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Unique token id
    pub jti: String,
    /// Subject (the username, mirroring the directory entry)
    pub subject: String,
    /// Stable user identifier
    pub user_id: String,
    /// Login name
    pub username: String,
    /// Email address
    pub email: String,
    /// Normalized roles at issuance time
    pub roles: HashSet<String>,
    /// Device the token was issued to
    pub device_id: String,
    /// Issuance instant
    pub issued_at: DateTime<Utc>,
    /// Expiry instant
    pub expires_at: DateTime<Utc>,
    /// Issuer string from configuration
    pub issuer: String,
    /// Access or refresh
    pub token_type: TokenKind,
}

impl TokenClaims {
    /// Remaining natural lifetime, floored at one second so store TTLs are
    /// never zero
    pub fn remaining_ttl(&self) -> Duration {
        let secs = (self.expires_at - Utc::now()).num_seconds().max(1);
        Duration::from_secs(secs as u64)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}
