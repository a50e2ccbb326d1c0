//! Issued token pairs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::AuthenticatedUser;

/// A freshly signed access/refresh token pair.
///
/// The two tokens are signed with distinct keys and carry independent jtis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived access token
    pub access_token: String,
    /// Long-lived refresh token
    pub refresh_token: String,
    /// Access token expiry
    pub access_expires_at: DateTime<Utc>,
    /// Refresh token expiry
    pub refresh_expires_at: DateTime<Utc>,
    /// Always "Bearer"
    pub token_type: String,
}

/// Outcome of a successful sign-in
#[derive(Debug, Clone)]
pub struct AuthenticationResult {
    /// Profile resolved by the directory at sign-in time
    pub user: AuthenticatedUser,
    /// The session tokens issued for this device
    pub tokens: TokenPair,
}
