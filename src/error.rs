//! Error types for the authentication engine

use thiserror::Error;

/// Result type alias for the engine
pub type Result<T> = std::result::Result<T, Error>;

/// Authentication failures raised by the directory gateway
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Username/password pair was rejected by the backend
    #[error("invalid credentials for user: {0}")]
    InvalidCredentials(String),

    /// Account exists but is locked out
    #[error("account locked: {0}")]
    AccountLocked(String),

    /// Account exists but is disabled
    #[error("account disabled: {0}")]
    AccountDisabled(String),

    /// Directory backend unreachable, timed out, or circuit open
    #[error("directory service unavailable: {0}")]
    DirectoryUnavailable(String),
}

/// Token validation and lifecycle failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token is not a parseable JWT
    #[error("malformed token")]
    Malformed,

    /// Signature did not verify against the expected key
    #[error("invalid token signature")]
    SignatureInvalid,

    /// Token is past its expiry
    #[error("token expired")]
    Expired,

    /// Token type claim does not match the verification context
    #[error("wrong token type: expected {expected}, got {actual}")]
    WrongType {
        /// Token type required by the caller
        expected: String,
        /// Token type carried in the claims
        actual: String,
    },

    /// Token jti is on the revocation list
    #[error("token has been revoked")]
    Revoked,

    /// No session record exists for the token's (user, device)
    #[error("no active session for token")]
    NotFound,

    /// Token is valid but superseded by a newer rotation
    #[error("token does not match the active session")]
    Mismatch,
}

/// Password policy and reset-token failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    /// New password violates the configured policy
    #[error("password validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    /// Reset token unknown, cancelled, or already consumed
    #[error("reset token is invalid")]
    ResetTokenInvalid,

    /// Reset token past its expiry
    #[error("reset token has expired")]
    ResetTokenExpired,

    /// Current password did not verify during an update
    #[error("current password does not match")]
    CurrentPasswordMismatch,
}

/// Top-level error type for the engine
#[derive(Error, Debug)]
pub enum Error {
    /// Directory authentication failures
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Token validation and lifecycle failures
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Password policy and reset failures
    #[error(transparent)]
    Password(#[from] PasswordError),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Redis errors
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// HTTP client errors
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    /// LDAP protocol errors
    #[error("ldap error: {0}")]
    Ldap(#[from] ldap3::LdapError),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// JWT encoding errors during issuance
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant violations
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error is a directory-availability failure, the only class
    /// the resilience layer is allowed to retry
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Auth(AuthError::DirectoryUnavailable(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_propagate_transparently() {
        let err: Error = AuthError::InvalidCredentials("alice".into()).into();
        assert_eq!(err.to_string(), "invalid credentials for user: alice");

        let err: Error = TokenError::Revoked.into();
        assert_eq!(err.to_string(), "token has been revoked");
    }

    #[test]
    fn test_wrong_type_message() {
        let err = TokenError::WrongType {
            expected: "refresh".into(),
            actual: "access".into(),
        };
        assert_eq!(err.to_string(), "wrong token type: expected refresh, got access");
    }

    #[test]
    fn test_validation_failed_joins_violations() {
        let err = PasswordError::ValidationFailed(vec![
            "too short".into(),
            "missing digit".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "password validation failed: too short; missing digit"
        );
    }

    #[test]
    fn test_is_unavailable() {
        let err: Error = AuthError::DirectoryUnavailable("timeout".into()).into();
        assert!(err.is_unavailable());

        let err: Error = AuthError::InvalidCredentials("bob".into()).into();
        assert!(!err.is_unavailable());
    }
}
