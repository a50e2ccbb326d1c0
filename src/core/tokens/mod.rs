//! Token codec: signing and verification of session token pairs
//!
//! Access and refresh tokens are HMAC-signed JWTs carrying the same claim
//! set but signed with distinct keys. The type claim is checked only after
//! signature verification, so a tampered type claim surfaces as a signature
//! failure rather than a type mismatch.

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::TokenConfig;
use crate::core::types::{AuthenticatedUser, TokenClaims, TokenKind, TokenPair};
use crate::error::{Error, Result, TokenError};

/// Wire format of the JWT payload
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    jti: String,
    sub: String,
    iss: String,
    iat: i64,
    exp: i64,
    #[serde(rename = "userId")]
    user_id: String,
    username: String,
    email: String,
    roles: Vec<String>,
    #[serde(rename = "deviceId")]
    device_id: String,
    #[serde(rename = "tokenType")]
    token_type: TokenKind,
}

/// Stateless signer/verifier for session token pairs
#[derive(Clone)]
pub struct TokenCodec {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    algorithm: Algorithm,
    access_ttl: TimeDelta,
    refresh_ttl: TimeDelta,
    issuer: String,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("issuer", &self.issuer)
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

impl TokenCodec {
    /// Create a codec from token configuration
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            algorithm: Algorithm::HS256,
            access_ttl: TimeDelta::seconds(config.access_ttl_secs as i64),
            refresh_ttl: TimeDelta::seconds(config.refresh_ttl_secs as i64),
            issuer: config.issuer.clone(),
        }
    }

    /// Issue a fresh access/refresh pair for a user on a device.
    ///
    /// The two tokens carry independent jtis and are signed with their own
    /// keys.
    pub fn issue(&self, user: &AuthenticatedUser, device_id: &str) -> Result<TokenPair> {
        let now = Utc::now();
        let access_expires_at = now + self.access_ttl;
        let refresh_expires_at = now + self.refresh_ttl;

        let access_token = self.sign(
            user,
            device_id,
            now,
            access_expires_at,
            TokenKind::Access,
            &self.access_encoding,
        )?;
        let refresh_token = self.sign(
            user,
            device_id,
            now,
            refresh_expires_at,
            TokenKind::Refresh,
            &self.refresh_encoding,
        )?;

        debug!(user_id = %user.user_id, device_id, "issued token pair");

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
            token_type: "Bearer".to_string(),
        })
    }

    /// Verify a raw token against the key for `expected` and return its
    /// claims.
    ///
    /// Fails with `Malformed`, `SignatureInvalid`, `Expired`, or `WrongType`;
    /// the type claim is only consulted once the signature has verified.
    pub fn validate(&self, raw: &str, expected: TokenKind) -> Result<TokenClaims> {
        let decoding_key = match expected {
            TokenKind::Access => &self.access_decoding,
            TokenKind::Refresh => &self.refresh_decoding,
        };

        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.validate_aud = false;
        validation.leeway = 0;

        let data = decode::<WireClaims>(raw, decoding_key, &validation)
            .map_err(|e| Error::Token(map_jwt_error(&e)))?;
        let wire = data.claims;

        if wire.token_type != expected {
            return Err(TokenError::WrongType {
                expected: expected.to_string(),
                actual: wire.token_type.to_string(),
            }
            .into());
        }

        let issued_at = DateTime::<Utc>::from_timestamp(wire.iat, 0)
            .ok_or(Error::Token(TokenError::Malformed))?;
        let expires_at = DateTime::<Utc>::from_timestamp(wire.exp, 0)
            .ok_or(Error::Token(TokenError::Malformed))?;

        Ok(TokenClaims {
            jti: wire.jti,
            subject: wire.sub,
            user_id: wire.user_id,
            username: wire.username,
            email: wire.email,
            roles: wire.roles.into_iter().collect(),
            device_id: wire.device_id,
            issued_at,
            expires_at,
            issuer: wire.iss,
            token_type: wire.token_type,
        })
    }

    fn sign(
        &self,
        user: &AuthenticatedUser,
        device_id: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        kind: TokenKind,
        key: &EncodingKey,
    ) -> Result<String> {
        let claims = WireClaims {
            jti: Uuid::new_v4().to_string(),
            sub: user.username.clone(),
            iss: self.issuer.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            user_id: user.user_id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            roles: user.roles.iter().cloned().collect(),
            device_id: device_id.to_string(),
            token_type: kind,
        };

        let header = Header::new(self.algorithm);
        Ok(encode(&header, &claims, key)?)
    }
}

fn map_jwt_error(err: &jsonwebtoken::errors::Error) -> TokenError {
    use jsonwebtoken::errors::ErrorKind;

    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
        _ => TokenError::Malformed,
    }
}
