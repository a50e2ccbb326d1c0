//! Authentication orchestrator
//!
//! Implements the sign-in, sign-out, and refresh-token protocols over the
//! directory gateway, token codec, session store, revocation list, and audit
//! sink.
//!
//! Refresh rotation is what arms reuse detection: every successful refresh
//! revokes the token that produced it, so a revoked refresh token showing up
//! again can only be a replay of a stale credential. That event deletes all
//! of the user's sessions on every device, forcing re-authentication
//! everywhere instead of leaving the attacker one live session.
//!
//! Issue/revoke/store during rotation (steps after the user is re-resolved)
//! are not transactional: a crash between them can leave an issued pair with
//! no session record, which later fails refresh with `NotFound`. There is no
//! compensation for that window, and no lock serializes two concurrent
//! refreshes of the same still-valid token; the second writer wins the
//! session record.

#[cfg(test)]
mod tests;

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::audit::{AuditEvent, AuditRecord, AuditSink, record_detached};
use crate::core::directory::Directory;
use crate::core::session::{RevocationList, SessionStore};
use crate::core::tokens::TokenCodec;
use crate::core::types::{
    AuthenticationResult, Credentials, RequestContext, TokenKind, TokenPair,
};
use crate::error::{AuthError, Result, TokenError};

/// Orchestrates the token issuance/rotation/revocation state machine
pub struct Authenticator {
    directory: Arc<dyn Directory>,
    codec: TokenCodec,
    sessions: Arc<dyn SessionStore>,
    revocations: Arc<dyn RevocationList>,
    audit: Arc<dyn AuditSink>,
}

impl Authenticator {
    pub fn new(
        directory: Arc<dyn Directory>,
        codec: TokenCodec,
        sessions: Arc<dyn SessionStore>,
        revocations: Arc<dyn RevocationList>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            directory,
            codec,
            sessions,
            revocations,
            audit,
        }
    }

    /// Authenticate credentials and open a session for the device.
    ///
    /// The refresh claims are stored keyed by (user, device) with a TTL
    /// equal to the refresh token's remaining life, overwriting any previous
    /// session for that device.
    pub async fn sign_in(
        &self,
        credentials: &Credentials,
        ctx: &RequestContext,
    ) -> Result<AuthenticationResult> {
        debug!(username = credentials.username(), "attempting sign-in");

        let result = self.sign_in_inner(credentials).await;

        match &result {
            Ok(outcome) => {
                info!(username = credentials.username(), "sign-in successful");
                record_detached(
                    &self.audit,
                    AuditRecord::success(
                        AuditEvent::SignInSuccess,
                        Some(&outcome.user.user_id),
                        Some(&outcome.user.username),
                        ctx,
                    ),
                );
            }
            Err(e) => {
                warn!(username = credentials.username(), "sign-in failed: {e}");
                record_detached(
                    &self.audit,
                    AuditRecord::failure(
                        AuditEvent::SignInFailure,
                        Some(credentials.username()),
                        &e.to_string(),
                        ctx,
                    ),
                );
            }
        }

        result
    }

    async fn sign_in_inner(&self, credentials: &Credentials) -> Result<AuthenticationResult> {
        let user = self.directory.authenticate(credentials).await?;

        if !user.enabled {
            return Err(AuthError::AccountDisabled(credentials.username().to_string()).into());
        }

        let tokens = self.codec.issue(&user, credentials.device_id())?;
        let refresh_claims = self.codec.validate(&tokens.refresh_token, TokenKind::Refresh)?;

        self.sessions
            .store(
                &user.user_id,
                credentials.device_id(),
                &refresh_claims,
                refresh_claims.remaining_ttl(),
            )
            .await?;

        Ok(AuthenticationResult { user, tokens })
    }

    /// Invalidate an access token and, when the refresh token is supplied,
    /// the device's session.
    ///
    /// An invalid access token fails the whole operation without side
    /// effects. Revocation and session deletion run concurrently and both
    /// must complete before success is reported.
    pub async fn sign_out(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        ctx: &RequestContext,
    ) -> Result<()> {
        debug!("processing sign-out");

        let claims = self.codec.validate(access_token, TokenKind::Access)?;

        let revoke_access = self.revocations.revoke(&claims.jti, claims.remaining_ttl());
        let delete_session = async {
            match refresh_token {
                Some(token) if !token.trim().is_empty() => {
                    self.sessions
                        .delete(&claims.user_id, &claims.device_id)
                        .await
                }
                _ => Ok(()),
            }
        };

        tokio::try_join!(revoke_access, delete_session)?;

        info!(username = %claims.username, "sign-out successful");
        record_detached(
            &self.audit,
            AuditRecord::success(
                AuditEvent::SignOut,
                Some(&claims.user_id),
                Some(&claims.username),
                ctx,
            ),
        );

        Ok(())
    }

    /// Rotate a refresh token, detecting replay of already-rotated tokens.
    ///
    /// A revoked jti presented here means the token was already superseded
    /// by rotation: every session the user holds is deleted and the call
    /// fails with `Revoked`. A valid but superseded token (stored jti
    /// differs) fails with `Mismatch`, keeping a single active refresh token
    /// per device.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        ctx: &RequestContext,
    ) -> Result<TokenPair> {
        debug!("processing token refresh");

        let claims = self.codec.validate(refresh_token, TokenKind::Refresh)?;

        if claims.user_id.trim().is_empty() || claims.device_id.trim().is_empty() {
            return Err(TokenError::Malformed.into());
        }

        if self.revocations.is_revoked(&claims.jti).await? {
            warn!(
                user_id = %claims.user_id,
                "reuse of already-rotated refresh token detected; invalidating all sessions"
            );
            self.sessions.delete_all(&claims.user_id).await?;
            record_detached(
                &self.audit,
                AuditRecord::failure(
                    AuditEvent::TokenReuseDetected,
                    Some(&claims.username),
                    "revoked refresh token replayed",
                    ctx,
                ),
            );
            return Err(TokenError::Revoked.into());
        }

        let stored = self
            .sessions
            .retrieve(&claims.user_id, &claims.device_id)
            .await?
            .ok_or(TokenError::NotFound)?;

        if stored.jti != claims.jti {
            warn!(user_id = %claims.user_id, "refresh token does not match the active session");
            return Err(TokenError::Mismatch.into());
        }

        // re-resolve the profile so role changes since login take effect
        let user = self.directory.find_by_username(&claims.username).await?;

        let tokens = self.codec.issue(&user, &claims.device_id)?;
        let new_claims = self.codec.validate(&tokens.refresh_token, TokenKind::Refresh)?;

        let revoke_old = self.revocations.revoke(&claims.jti, claims.remaining_ttl());
        let store_new = self.sessions.store(
            &user.user_id,
            &claims.device_id,
            &new_claims,
            new_claims.remaining_ttl(),
        );
        tokio::try_join!(revoke_old, store_new)?;

        info!(user_id = %user.user_id, "token refresh successful");
        record_detached(
            &self.audit,
            AuditRecord::success(
                AuditEvent::TokenRefresh,
                Some(&user.user_id),
                Some(&user.username),
                ctx,
            ),
        );

        Ok(tokens)
    }
}
