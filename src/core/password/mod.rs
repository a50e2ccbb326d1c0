//! Password-reset token lifecycle and password changes
//!
//! A smaller state machine alongside the session protocol: recovery mints a
//! single-use token (cancelling all predecessors), reset consumes it exactly
//! once, and update changes a password against the directory after the
//! current one verifies.
//!
//! Recovery is the one operation that reports success even when it did
//! nothing: a recovery request for an unknown email returns `Ok` so the
//! endpoint cannot be used to enumerate accounts.

mod events;
mod policy;
mod store;

pub use events::{LogEventSink, MemoryEventSink, PasswordResetRequested, ResetEventSink};
pub use policy::PasswordPolicy;
pub use store::{MemoryResetTokenStore, RedisResetTokenStore, ResetTokenStore};

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::PasswordConfig;
use crate::core::audit::{AuditEvent, AuditRecord, AuditSink, record_detached};
use crate::core::directory::{DirectoryPasswords, UserLookup};
use crate::core::types::{
    PasswordChangeKind, PasswordChangeResult, PasswordResetToken, RequestContext,
};
use crate::error::{Error, PasswordError, Result};

/// Recover / reset / update password flows
pub struct PasswordFlows {
    lookup: Arc<dyn UserLookup>,
    passwords: Arc<dyn DirectoryPasswords>,
    store: Arc<dyn ResetTokenStore>,
    events: Arc<dyn ResetEventSink>,
    audit: Arc<dyn AuditSink>,
    policy: PasswordPolicy,
    reset_token_ttl: Duration,
    reset_base_url: String,
}

impl PasswordFlows {
    pub fn new(
        lookup: Arc<dyn UserLookup>,
        passwords: Arc<dyn DirectoryPasswords>,
        store: Arc<dyn ResetTokenStore>,
        events: Arc<dyn ResetEventSink>,
        audit: Arc<dyn AuditSink>,
        config: &PasswordConfig,
    ) -> Self {
        Self {
            lookup,
            passwords,
            store,
            events,
            audit,
            policy: PasswordPolicy::new(config.clone()),
            reset_token_ttl: config.reset_token_ttl(),
            reset_base_url: config.reset_base_url.clone(),
        }
    }

    /// Request password recovery for an email address.
    ///
    /// Always returns `Ok`. When the email matches an account, all of the
    /// user's pending tokens are cancelled, a fresh one is persisted, and a
    /// notification event is published.
    pub async fn recover(&self, email: &str, ctx: &RequestContext) -> Result<()> {
        debug!(email, "processing password recovery");

        if let Err(e) = self.recover_inner(email, ctx).await {
            // enumeration defense: failures are logged, never surfaced
            warn!(email, "password recovery failed: {e}");
        }

        info!(email, "password recovery processed");
        Ok(())
    }

    async fn recover_inner(&self, email: &str, ctx: &RequestContext) -> Result<()> {
        let Some(user) = self.lookup.find_by_email(email).await? else {
            debug!(email, "no account for recovery email");
            return Ok(());
        };

        self.store.cancel_all_pending(&user.user_id).await?;

        let token = PasswordResetToken::create(&user.user_id, &user.email, self.reset_token_ttl);
        self.store.save(&token).await?;

        let reset_url = format!("{}?token={}", self.reset_base_url, token.token);
        self.events
            .password_reset_requested(PasswordResetRequested {
                user_id: token.user_id.clone(),
                email: token.email.clone(),
                token: token.token.clone(),
                expires_at: token.expires_at,
                reset_url,
            })
            .await?;

        record_detached(
            &self.audit,
            AuditRecord::success(
                AuditEvent::PasswordResetRequested,
                Some(&user.user_id),
                Some(&user.username),
                ctx,
            ),
        );

        Ok(())
    }

    /// Consume a recovery token and set a new password.
    ///
    /// A token that is unknown or already used fails `ResetTokenInvalid`;
    /// one past its expiry fails `ResetTokenExpired`. The token transitions
    /// to `Used` only after the directory write succeeds.
    pub async fn reset(
        &self,
        token: &str,
        new_password: &str,
        ctx: &RequestContext,
    ) -> Result<PasswordChangeResult> {
        debug!("processing password reset");

        let result = self.reset_inner(token, new_password, ctx).await;

        if let Err(e) = &result {
            match e {
                Error::Password(PasswordError::ResetTokenInvalid)
                | Error::Password(PasswordError::ResetTokenExpired) => {}
                other => {
                    record_detached(
                        &self.audit,
                        AuditRecord::failure(
                            AuditEvent::PasswordResetFailed,
                            None,
                            &other.to_string(),
                            ctx,
                        ),
                    );
                }
            }
        }

        result
    }

    async fn reset_inner(
        &self,
        token: &str,
        new_password: &str,
        ctx: &RequestContext,
    ) -> Result<PasswordChangeResult> {
        let record = self
            .store
            .find_by_token(token)
            .await?
            .ok_or(PasswordError::ResetTokenInvalid)?;

        if record.is_used() || record.status == crate::core::types::ResetTokenStatus::Cancelled {
            return Err(PasswordError::ResetTokenInvalid.into());
        }
        if record.is_expired() {
            return Err(PasswordError::ResetTokenExpired.into());
        }

        self.policy.validate(new_password)?;

        self.passwords
            .reset_password(&record.user_id, new_password)
            .await?;
        self.store.mark_used(token).await?;

        info!(user_id = %record.user_id, "password reset completed");
        record_detached(
            &self.audit,
            AuditRecord::success(
                AuditEvent::PasswordResetCompleted,
                Some(&record.user_id),
                None,
                ctx,
            ),
        );

        Ok(PasswordChangeResult {
            user_id: record.user_id,
            change_type: PasswordChangeKind::Reset,
        })
    }

    /// Change a password with knowledge of the current one
    pub async fn update(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
        ctx: &RequestContext,
    ) -> Result<PasswordChangeResult> {
        debug!(user_id, "processing password update");

        if !self
            .passwords
            .verify_password(user_id, current_password)
            .await?
        {
            return Err(PasswordError::CurrentPasswordMismatch.into());
        }

        self.policy.validate(new_password)?;

        self.passwords.change_password(user_id, new_password).await?;

        info!(user_id, "password updated");
        record_detached(
            &self.audit,
            AuditRecord::success(AuditEvent::PasswordUpdated, Some(user_id), None, ctx),
        );

        Ok(PasswordChangeResult {
            user_id: user_id.to_string(),
            change_type: PasswordChangeKind::Update,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::core::audit::MemoryAuditSink;
    use crate::core::types::AuthenticatedUser;

    /// Directory stub covering lookup + password writes
    #[derive(Default)]
    struct StubPasswordDirectory {
        user: Option<AuthenticatedUser>,
        current_password: Mutex<String>,
        written: Mutex<Vec<(String, String)>>,
    }

    impl StubPasswordDirectory {
        fn with_user() -> Arc<Self> {
            Arc::new(Self {
                user: Some(AuthenticatedUser {
                    user_id: "u-alice".to_string(),
                    username: "alice".to_string(),
                    email: "alice@example.com".to_string(),
                    first_name: None,
                    last_name: None,
                    roles: HashSet::new(),
                    groups: HashSet::new(),
                    enabled: true,
                }),
                current_password: Mutex::new("Old-Passw0rd!".to_string()),
                written: Mutex::new(Vec::new()),
            })
        }

        fn empty() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn written(&self) -> Vec<(String, String)> {
            self.written.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl UserLookup for StubPasswordDirectory {
        async fn find_by_email(&self, email: &str) -> crate::error::Result<Option<AuthenticatedUser>> {
            Ok(self.user.clone().filter(|u| u.email == email))
        }
    }

    #[async_trait]
    impl DirectoryPasswords for StubPasswordDirectory {
        async fn verify_password(
            &self,
            _user_id: &str,
            current_password: &str,
        ) -> crate::error::Result<bool> {
            Ok(*self.current_password.lock().unwrap() == current_password)
        }

        async fn reset_password(
            &self,
            user_id: &str,
            new_password: &str,
        ) -> crate::error::Result<()> {
            *self.current_password.lock().unwrap() = new_password.to_string();
            self.written
                .lock()
                .unwrap()
                .push((user_id.to_string(), new_password.to_string()));
            Ok(())
        }

        async fn change_password(
            &self,
            user_id: &str,
            new_password: &str,
        ) -> crate::error::Result<()> {
            self.reset_password(user_id, new_password).await
        }
    }

    struct Harness {
        flows: PasswordFlows,
        directory: Arc<StubPasswordDirectory>,
        store: Arc<MemoryResetTokenStore>,
        events: Arc<MemoryEventSink>,
        audit: Arc<MemoryAuditSink>,
    }

    fn harness_with(directory: Arc<StubPasswordDirectory>) -> Harness {
        let store = Arc::new(MemoryResetTokenStore::new());
        let events = Arc::new(MemoryEventSink::new());
        let audit = Arc::new(MemoryAuditSink::new());

        let flows = PasswordFlows::new(
            directory.clone(),
            directory.clone(),
            store.clone(),
            events.clone(),
            audit.clone() as Arc<dyn AuditSink>,
            &PasswordConfig::default(),
        );

        Harness {
            flows,
            directory,
            store,
            events,
            audit,
        }
    }

    fn harness() -> Harness {
        harness_with(StubPasswordDirectory::with_user())
    }

    fn ctx() -> RequestContext {
        RequestContext::new("corr-1", "10.0.0.1", "test-agent")
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    #[tokio::test]
    async fn test_recover_unknown_email_silently_succeeds() {
        let h = harness_with(StubPasswordDirectory::empty());

        h.flows.recover("nobody@example.com", &ctx()).await.unwrap();

        assert!(h.events.events().is_empty());
        settle().await;
        assert!(h.audit.records().is_empty());
    }

    #[tokio::test]
    async fn test_recover_creates_token_and_publishes_event() {
        let h = harness();

        h.flows.recover("alice@example.com", &ctx()).await.unwrap();

        let events = h.events.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].user_id, "u-alice");
        assert!(events[0].reset_url.contains(&events[0].token));

        let tokens = h.store.tokens_for_user("u-alice");
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_valid());

        settle().await;
        let records = h.audit.records();
        assert!(records
            .iter()
            .any(|r| r.event_type == AuditEvent::PasswordResetRequested));
    }

    #[tokio::test]
    async fn test_second_recovery_cancels_first_token() {
        let h = harness();

        h.flows.recover("alice@example.com", &ctx()).await.unwrap();
        let first_token = h.events.events()[0].token.clone();

        h.flows.recover("alice@example.com", &ctx()).await.unwrap();

        // exactly one pending token remains, and it is not the first
        let pending: Vec<_> = h
            .store
            .tokens_for_user("u-alice")
            .into_iter()
            .filter(|t| t.is_valid())
            .collect();
        assert_eq!(pending.len(), 1);
        assert_ne!(pending[0].token, first_token);

        // consuming the superseded token fails
        let result = h.flows.reset(&first_token, "New-Passw0rd!", &ctx()).await;
        assert!(matches!(
            result,
            Err(Error::Password(PasswordError::ResetTokenInvalid))
        ));
    }

    #[tokio::test]
    async fn test_reset_consumes_token_exactly_once() {
        let h = harness();
        h.flows.recover("alice@example.com", &ctx()).await.unwrap();
        let token = h.events.events()[0].token.clone();

        let result = h.flows.reset(&token, "New-Passw0rd!", &ctx()).await.unwrap();
        assert_eq!(result.user_id, "u-alice");
        assert_eq!(result.change_type, PasswordChangeKind::Reset);
        assert_eq!(
            h.directory.written(),
            vec![("u-alice".to_string(), "New-Passw0rd!".to_string())]
        );

        // second consumption fails
        let result = h.flows.reset(&token, "Other-Passw0rd1!", &ctx()).await;
        assert!(matches!(
            result,
            Err(Error::Password(PasswordError::ResetTokenInvalid))
        ));
    }

    #[tokio::test]
    async fn test_reset_with_unknown_token_fails_invalid() {
        let h = harness();
        let result = h.flows.reset("no-such-token", "New-Passw0rd!", &ctx()).await;
        assert!(matches!(
            result,
            Err(Error::Password(PasswordError::ResetTokenInvalid))
        ));
    }

    #[tokio::test]
    async fn test_reset_with_expired_token_fails_expired() {
        let h = harness();

        let mut token =
            PasswordResetToken::create("u-alice", "alice@example.com", Duration::from_secs(1800));
        token.expires_at = chrono::Utc::now() - chrono::TimeDelta::seconds(1);
        h.store.save(&token).await.unwrap();

        let result = h.flows.reset(&token.token, "New-Passw0rd!", &ctx()).await;
        assert!(matches!(
            result,
            Err(Error::Password(PasswordError::ResetTokenExpired))
        ));
        assert!(h.directory.written().is_empty());
    }

    #[tokio::test]
    async fn test_reset_rejects_weak_password_and_keeps_token() {
        let h = harness();
        h.flows.recover("alice@example.com", &ctx()).await.unwrap();
        let token = h.events.events()[0].token.clone();

        let result = h.flows.reset(&token, "weak", &ctx()).await;
        assert!(matches!(
            result,
            Err(Error::Password(PasswordError::ValidationFailed(_)))
        ));
        assert!(h.directory.written().is_empty());

        // the token survives the failed attempt
        let record = h.store.find_by_token(&token).await.unwrap().unwrap();
        assert!(record.is_valid());
    }

    #[tokio::test]
    async fn test_update_rejects_wrong_current_password() {
        let h = harness();

        let result = h
            .flows
            .update("u-alice", "not-the-password", "New-Passw0rd!", &ctx())
            .await;
        assert!(matches!(
            result,
            Err(Error::Password(PasswordError::CurrentPasswordMismatch))
        ));
        assert!(h.directory.written().is_empty());
    }

    #[tokio::test]
    async fn test_update_changes_password_and_audits() {
        let h = harness();

        let result = h
            .flows
            .update("u-alice", "Old-Passw0rd!", "New-Passw0rd!", &ctx())
            .await
            .unwrap();
        assert_eq!(result.change_type, PasswordChangeKind::Update);
        assert_eq!(h.directory.written().len(), 1);

        settle().await;
        assert!(h
            .audit
            .records()
            .iter()
            .any(|r| r.event_type == AuditEvent::PasswordUpdated));
    }

    #[tokio::test]
    async fn test_update_validates_new_password_policy() {
        let h = harness();

        let result = h.flows.update("u-alice", "Old-Passw0rd!", "weak", &ctx()).await;
        assert!(matches!(
            result,
            Err(Error::Password(PasswordError::ValidationFailed(_)))
        ));
        assert!(h.directory.written().is_empty());
    }
}
