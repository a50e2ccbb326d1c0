//! Orchestrator tests over a stub directory and in-memory stores

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::Authenticator;
use crate::config::{ResilienceConfig, TokenConfig};
use crate::core::audit::{AuditEvent, AuditSink, MemoryAuditSink};
use crate::core::directory::{Directory, ResilientDirectory};
use crate::core::session::{
    MemoryRevocationList, MemorySessionStore, RevocationList, SessionStore,
};
use crate::core::tokens::TokenCodec;
use crate::core::types::{
    AuthenticatedUser, Credentials, RequestContext, TokenKind,
};
use crate::error::{AuthError, Error, Result, TokenError};

/// Directory stub with a single scripted user
struct StubDirectory {
    user: Mutex<AuthenticatedUser>,
    fail_auth: Mutex<Option<AuthError>>,
    auth_calls: AtomicU32,
}

impl StubDirectory {
    fn with_user(user: AuthenticatedUser) -> Arc<Self> {
        Arc::new(Self {
            user: Mutex::new(user),
            fail_auth: Mutex::new(None),
            auth_calls: AtomicU32::new(0),
        })
    }

    fn set_roles(&self, roles: &[&str]) {
        self.user.lock().unwrap().roles = roles.iter().map(|r| r.to_string()).collect();
    }

    fn set_enabled(&self, enabled: bool) {
        self.user.lock().unwrap().enabled = enabled;
    }

    fn fail_with(&self, err: AuthError) {
        *self.fail_auth.lock().unwrap() = Some(err);
    }
}

#[async_trait]
impl Directory for StubDirectory {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthenticatedUser> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.fail_auth.lock().unwrap().clone() {
            return Err(err.into());
        }
        if credentials.password() != "correct-pw" {
            return Err(AuthError::InvalidCredentials(credentials.username().to_string()).into());
        }
        Ok(self.user.lock().unwrap().clone())
    }

    async fn find_by_username(&self, username: &str) -> Result<AuthenticatedUser> {
        let user = self.user.lock().unwrap().clone();
        if user.username != username {
            return Err(AuthError::InvalidCredentials(username.to_string()).into());
        }
        Ok(user)
    }

    async fn is_available(&self) -> bool {
        true
    }
}

struct Harness {
    auth: Authenticator,
    directory: Arc<StubDirectory>,
    sessions: Arc<MemorySessionStore>,
    revocations: Arc<MemoryRevocationList>,
    audit: Arc<MemoryAuditSink>,
    codec: TokenCodec,
}

fn alice() -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: "u-alice".to_string(),
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        first_name: Some("Alice".to_string()),
        last_name: None,
        roles: HashSet::from(["ROLE_USER".to_string()]),
        groups: HashSet::new(),
        enabled: true,
    }
}

fn codec_config() -> TokenConfig {
    TokenConfig {
        access_secret: "access-secret-for-tests-0123456789abcdef".to_string(),
        refresh_secret: "refresh-secret-for-tests-0123456789abcde".to_string(),
        access_ttl_secs: 900,
        refresh_ttl_secs: 604_800,
        issuer: "authgate-test".to_string(),
    }
}

fn harness() -> Harness {
    let directory = StubDirectory::with_user(alice());
    let sessions = Arc::new(MemorySessionStore::new());
    let revocations = Arc::new(MemoryRevocationList::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let codec = TokenCodec::new(&codec_config());

    let auth = Authenticator::new(
        directory.clone(),
        codec.clone(),
        sessions.clone(),
        revocations.clone(),
        audit.clone() as Arc<dyn AuditSink>,
    );

    Harness {
        auth,
        directory,
        sessions,
        revocations,
        audit,
        codec,
    }
}

fn ctx() -> RequestContext {
    RequestContext::new("corr-1", "10.0.0.1", "test-agent")
}

fn creds(device: &str) -> Credentials {
    Credentials::new("alice", "correct-pw", Some(device)).unwrap()
}

/// Let detached audit tasks drain
async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

fn audited(audit: &MemoryAuditSink, event: AuditEvent) -> bool {
    audit.records().iter().any(|r| r.event_type == event)
}

#[tokio::test]
async fn test_sign_in_stores_session_and_returns_tokens() {
    let h = harness();

    let outcome = h.auth.sign_in(&creds("dev1"), &ctx()).await.unwrap();

    assert!(!outcome.tokens.access_token.is_empty());
    assert!(!outcome.tokens.refresh_token.is_empty());
    assert_eq!(outcome.tokens.token_type, "Bearer");
    assert!(outcome.user.roles.contains("ROLE_USER"));

    let refresh_claims = h
        .codec
        .validate(&outcome.tokens.refresh_token, TokenKind::Refresh)
        .unwrap();
    let stored = h.sessions.retrieve("u-alice", "dev1").await.unwrap().unwrap();
    assert_eq!(stored.jti, refresh_claims.jti);

    settle().await;
    assert!(audited(&h.audit, AuditEvent::SignInSuccess));
}

#[tokio::test]
async fn test_sign_in_wrong_password_rejected_and_audited() {
    let h = harness();
    let bad = Credentials::new("alice", "wrong-pw", Some("dev1")).unwrap();

    let result = h.auth.sign_in(&bad, &ctx()).await;
    assert!(matches!(
        result,
        Err(Error::Auth(AuthError::InvalidCredentials(_)))
    ));
    assert!(h.sessions.is_empty());

    settle().await;
    let records = h.audit.records();
    let failure = records
        .iter()
        .find(|r| r.event_type == AuditEvent::SignInFailure)
        .unwrap();
    assert!(!failure.success);
    assert!(failure.failure_reason.as_deref().unwrap().contains("invalid credentials"));
}

#[tokio::test]
async fn test_sign_in_disabled_account_rejected() {
    let h = harness();
    h.directory.set_enabled(false);

    let result = h.auth.sign_in(&creds("dev1"), &ctx()).await;
    assert!(matches!(
        result,
        Err(Error::Auth(AuthError::AccountDisabled(_)))
    ));
    assert!(h.sessions.is_empty());
}

#[tokio::test]
async fn test_gateway_failure_propagates_unchanged() {
    let h = harness();
    h.directory
        .fail_with(AuthError::AccountLocked("alice".to_string()));

    let result = h.auth.sign_in(&creds("dev1"), &ctx()).await;
    assert!(matches!(
        result,
        Err(Error::Auth(AuthError::AccountLocked(user))) if user == "alice"
    ));
}

#[tokio::test]
async fn test_second_sign_in_leaves_single_session_for_device() {
    let h = harness();

    let _first = h.auth.sign_in(&creds("dev1"), &ctx()).await.unwrap();
    let second = h.auth.sign_in(&creds("dev1"), &ctx()).await.unwrap();

    assert_eq!(h.sessions.len(), 1);

    let second_claims = h
        .codec
        .validate(&second.tokens.refresh_token, TokenKind::Refresh)
        .unwrap();
    let stored = h.sessions.retrieve("u-alice", "dev1").await.unwrap().unwrap();
    assert_eq!(stored.jti, second_claims.jti);
}

#[tokio::test]
async fn test_refresh_rotates_and_revokes_predecessor() {
    let h = harness();

    let signed_in = h.auth.sign_in(&creds("dev1"), &ctx()).await.unwrap();
    let r1 = signed_in.tokens.refresh_token.clone();
    let r1_claims = h.codec.validate(&r1, TokenKind::Refresh).unwrap();

    let rotated = h.auth.refresh_token(&r1, &ctx()).await.unwrap();
    let r2_claims = h
        .codec
        .validate(&rotated.refresh_token, TokenKind::Refresh)
        .unwrap();

    // the old jti is revoked, the session now holds the new one
    assert!(h.revocations.is_revoked(&r1_claims.jti).await.unwrap());
    let stored = h.sessions.retrieve("u-alice", "dev1").await.unwrap().unwrap();
    assert_eq!(stored.jti, r2_claims.jti);

    settle().await;
    assert!(audited(&h.audit, AuditEvent::TokenRefresh));
}

#[tokio::test]
async fn test_replayed_refresh_token_cascades_to_all_sessions() {
    let h = harness();

    // sessions on two devices
    let signed_in = h.auth.sign_in(&creds("dev1"), &ctx()).await.unwrap();
    let _other_device = h.auth.sign_in(&creds("dev2"), &ctx()).await.unwrap();
    let r1 = signed_in.tokens.refresh_token.clone();

    // first use rotates, second use is a replay
    let rotated = h.auth.refresh_token(&r1, &ctx()).await.unwrap();
    let result = h.auth.refresh_token(&r1, &ctx()).await;
    assert!(matches!(result, Err(Error::Token(TokenError::Revoked))));

    // containment: every device's session is gone
    assert!(h.sessions.is_empty());

    // the pair issued by the legitimate rotation is dead too
    let result = h.auth.refresh_token(&rotated.refresh_token, &ctx()).await;
    assert!(matches!(result, Err(Error::Token(TokenError::NotFound))));

    // a fresh sign-in recovers
    assert!(h.auth.sign_in(&creds("dev1"), &ctx()).await.is_ok());

    settle().await;
    assert!(audited(&h.audit, AuditEvent::TokenReuseDetected));
}

#[tokio::test]
async fn test_superseded_but_unrevoked_token_fails_mismatch() {
    let h = harness();

    // two sign-ins: the second overwrites the session record, but the first
    // refresh token was never revoked
    let first = h.auth.sign_in(&creds("dev1"), &ctx()).await.unwrap();
    let _second = h.auth.sign_in(&creds("dev1"), &ctx()).await.unwrap();

    let result = h
        .auth
        .refresh_token(&first.tokens.refresh_token, &ctx())
        .await;
    assert!(matches!(result, Err(Error::Token(TokenError::Mismatch))));
}

#[tokio::test]
async fn test_refresh_reresolves_roles_from_directory() {
    let h = harness();

    let signed_in = h.auth.sign_in(&creds("dev1"), &ctx()).await.unwrap();
    h.directory.set_roles(&["ROLE_USER", "ROLE_ADMIN"]);

    let rotated = h
        .auth
        .refresh_token(&signed_in.tokens.refresh_token, &ctx())
        .await
        .unwrap();

    let access = h
        .codec
        .validate(&rotated.access_token, TokenKind::Access)
        .unwrap();
    assert!(access.roles.contains("ROLE_ADMIN"));
}

#[tokio::test]
async fn test_refresh_without_session_fails_not_found() {
    let h = harness();

    // cryptographically valid token, but no session was ever stored
    let pair = h.codec.issue(&alice(), "dev1").unwrap();
    let result = h.auth.refresh_token(&pair.refresh_token, &ctx()).await;
    assert!(matches!(result, Err(Error::Token(TokenError::NotFound))));
}

#[tokio::test]
async fn test_refresh_rejects_blank_identity_claims() {
    let h = harness();

    let mut ghost = alice();
    ghost.user_id = String::new();
    let pair = h.codec.issue(&ghost, "dev1").unwrap();

    let result = h.auth.refresh_token(&pair.refresh_token, &ctx()).await;
    assert!(matches!(result, Err(Error::Token(TokenError::Malformed))));
}

#[tokio::test]
async fn test_sign_out_revokes_access_and_deletes_session() {
    let h = harness();

    let signed_in = h.auth.sign_in(&creds("dev1"), &ctx()).await.unwrap();
    let access_claims = h
        .codec
        .validate(&signed_in.tokens.access_token, TokenKind::Access)
        .unwrap();

    h.auth
        .sign_out(
            &signed_in.tokens.access_token,
            Some(&signed_in.tokens.refresh_token),
            &ctx(),
        )
        .await
        .unwrap();

    assert!(h.revocations.is_revoked(&access_claims.jti).await.unwrap());
    assert_eq!(h.sessions.retrieve("u-alice", "dev1").await.unwrap(), None);

    let result = h
        .auth
        .refresh_token(&signed_in.tokens.refresh_token, &ctx())
        .await;
    assert!(matches!(result, Err(Error::Token(TokenError::NotFound))));

    settle().await;
    assert!(audited(&h.audit, AuditEvent::SignOut));
}

#[tokio::test]
async fn test_sign_out_without_refresh_token_keeps_session() {
    let h = harness();

    let signed_in = h.auth.sign_in(&creds("dev1"), &ctx()).await.unwrap();
    h.auth
        .sign_out(&signed_in.tokens.access_token, None, &ctx())
        .await
        .unwrap();

    assert!(h.sessions.retrieve("u-alice", "dev1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_sign_out_with_invalid_access_token_has_no_side_effects() {
    let h = harness();

    let signed_in = h.auth.sign_in(&creds("dev1"), &ctx()).await.unwrap();
    let result = h
        .auth
        .sign_out("not-a-token", Some(&signed_in.tokens.refresh_token), &ctx())
        .await;

    assert!(matches!(result, Err(Error::Token(TokenError::Malformed))));
    assert!(h.sessions.retrieve("u-alice", "dev1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_refresh_token_wrong_kind_rejected() {
    let h = harness();

    let signed_in = h.auth.sign_in(&creds("dev1"), &ctx()).await.unwrap();
    // presenting the access token where a refresh token is required
    let result = h
        .auth
        .refresh_token(&signed_in.tokens.access_token, &ctx())
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_open_circuit_fails_sign_in_without_backend_call() {
    // a directory that is hard down
    struct DownDirectory {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Directory for DownDirectory {
        async fn authenticate(&self, _credentials: &Credentials) -> Result<AuthenticatedUser> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AuthError::DirectoryUnavailable("connection refused".to_string()).into())
        }

        async fn find_by_username(&self, _username: &str) -> Result<AuthenticatedUser> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AuthError::DirectoryUnavailable("connection refused".to_string()).into())
        }

        async fn is_available(&self) -> bool {
            false
        }
    }

    let down = Arc::new(DownDirectory {
        calls: AtomicU32::new(0),
    });
    let resilience = ResilienceConfig {
        failure_threshold: 3,
        min_requests: 3,
        success_threshold: 1,
        open_cooldown_secs: 60,
        retry_max_attempts: 1,
        retry_base_delay_ms: 1,
        retry_max_delay_ms: 2,
        ..ResilienceConfig::default()
    };
    let resilient = Arc::new(ResilientDirectory::new(down.clone(), &resilience));

    let auth = Authenticator::new(
        resilient,
        TokenCodec::new(&codec_config()),
        Arc::new(MemorySessionStore::new()),
        Arc::new(MemoryRevocationList::new()),
        Arc::new(MemoryAuditSink::new()) as Arc<dyn AuditSink>,
    );

    // trip the breaker
    for _ in 0..4 {
        let _ = auth.sign_in(&creds("dev1"), &ctx()).await;
    }
    let calls_before = down.calls.load(Ordering::SeqCst);

    // fails fast with no network call
    let result = auth.sign_in(&creds("dev1"), &ctx()).await;
    assert!(matches!(
        result,
        Err(Error::Auth(AuthError::DirectoryUnavailable(_)))
    ));
    assert_eq!(down.calls.load(Ordering::SeqCst), calls_before);
}
