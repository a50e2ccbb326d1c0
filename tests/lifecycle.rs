//! End-to-end token lifecycle through the public API

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use authgate::core::audit::MemoryAuditSink;
use authgate::core::session::{MemoryRevocationList, MemorySessionStore};
use authgate::{
    AuthError, Authenticator, Credentials, Directory, Error, RequestContext, Result, TokenCodec,
    TokenError, TokenKind, AuthenticatedUser,
};

struct FixedDirectory {
    user: AuthenticatedUser,
}

impl FixedDirectory {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            user: AuthenticatedUser {
                user_id: "u-alice".to_string(),
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                first_name: Some("Alice".to_string()),
                last_name: Some("Liddell".to_string()),
                roles: HashSet::from(["ROLE_USER".to_string()]),
                groups: HashSet::new(),
                enabled: true,
            },
        })
    }
}

#[async_trait]
impl Directory for FixedDirectory {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthenticatedUser> {
        if credentials.password() == "correct-pw" {
            Ok(self.user.clone())
        } else {
            Err(AuthError::InvalidCredentials(credentials.username().to_string()).into())
        }
    }

    async fn find_by_username(&self, _username: &str) -> Result<AuthenticatedUser> {
        Ok(self.user.clone())
    }

    async fn is_available(&self) -> bool {
        true
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

fn codec() -> TokenCodec {
    TokenCodec::new(&authgate::config::TokenConfig {
        access_secret: "integration-access-secret-0123456789abcd".to_string(),
        refresh_secret: "integration-refresh-secret-0123456789abc".to_string(),
        access_ttl_secs: 900,
        refresh_ttl_secs: 604_800,
        issuer: "authgate-integration".to_string(),
    })
}

fn authenticator() -> (Authenticator, TokenCodec) {
    init_tracing();
    let codec = codec();
    let auth = Authenticator::new(
        FixedDirectory::new(),
        codec.clone(),
        Arc::new(MemorySessionStore::new()),
        Arc::new(MemoryRevocationList::new()),
        Arc::new(MemoryAuditSink::new()),
    );
    (auth, codec)
}

fn ctx() -> RequestContext {
    RequestContext::generated("203.0.113.7", "integration-test")
}

#[tokio::test]
async fn rotation_chain_retires_every_predecessor() {
    let (auth, codec) = authenticator();
    let creds = Credentials::new("alice", "correct-pw", Some("laptop-1")).unwrap();

    let signed_in = auth.sign_in(&creds, &ctx()).await.unwrap();

    // rotate three times; each step must retire its predecessor
    let mut current = signed_in.tokens.refresh_token.clone();
    let mut retired = Vec::new();

    for _ in 0..3 {
        let rotated = auth.refresh_token(&current, &ctx()).await.unwrap();
        retired.push(current);
        current = rotated.refresh_token;
    }

    for stale in &retired {
        let result = auth.refresh_token(stale, &ctx()).await;
        assert!(matches!(result, Err(Error::Token(TokenError::Revoked))));
    }

    // replay of a retired token nukes the live session too
    let result = auth.refresh_token(&current, &ctx()).await;
    assert!(matches!(result, Err(Error::Token(TokenError::NotFound))));

    // recovery is a fresh sign-in
    let recovered = auth.sign_in(&creds, &ctx()).await.unwrap();
    let claims = codec
        .validate(&recovered.tokens.refresh_token, TokenKind::Refresh)
        .unwrap();
    assert_eq!(claims.user_id, "u-alice");
    assert_eq!(claims.device_id, "laptop-1");
}

#[tokio::test]
async fn sign_out_closes_the_session() {
    let (auth, _) = authenticator();
    let creds = Credentials::new("alice", "correct-pw", Some("laptop-1")).unwrap();

    let signed_in = auth.sign_in(&creds, &ctx()).await.unwrap();
    auth.sign_out(
        &signed_in.tokens.access_token,
        Some(&signed_in.tokens.refresh_token),
        &ctx(),
    )
    .await
    .unwrap();

    let result = auth
        .refresh_token(&signed_in.tokens.refresh_token, &ctx())
        .await;
    assert!(matches!(result, Err(Error::Token(TokenError::NotFound))));
}

#[tokio::test]
async fn devices_are_isolated_until_reuse_is_detected() {
    let (auth, _) = authenticator();
    let laptop = Credentials::new("alice", "correct-pw", Some("laptop-1")).unwrap();
    let phone = Credentials::new("alice", "correct-pw", Some("phone-1")).unwrap();

    let on_laptop = auth.sign_in(&laptop, &ctx()).await.unwrap();
    let on_phone = auth.sign_in(&phone, &ctx()).await.unwrap();

    // rotating on the laptop leaves the phone session untouched
    let rotated = auth
        .refresh_token(&on_laptop.tokens.refresh_token, &ctx())
        .await
        .unwrap();
    assert!(auth
        .refresh_token(&on_phone.tokens.refresh_token, &ctx())
        .await
        .is_ok());

    // but a replayed laptop token kills every device
    let result = auth
        .refresh_token(&on_laptop.tokens.refresh_token, &ctx())
        .await;
    assert!(matches!(result, Err(Error::Token(TokenError::Revoked))));

    let result = auth.refresh_token(&rotated.refresh_token, &ctx()).await;
    assert!(matches!(result, Err(Error::Token(TokenError::NotFound))));
}
