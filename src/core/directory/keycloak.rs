//! Keycloak / OIDC backend
//!
//! End-user authentication uses the Resource-Owner-Password-Credentials
//! grant against the realm token endpoint, with profile attributes from the
//! `userinfo` endpoint and roles decoded from the returned access token.
//! Administrative operations (profile lookup, email lookup, password writes)
//! use a `client_credentials` grant against the Admin API.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::groups::normalize_roles;
use super::{Directory, DirectoryPasswords, UserLookup};
use crate::config::KeycloakConfig;
use crate::core::types::{AuthenticatedUser, Credentials};
use crate::error::{AuthError, Error, Result};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Directory backend for Keycloak
pub struct KeycloakDirectory {
    client: reqwest::Client,
    config: KeycloakConfig,
}

impl KeycloakDirectory {
    pub fn new(config: KeycloakConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(Error::Http)?;
        Ok(Self { client, config })
    }

    fn base(&self) -> &str {
        self.config.server_url.trim_end_matches('/')
    }

    fn token_endpoint(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.base(),
            self.config.realm
        )
    }

    fn userinfo_endpoint(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/userinfo",
            self.base(),
            self.config.realm
        )
    }

    fn admin_users_endpoint(&self) -> String {
        format!("{}/admin/realms/{}/users", self.base(), self.config.realm)
    }

    /// ROPC grant for an end user; returns the raw access token
    async fn request_password_token(&self, username: &str, password: &str) -> Result<String> {
        let response = self
            .client
            .post(self.token_endpoint())
            .form(&[
                ("grant_type", "password"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("username", username),
                ("password", password),
                ("scope", "openid profile email"),
            ])
            .send()
            .await
            .map_err(|e| transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_token_error(status, &body, username));
        }

        let token: TokenResponse = response.json().await.map_err(|e| transport(&e))?;
        token.access_token.ok_or_else(|| {
            AuthError::DirectoryUnavailable("no access_token in keycloak response".to_string())
                .into()
        })
    }

    /// client_credentials grant for Admin API calls
    async fn request_admin_token(&self) -> Result<String> {
        let response = self
            .client
            .post(self.token_endpoint())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::DirectoryUnavailable(format!(
                "failed to obtain client credentials token: {status}: {body}"
            ))
            .into());
        }

        let token: TokenResponse = response.json().await.map_err(|e| transport(&e))?;
        token.access_token.ok_or_else(|| {
            AuthError::DirectoryUnavailable(
                "no access_token in client credentials response".to_string(),
            )
            .into()
        })
    }

    async fn fetch_userinfo(&self, access_token: &str) -> Result<Value> {
        let response = self
            .client
            .get(self.userinfo_endpoint())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| transport(&e))?;

        if !response.status().is_success() {
            return Err(AuthError::DirectoryUnavailable(
                "failed to fetch userinfo from keycloak".to_string(),
            )
            .into());
        }

        response.json().await.map_err(|e| transport(&e))
    }

    async fn fetch_admin_user(&self, admin_token: &str, query: &[(&str, &str)]) -> Result<Option<Value>> {
        let response = self
            .client
            .get(self.admin_users_endpoint())
            .query(query)
            .bearer_auth(admin_token)
            .send()
            .await
            .map_err(|e| transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::DirectoryUnavailable(format!(
                "keycloak admin user query failed: {status}: {body}"
            ))
            .into());
        }

        let users: Vec<Value> = response.json().await.map_err(|e| transport(&e))?;
        Ok(users.into_iter().next())
    }

    /// Realm role names for a user; lookup failures degrade to no roles
    async fn fetch_realm_roles(&self, admin_token: &str, user_id: &str) -> Vec<String> {
        let url = format!("{}/{}/role-mappings/realm", self.admin_users_endpoint(), user_id);

        let response = match self.client.get(url).bearer_auth(admin_token).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!(user_id, status = %r.status(), "keycloak role-mapping lookup failed");
                return Vec::new();
            }
            Err(e) => {
                warn!(user_id, "keycloak role-mapping lookup failed: {e}");
                return Vec::new();
            }
        };

        let roles: Vec<Value> = response.json().await.unwrap_or_default();
        roles
            .iter()
            .filter_map(|r| r.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }

    /// Map ROPC token claims + userinfo into the canonical profile
    fn map_user(&self, token_claims: &Value, userinfo: &Value) -> AuthenticatedUser {
        let claim = |key: &str| -> Option<String> {
            userinfo
                .get(key)
                .or_else(|| token_claims.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        let username = claim("preferred_username").unwrap_or_default();
        let email = claim("email").unwrap_or_else(|| format!("{username}@unknown.local"));

        let groups: HashSet<String> = userinfo
            .get("groups")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        AuthenticatedUser {
            user_id: claim("sub").unwrap_or_else(|| username.clone()),
            username,
            email,
            first_name: claim("given_name"),
            last_name: claim("family_name"),
            roles: self.extract_roles(token_claims),
            groups,
            enabled: true,
        }
    }

    /// Roles from the access token's realm/client role claims, normalized
    fn extract_roles(&self, token_claims: &Value) -> HashSet<String> {
        let mut raw: Vec<String> = Vec::new();

        if self.config.use_realm_roles {
            if let Some(roles) = token_claims
                .pointer("/realm_access/roles")
                .and_then(Value::as_array)
            {
                raw.extend(roles.iter().filter_map(Value::as_str).map(str::to_string));
            }
        }

        if self.config.use_client_roles {
            let pointer = format!("/resource_access/{}/roles", self.config.roles_client_id());
            if let Some(roles) = token_claims.pointer(&pointer).and_then(Value::as_array) {
                raw.extend(roles.iter().filter_map(Value::as_str).map(str::to_string));
            }
        }

        normalize_roles(raw)
    }

    fn map_admin_user(user: &Value, realm_roles: Vec<String>) -> AuthenticatedUser {
        let field = |key: &str| user.get(key).and_then(Value::as_str).map(str::to_string);

        let username = field("username").unwrap_or_default();
        let email = field("email").unwrap_or_else(|| format!("{username}@unknown.local"));

        AuthenticatedUser {
            user_id: field("id").unwrap_or_else(|| username.clone()),
            username,
            email,
            first_name: field("firstName"),
            last_name: field("lastName"),
            roles: normalize_roles(realm_roles),
            groups: HashSet::new(),
            enabled: user.get("enabled").and_then(Value::as_bool).unwrap_or(true),
        }
    }

    async fn lookup_username_by_id(&self, admin_token: &str, user_id: &str) -> Result<String> {
        let url = format!("{}/{}", self.admin_users_endpoint(), user_id);

        let response = self
            .client
            .get(url)
            .bearer_auth(admin_token)
            .send()
            .await
            .map_err(|e| transport(&e))?;

        if !response.status().is_success() {
            return Err(AuthError::DirectoryUnavailable(format!(
                "keycloak user lookup failed for id {user_id}"
            ))
            .into());
        }

        let user: Value = response.json().await.map_err(|e| transport(&e))?;
        user.get("username")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::internal(format!("keycloak user {user_id} has no username")))
    }

    async fn put_password(&self, user_id: &str, new_password: &str) -> Result<()> {
        let admin_token = self.request_admin_token().await?;
        let url = format!("{}/{}/reset-password", self.admin_users_endpoint(), user_id);

        let response = self
            .client
            .put(url)
            .bearer_auth(&admin_token)
            .json(&serde_json::json!({
                "type": "password",
                "value": new_password,
                "temporary": false,
            }))
            .send()
            .await
            .map_err(|e| transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::internal(format!(
                "failed to set password in keycloak: {status}: {body}"
            )));
        }

        info!(user_id, "password written via keycloak admin api");
        Ok(())
    }
}

#[async_trait]
impl Directory for KeycloakDirectory {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthenticatedUser> {
        debug!(username = credentials.username(), "authenticating via keycloak");

        let access_token = self
            .request_password_token(credentials.username(), credentials.password())
            .await?;

        let token_claims = decode_token_payload(&access_token);
        let userinfo = self.fetch_userinfo(&access_token).await?;

        Ok(self.map_user(&token_claims, &userinfo))
    }

    async fn find_by_username(&self, username: &str) -> Result<AuthenticatedUser> {
        debug!(username, "looking up user via keycloak admin api");

        let admin_token = self.request_admin_token().await?;
        let user = self
            .fetch_admin_user(&admin_token, &[("username", username), ("exact", "true")])
            .await?
            .ok_or_else(|| Error::Auth(AuthError::InvalidCredentials(username.to_string())))?;

        let roles = match user.get("id").and_then(Value::as_str) {
            Some(id) => self.fetch_realm_roles(&admin_token, id).await,
            None => Vec::new(),
        };

        Ok(Self::map_admin_user(&user, roles))
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/realms/{}", self.base(), self.config.realm);
        match self.client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("keycloak unavailable: {e}");
                false
            }
        }
    }
}

#[async_trait]
impl DirectoryPasswords for KeycloakDirectory {
    async fn verify_password(&self, user_id: &str, current_password: &str) -> Result<bool> {
        let admin_token = self.request_admin_token().await?;
        let username = self.lookup_username_by_id(&admin_token, user_id).await?;

        match self.request_password_token(&username, current_password).await {
            Ok(_) => Ok(true),
            Err(Error::Auth(AuthError::InvalidCredentials(_))) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn reset_password(&self, user_id: &str, new_password: &str) -> Result<()> {
        self.put_password(user_id, new_password).await
    }

    async fn change_password(&self, user_id: &str, new_password: &str) -> Result<()> {
        self.put_password(user_id, new_password).await
    }
}

#[async_trait]
impl UserLookup for KeycloakDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<AuthenticatedUser>> {
        debug!(email, "looking up user by email via keycloak admin api");

        let admin_token = self.request_admin_token().await?;
        let user = self
            .fetch_admin_user(&admin_token, &[("email", email), ("exact", "true")])
            .await?;

        Ok(user.map(|u| Self::map_admin_user(&u, Vec::new())))
    }
}

/// Decode the payload segment of a JWT without verifying its signature.
///
/// The token was just handed to us by the issuer over TLS; this is a claim
/// read, not a trust decision.
fn decode_token_payload(token: &str) -> Value {
    let Some(payload) = token.split('.').nth(1) else {
        return Value::Object(Default::default());
    };

    URL_SAFE_NO_PAD
        .decode(payload)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_else(|| {
            warn!("failed to decode keycloak access token payload");
            Value::Object(Default::default())
        })
}

/// Map a token-endpoint error response onto the authentication taxonomy
fn classify_token_error(status: StatusCode, body: &str, username: &str) -> Error {
    if status.is_client_error() {
        if let Ok(error_body) = serde_json::from_str::<Value>(body) {
            let error = error_body.get("error").and_then(Value::as_str);
            let description = error_body
                .get("error_description")
                .and_then(Value::as_str)
                .unwrap_or_default();

            if error == Some("invalid_grant") {
                if description.to_lowercase().contains("disabled") {
                    warn!(username, "keycloak reports account disabled");
                    return AuthError::AccountDisabled(username.to_string()).into();
                }
                warn!(username, "keycloak rejected credentials");
                return AuthError::InvalidCredentials(username.to_string()).into();
            }
        }
    }

    AuthError::DirectoryUnavailable(format!(
        "keycloak token endpoint returned {status}: {body}"
    ))
    .into()
}

fn transport(err: &reqwest::Error) -> Error {
    AuthError::DirectoryUnavailable(err.to_string()).into()
}
