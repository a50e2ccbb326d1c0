//! Active Directory backend
//!
//! Binds with the User Principal Name (`user@domain`) and reads the entry by
//! `sAMAccountName`. AD reports account state two ways, and both are
//! honored: bind diagnostics carry a sub-error code (`data 533` disabled,
//! `data 775` locked), and the `userAccountControl` attribute carries the
//! ACCOUNTDISABLE flag (bit 0x0002).

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, Scope, SearchEntry, ldap_escape};
use tracing::{debug, warn};

use super::groups::{group_cn, normalize_roles};
use super::Directory;
use crate::config::ActiveDirectoryConfig;
use crate::core::types::{AuthenticatedUser, Credentials};
use crate::error::{AuthError, Error, Result};

const ATTR_SAM_ACCOUNT_NAME: &str = "sAMAccountName";
const ATTR_MAIL: &str = "mail";
const ATTR_GIVEN_NAME: &str = "givenName";
const ATTR_SN: &str = "sn";
const ATTR_MEMBER_OF: &str = "memberOf";
const ATTR_USER_ACCOUNT_CONTROL: &str = "userAccountControl";

// ACCOUNTDISABLE bit of userAccountControl
const UAC_ACCOUNT_DISABLED: u32 = 0x0002;

// AD bind sub-error codes surfaced in the rc=49 diagnostic message
const SUBCODE_ACCOUNT_DISABLED: &str = "data 533";
const SUBCODE_ACCOUNT_LOCKED: &str = "data 775";

const RC_INVALID_CREDENTIALS: u32 = 49;

/// Directory backend for Microsoft Active Directory
pub struct ActiveDirectoryBackend {
    config: ActiveDirectoryConfig,
}

impl ActiveDirectoryBackend {
    pub fn new(config: ActiveDirectoryConfig) -> Self {
        Self { config }
    }

    async fn connect(&self) -> Result<Ldap> {
        let (conn, ldap) = LdapConnAsync::new(&self.config.url)
            .await
            .map_err(|e| unavailable(&e))?;
        ldap3::drive!(conn);
        Ok(ldap)
    }

    fn user_principal_name(&self, username: &str) -> String {
        if username.contains('@') {
            username.to_string()
        } else {
            format!("{}@{}", username, self.config.domain)
        }
    }

    fn search_filter(&self, username: &str) -> String {
        let escaped = ldap_escape(username);
        format!(
            "(|({ATTR_SAM_ACCOUNT_NAME}={escaped})(userPrincipalName={escaped}@{}))",
            self.config.domain
        )
    }

    async fn lookup(&self, ldap: &mut Ldap, username: &str) -> Result<AuthenticatedUser> {
        let attrs = vec![
            ATTR_SAM_ACCOUNT_NAME,
            ATTR_MAIL,
            ATTR_GIVEN_NAME,
            ATTR_SN,
            ATTR_MEMBER_OF,
            ATTR_USER_ACCOUNT_CONTROL,
        ];

        let (entries, _) = ldap
            .search(
                &self.config.base,
                Scope::Subtree,
                &self.search_filter(username),
                attrs,
            )
            .await
            .map_err(|e| unavailable(&e))?
            .success()
            .map_err(|e| unavailable(&e))?;

        let entry = entries
            .into_iter()
            .next()
            .ok_or_else(|| Error::Auth(AuthError::InvalidCredentials(username.to_string())))?;

        Ok(map_entry(SearchEntry::construct(entry), username))
    }
}

#[async_trait]
impl Directory for ActiveDirectoryBackend {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthenticatedUser> {
        debug!(username = credentials.username(), "authenticating via active directory");

        let mut ldap = self.connect().await?;
        let upn = self.user_principal_name(credentials.username());

        let bind = ldap
            .simple_bind(&upn, credentials.password())
            .await
            .map_err(|e| unavailable(&e))?;

        if bind.rc == RC_INVALID_CREDENTIALS {
            let _ = ldap.unbind().await;
            return Err(classify_bind_failure(credentials.username(), &bind.text).into());
        }
        if bind.rc != 0 {
            let _ = ldap.unbind().await;
            return Err(AuthError::DirectoryUnavailable(format!(
                "active directory bind failed with rc {}: {}",
                bind.rc, bind.text
            ))
            .into());
        }

        let user = self.lookup(&mut ldap, credentials.username()).await;
        let _ = ldap.unbind().await;
        let user = user?;

        if !user.enabled {
            return Err(AuthError::AccountDisabled(credentials.username().to_string()).into());
        }

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<AuthenticatedUser> {
        debug!(username, "looking up user via active directory");

        let (Some(manager_dn), Some(manager_password)) =
            (&self.config.manager_dn, &self.config.manager_password)
        else {
            // lookups require a service account; without one the refresh
            // path cannot re-resolve profiles on this backend
            return Err(AuthError::DirectoryUnavailable(
                "no active directory service account configured for lookups".to_string(),
            )
            .into());
        };

        let mut ldap = self.connect().await?;
        let bind = ldap
            .simple_bind(manager_dn, manager_password)
            .await
            .map_err(|e| unavailable(&e))?;
        if bind.rc != 0 {
            let _ = ldap.unbind().await;
            return Err(AuthError::DirectoryUnavailable(format!(
                "active directory service bind failed with rc {}",
                bind.rc
            ))
            .into());
        }

        let user = self.lookup(&mut ldap, username).await;
        let _ = ldap.unbind().await;
        user
    }

    async fn is_available(&self) -> bool {
        match self.connect().await {
            Ok(mut ldap) => {
                let _ = ldap.unbind().await;
                true
            }
            Err(e) => {
                warn!("active directory unavailable: {e}");
                false
            }
        }
    }
}

/// Map an rc=49 diagnostic message onto the account-state taxonomy
fn classify_bind_failure(username: &str, diagnostic: &str) -> AuthError {
    if diagnostic.contains(SUBCODE_ACCOUNT_DISABLED) {
        warn!(username, "active directory reports account disabled");
        AuthError::AccountDisabled(username.to_string())
    } else if diagnostic.contains(SUBCODE_ACCOUNT_LOCKED) {
        warn!(username, "active directory reports account locked");
        AuthError::AccountLocked(username.to_string())
    } else {
        warn!(username, "active directory bind rejected");
        AuthError::InvalidCredentials(username.to_string())
    }
}

fn map_entry(entry: SearchEntry, username: &str) -> AuthenticatedUser {
    let first = |attr: &str| entry.attrs.get(attr).and_then(|v| v.first()).cloned();

    let user_id = first(ATTR_SAM_ACCOUNT_NAME).unwrap_or_else(|| username.to_string());
    let email = first(ATTR_MAIL).unwrap_or_else(|| format!("{username}@unknown.local"));
    let groups: std::collections::HashSet<String> = entry
        .attrs
        .get(ATTR_MEMBER_OF)
        .map(|dns| dns.iter().map(|dn| group_cn(dn)).collect())
        .unwrap_or_default();
    let roles = normalize_roles(&groups);

    let enabled = first(ATTR_USER_ACCOUNT_CONTROL)
        .and_then(|uac| uac.parse::<u32>().ok())
        .map(|uac| uac & UAC_ACCOUNT_DISABLED == 0)
        .unwrap_or(true);

    AuthenticatedUser {
        user_id,
        username: username.to_string(),
        email,
        first_name: first(ATTR_GIVEN_NAME),
        last_name: first(ATTR_SN),
        roles,
        groups,
        enabled,
    }
}

fn unavailable(err: &ldap3::LdapError) -> Error {
    AuthError::DirectoryUnavailable(err.to_string()).into()
}
