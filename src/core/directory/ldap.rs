//! Generic LDAP backend
//!
//! Authenticates by binding as a DN constructed from the configured RDN
//! attribute, then reads the entry's profile attributes over the same
//! connection. Profile lookups bind with the service account when one is
//! configured, anonymously otherwise.

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, Scope, SearchEntry, ldap_escape};
use tracing::{debug, warn};

use super::groups::{group_cn, normalize_roles};
use super::Directory;
use crate::config::LdapConfig;
use crate::core::types::{AuthenticatedUser, Credentials};
use crate::error::{AuthError, Error, Result};

const ATTR_MAIL: &str = "mail";
const ATTR_GIVEN_NAME: &str = "givenName";
const ATTR_SN: &str = "sn";
const ATTR_MEMBER_OF: &str = "memberOf";

// LDAP resultCode 49
const RC_INVALID_CREDENTIALS: u32 = 49;

/// Directory backend for generic LDAP servers
pub struct LdapDirectory {
    config: LdapConfig,
}

impl LdapDirectory {
    pub fn new(config: LdapConfig) -> Self {
        Self { config }
    }

    async fn connect(&self) -> Result<Ldap> {
        let (conn, ldap) = LdapConnAsync::new(&self.config.url)
            .await
            .map_err(|e| unavailable(&e))?;
        ldap3::drive!(conn);
        Ok(ldap)
    }

    fn user_dn(&self, username: &str) -> String {
        format!(
            "{}={},{}",
            self.config.user_dn_attribute,
            ldap_escape(username),
            self.config.user_search_base
        )
    }

    fn search_filter(&self, username: &str) -> String {
        format!("({}={})", self.config.user_dn_attribute, ldap_escape(username))
    }

    async fn lookup(&self, ldap: &mut Ldap, username: &str) -> Result<AuthenticatedUser> {
        let attrs = vec![
            self.config.user_dn_attribute.as_str(),
            ATTR_MAIL,
            ATTR_GIVEN_NAME,
            ATTR_SN,
            ATTR_MEMBER_OF,
        ];

        let (entries, _) = ldap
            .search(
                &self.config.user_search_base,
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

        Ok(self.map_entry(SearchEntry::construct(entry), username))
    }

    fn map_entry(&self, entry: SearchEntry, username: &str) -> AuthenticatedUser {
        let first = |attr: &str| entry.attrs.get(attr).and_then(|v| v.first()).cloned();

        let user_id = first(&self.config.user_dn_attribute).unwrap_or_else(|| username.to_string());
        let email = first(ATTR_MAIL).unwrap_or_else(|| format!("{username}@unknown.local"));
        let groups: std::collections::HashSet<String> = entry
            .attrs
            .get(ATTR_MEMBER_OF)
            .map(|dns| dns.iter().map(|dn| group_cn(dn)).collect())
            .unwrap_or_default();
        let roles = normalize_roles(&groups);

        AuthenticatedUser {
            user_id,
            username: username.to_string(),
            email,
            first_name: first(ATTR_GIVEN_NAME),
            last_name: first(ATTR_SN),
            roles,
            groups,
            enabled: true,
        }
    }
}

#[async_trait]
impl Directory for LdapDirectory {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthenticatedUser> {
        debug!(username = credentials.username(), "authenticating via ldap");

        let mut ldap = self.connect().await?;
        let dn = self.user_dn(credentials.username());

        let bind = ldap
            .simple_bind(&dn, credentials.password())
            .await
            .map_err(|e| unavailable(&e))?;

        if bind.rc == RC_INVALID_CREDENTIALS {
            warn!(username = credentials.username(), "ldap bind rejected");
            let _ = ldap.unbind().await;
            return Err(AuthError::InvalidCredentials(credentials.username().to_string()).into());
        }
        if bind.rc != 0 {
            let _ = ldap.unbind().await;
            return Err(AuthError::DirectoryUnavailable(format!(
                "ldap bind failed with rc {}: {}",
                bind.rc, bind.text
            ))
            .into());
        }

        let user = self.lookup(&mut ldap, credentials.username()).await;
        let _ = ldap.unbind().await;
        user
    }

    async fn find_by_username(&self, username: &str) -> Result<AuthenticatedUser> {
        debug!(username, "looking up user via ldap");

        let mut ldap = self.connect().await?;

        if let (Some(dn), Some(password)) =
            (&self.config.manager_dn, &self.config.manager_password)
        {
            let bind = ldap
                .simple_bind(dn, password)
                .await
                .map_err(|e| unavailable(&e))?;
            if bind.rc != 0 {
                let _ = ldap.unbind().await;
                return Err(AuthError::DirectoryUnavailable(format!(
                    "ldap service bind failed with rc {}",
                    bind.rc
                ))
                .into());
            }
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
                warn!("ldap unavailable: {e}");
                false
            }
        }
    }
}

fn unavailable(err: &ldap3::LdapError) -> Error {
    AuthError::DirectoryUnavailable(err.to_string()).into()
}
