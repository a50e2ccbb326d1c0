//! Directory authentication gateway
//!
//! A single trait with three interchangeable backends (generic LDAP,
//! Active Directory, Keycloak/OIDC), selected by configuration at startup.
//! Each backend owns the mapping from its provider-specific identity data
//! into the canonical [`AuthenticatedUser`].

mod active_directory;
mod groups;
mod keycloak;
mod ldap;
mod resilient;

pub use active_directory::ActiveDirectoryBackend;
pub use groups::{group_cn, normalize_roles};
pub use keycloak::KeycloakDirectory;
pub use ldap::LdapDirectory;
pub use resilient::ResilientDirectory;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{DirectoryBackend, DirectoryConfig, ResilienceConfig};
use crate::core::types::{AuthenticatedUser, Credentials};
use crate::error::Result;

/// Authentication and profile resolution against an identity backend
#[async_trait]
pub trait Directory: Send + Sync {
    /// Authenticate credentials and return the user's current profile.
    ///
    /// Fails with `InvalidCredentials`, `AccountLocked`, `AccountDisabled`,
    /// or `DirectoryUnavailable`.
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthenticatedUser>;

    /// Re-resolve a user's current profile and roles without checking a
    /// password. Used during token refresh so role changes since login take
    /// effect without forcing re-authentication.
    async fn find_by_username(&self, username: &str) -> Result<AuthenticatedUser>;

    /// Cheap health probe
    async fn is_available(&self) -> bool;
}

/// Password operations the reset/update flows delegate to the directory
#[async_trait]
pub trait DirectoryPasswords: Send + Sync {
    /// Check the user's current password without creating a session
    async fn verify_password(&self, user_id: &str, current_password: &str) -> Result<bool>;

    /// Overwrite a user's password on behalf of a recovery flow
    async fn reset_password(&self, user_id: &str, new_password: &str) -> Result<()>;

    /// Overwrite a user's password after the current one verified
    async fn change_password(&self, user_id: &str, new_password: &str) -> Result<()>;
}

/// Profile lookup by email, used by the recovery flow
#[async_trait]
pub trait UserLookup: Send + Sync {
    /// Resolve a user by email; `None` when no account matches
    async fn find_by_email(&self, email: &str) -> Result<Option<AuthenticatedUser>>;
}

/// Build the configured backend and wrap it with the resilience decorator
pub fn from_config(
    directory: &DirectoryConfig,
    resilience: &ResilienceConfig,
) -> Result<Arc<dyn Directory>> {
    let inner: Arc<dyn Directory> = match directory.backend {
        DirectoryBackend::Ldap => Arc::new(LdapDirectory::new(directory.ldap.clone())),
        DirectoryBackend::ActiveDirectory => {
            Arc::new(ActiveDirectoryBackend::new(directory.active_directory.clone()))
        }
        DirectoryBackend::Keycloak => Arc::new(KeycloakDirectory::new(directory.keycloak.clone())?),
    };

    Ok(Arc::new(ResilientDirectory::new(inner, resilience)))
}
