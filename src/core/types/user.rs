//! Canonical user profile produced by the directory backends

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Profile of a user as resolved from the active directory backend.
///
/// Each backend maps its provider-specific attributes into this shape, so the
/// rest of the engine never sees LDAP entries or OIDC claims. Identity is the
/// `user_id` alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Stable backend identifier (LDAP uid, AD sAMAccountName, OIDC sub)
    pub user_id: String,
    /// Login name
    pub username: String,
    /// Email address; backends substitute `{username}@unknown.local` when
    /// the directory carries none
    pub email: String,
    /// Given name, when the directory provides one
    pub first_name: Option<String>,
    /// Surname, when the directory provides one
    pub last_name: Option<String>,
    /// Normalized application roles (`ROLE_*`)
    pub roles: HashSet<String>,
    /// Raw directory group names
    pub groups: HashSet<String>,
    /// Whether the account may sign in
    pub enabled: bool,
}

impl AuthenticatedUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

impl PartialEq for AuthenticatedUser {
    fn eq(&self, other: &Self) -> bool {
        self.user_id == other.user_id
    }
}

impl Eq for AuthenticatedUser {}

impl std::hash::Hash for AuthenticatedUser {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.user_id.hash(state);
    }
}
