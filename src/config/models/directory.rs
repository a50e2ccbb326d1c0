//! Directory backend configuration

use serde::{Deserialize, Serialize};

/// Which identity backend the engine authenticates against.
///
/// Exactly one backend is active per deployment, selected here at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryBackend {
    Ldap,
    ActiveDirectory,
    Keycloak,
}

/// Directory gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Active backend
    #[serde(default = "default_backend")]
    pub backend: DirectoryBackend,
    /// Generic LDAP settings
    #[serde(default)]
    pub ldap: LdapConfig,
    /// Active Directory settings
    #[serde(default)]
    pub active_directory: ActiveDirectoryConfig,
    /// Keycloak settings
    #[serde(default)]
    pub keycloak: KeycloakConfig,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            ldap: LdapConfig::default(),
            active_directory: ActiveDirectoryConfig::default(),
            keycloak: KeycloakConfig::default(),
        }
    }
}

impl DirectoryConfig {
    /// Validate the settings of the selected backend
    pub fn validate(&self) -> Result<(), String> {
        match self.backend {
            DirectoryBackend::Ldap => self.ldap.validate(),
            DirectoryBackend::ActiveDirectory => self.active_directory.validate(),
            DirectoryBackend::Keycloak => self.keycloak.validate(),
        }
    }

    /// Merge directory configurations
    pub fn merge(mut self, other: Self) -> Self {
        if other.backend != default_backend() {
            self.backend = other.backend;
        }
        if other.ldap != LdapConfig::default() {
            self.ldap = other.ldap;
        }
        if other.active_directory != ActiveDirectoryConfig::default() {
            self.active_directory = other.active_directory;
        }
        if other.keycloak != KeycloakConfig::default() {
            self.keycloak = other.keycloak;
        }
        self
    }
}

/// Generic LDAP server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LdapConfig {
    /// Server URL, e.g. `ldaps://ldap.example.com:636`
    #[serde(default)]
    pub url: String,
    /// Base DN for user searches
    #[serde(default)]
    pub user_search_base: String,
    /// Attribute forming the user RDN and search filter
    #[serde(default = "default_user_dn_attribute")]
    pub user_dn_attribute: String,
    /// Service account DN for profile lookups
    #[serde(default)]
    pub manager_dn: Option<String>,
    /// Service account password
    #[serde(default)]
    pub manager_password: Option<String>,
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            user_search_base: String::new(),
            user_dn_attribute: default_user_dn_attribute(),
            manager_dn: None,
            manager_password: None,
        }
    }
}

impl LdapConfig {
    fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("ldap.url is required".to_string());
        }
        if self.user_search_base.is_empty() {
            return Err("ldap.user_search_base is required".to_string());
        }
        if self.user_dn_attribute.is_empty() {
            return Err("ldap.user_dn_attribute cannot be blank".to_string());
        }
        Ok(())
    }
}

/// Microsoft Active Directory settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveDirectoryConfig {
    /// Server URL
    #[serde(default)]
    pub url: String,
    /// Windows domain used to build the UPN (`user@domain`)
    #[serde(default)]
    pub domain: String,
    /// Base DN for user searches
    #[serde(default)]
    pub base: String,
    /// Service account UPN or DN for profile lookups
    #[serde(default)]
    pub manager_dn: Option<String>,
    /// Service account password
    #[serde(default)]
    pub manager_password: Option<String>,
}

impl ActiveDirectoryConfig {
    fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("active_directory.url is required".to_string());
        }
        if self.domain.is_empty() {
            return Err("active_directory.domain is required".to_string());
        }
        if self.base.is_empty() {
            return Err("active_directory.base is required".to_string());
        }
        Ok(())
    }
}

/// Keycloak / OIDC settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeycloakConfig {
    /// Keycloak base URL, e.g. `https://sso.example.com`
    #[serde(default)]
    pub server_url: String,
    /// Realm name
    #[serde(default)]
    pub realm: String,
    /// Confidential client id used for the ROPC and admin grants
    #[serde(default)]
    pub client_id: String,
    /// Client secret
    #[serde(default)]
    pub client_secret: String,
    /// Read roles from the realm_access claim
    #[serde(default = "default_true")]
    pub use_realm_roles: bool,
    /// Read roles from the resource_access claim
    #[serde(default)]
    pub use_client_roles: bool,
    /// Client whose resource_access roles are read; defaults to `client_id`
    #[serde(default)]
    pub client_id_for_roles: Option<String>,
}

impl Default for KeycloakConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            realm: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            use_realm_roles: true,
            use_client_roles: false,
            client_id_for_roles: None,
        }
    }
}

impl KeycloakConfig {
    fn validate(&self) -> Result<(), String> {
        if self.server_url.is_empty() {
            return Err("keycloak.server_url is required".to_string());
        }
        if self.realm.is_empty() {
            return Err("keycloak.realm is required".to_string());
        }
        if self.client_id.is_empty() {
            return Err("keycloak.client_id is required".to_string());
        }
        Ok(())
    }

    /// Client id whose resource_access roles are consulted
    pub fn roles_client_id(&self) -> &str {
        self.client_id_for_roles
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.client_id)
    }
}

fn default_backend() -> DirectoryBackend {
    DirectoryBackend::Ldap
}

fn default_user_dn_attribute() -> String {
    "uid".to_string()
}

fn default_true() -> bool {
    true
}
