//! Sign-in credentials

use crate::error::{Error, Result};

/// Device id recorded when the caller does not identify a device
pub const DEFAULT_DEVICE_ID: &str = "default";

/// Username/password pair plus the device the sign-in originates from.
///
/// Constructed through [`Credentials::new`] so blank values never enter the
/// engine. Never serialized or persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
    device_id: String,
}

impl Credentials {
    /// Create validated credentials. A missing or blank `device_id` falls
    /// back to [`DEFAULT_DEVICE_ID`].
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        device_id: Option<&str>,
    ) -> Result<Self> {
        let username = username.into();
        let password = password.into();

        if username.trim().is_empty() {
            return Err(Error::config("username cannot be blank"));
        }
        if password.trim().is_empty() {
            return Err(Error::config("password cannot be blank"));
        }

        let device_id = match device_id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => DEFAULT_DEVICE_ID.to_string(),
        };

        Ok(Self {
            username: username.trim().to_string(),
            password,
            device_id,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("device_id", &self.device_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_username_rejected() {
        assert!(Credentials::new("  ", "secret", None).is_err());
    }

    #[test]
    fn test_blank_password_rejected() {
        assert!(Credentials::new("alice", "", None).is_err());
    }

    #[test]
    fn test_device_id_defaults_to_sentinel() {
        let creds = Credentials::new("alice", "secret", None).unwrap();
        assert_eq!(creds.device_id(), DEFAULT_DEVICE_ID);

        let creds = Credentials::new("alice", "secret", Some("  ")).unwrap();
        assert_eq!(creds.device_id(), DEFAULT_DEVICE_ID);
    }

    #[test]
    fn test_device_id_trimmed() {
        let creds = Credentials::new(" alice ", "secret", Some(" dev1 ")).unwrap();
        assert_eq!(creds.username(), "alice");
        assert_eq!(creds.device_id(), "dev1");
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("alice", "hunter2", Some("dev1")).unwrap();
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("REDACTED"));
    }
}
