//! Configuration model types

pub mod directory;
pub mod password;
pub mod redis;
pub mod resilience;
pub mod tokens;

pub use directory::{
    ActiveDirectoryConfig, DirectoryBackend, DirectoryConfig, KeycloakConfig, LdapConfig,
};
pub use password::PasswordConfig;
pub use redis::RedisConfig;
pub use resilience::ResilienceConfig;
pub use tokens::TokenConfig;
