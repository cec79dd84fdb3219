//! Application user configuration.

use serde::Deserialize;

/// Application credential configuration.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Create (or update) the application user.
    pub enabled: bool,
    pub username: String,
    pub password: String,
    /// Database the user authenticates against.
    pub auth_database: String,
    /// Replace password and roles when the user already exists.
    pub update_existing: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            username: "app_user".to_string(),
            password: "app_secure_pass".to_string(),
            auth_database: "admin".to_string(),
            update_existing: true,
        }
    }
}

impl std::fmt::Debug for AccessConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessConfig")
            .field("enabled", &self.enabled)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("auth_database", &self.auth_database)
            .field("update_existing", &self.update_existing)
            .finish()
    }
}
