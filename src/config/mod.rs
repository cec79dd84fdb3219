//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod access;
mod mongodb;
mod seed;

pub use access::AccessConfig;
pub use mongodb::MongodbConfig;
pub use seed::{SeedConfig, SeedPolicy};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "provision.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "PROVISION_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "PROVISION";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "PROVISION_LOG";

use serde::Deserialize;

/// Manifest location.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// YAML manifest file. When unset, the manifest compiled into the binary is used.
    pub path: Option<String>,
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// MongoDB connection.
    pub mongodb: MongodbConfig,
    /// Manifest source.
    pub manifest: ManifestConfig,
    /// Seed data handling.
    pub seed: SeedConfig,
    /// Application user.
    pub access: AccessConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `provision.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ::config::ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.mongodb.uri, "mongodb://localhost:27017");
        assert!(config.manifest.path.is_none());
        assert_eq!(config.seed.policy, SeedPolicy::Ensure);
        assert!(config.access.enabled);
    }

    #[test]
    fn test_config_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "mongodb:\n  uri: mongodb://db:27017\n  connect_retries: 3\nseed:\n  policy: skip\naccess:\n  username: svc"
        )
        .unwrap();

        let config = Config::load(file.path().to_str()).unwrap();
        assert_eq!(config.mongodb.uri, "mongodb://db:27017");
        assert_eq!(config.mongodb.connect_retries, 3);
        assert_eq!(config.seed.policy, SeedPolicy::Skip);
        assert_eq!(config.access.username, "svc");
        // Unset keys keep their defaults
        assert_eq!(config.access.password, "app_secure_pass");
        assert!(config.seed.validate);
    }

    #[test]
    fn test_config_load_missing_required_file() {
        assert!(Config::load(Some("/nonexistent/provision.yaml")).is_err());
    }
}
