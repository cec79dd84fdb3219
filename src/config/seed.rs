//! Seed loading configuration.

use serde::Deserialize;

/// How seed documents are written when the bootstrap runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedPolicy {
    /// Insert keyed seeds only when their key is absent; keyless seeds only
    /// into empty collections. Re-runs leave existing data untouched.
    #[default]
    Ensure,
    /// Plain ordered insert. A re-run fails on the first duplicate key.
    Insert,
    /// Do not load seeds.
    Skip,
}

impl std::fmt::Display for SeedPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedPolicy::Ensure => write!(f, "ensure"),
            SeedPolicy::Insert => write!(f, "insert"),
            SeedPolicy::Skip => write!(f, "skip"),
        }
    }
}

/// Seed configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Write policy.
    pub policy: SeedPolicy,
    /// Directory with `<database>/<collection>.json` files.
    /// When unset, the seed files compiled into the binary are used.
    pub dir: Option<String>,
    /// Check every seed document against its collection validator before
    /// anything is written.
    pub validate: bool,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            policy: SeedPolicy::Ensure,
            dir: None,
            validate: true,
        }
    }
}
