//! Top-level provisioning errors.

use crate::interfaces::StoreError;
use crate::manifest::ManifestError;
use crate::seed::SeedError;
use crate::utils::bootstrap::ArgsError;

/// Provisioning step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    Collection,
    Indexes,
    Seed,
    View,
    User,
}

impl std::fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisionStep::Collection => write!(f, "create collection"),
            ProvisionStep::Indexes => write!(f, "create indexes"),
            ProvisionStep::Seed => write!(f, "insert seed data"),
            ProvisionStep::View => write!(f, "create view"),
            ProvisionStep::User => write!(f, "provision user"),
        }
    }
}

/// Errors that abort a bootstrap run.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Invalid command line: {0}")]
    Usage(#[from] ArgsError),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Seed(#[from] SeedError),

    #[error("Could not reach MongoDB at {uri}: {source}")]
    Connection {
        uri: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to {step} {target}: {source}")]
    Step {
        step: ProvisionStep,
        target: String,
        #[source]
        source: StoreError,
    },
}

impl ProvisionError {
    pub(crate) fn step(step: ProvisionStep, target: impl Into<String>) -> impl FnOnce(StoreError) -> Self {
        let target = target.into();
        move |source| ProvisionError::Step {
            step,
            target,
            source,
        }
    }

    /// The store error behind a failed step, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            ProvisionError::Connection { source, .. } | ProvisionError::Step { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}
