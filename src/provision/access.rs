//! Application user step.
//!
//! One credential in the authentication database, granted the role each
//! manifest database asks for.

use tracing::{info, warn};

use crate::config::AccessConfig;
use crate::error::{ProvisionError, ProvisionStep};
use crate::interfaces::{DocumentStore, RoleGrant, UserDefinition};
use crate::manifest::Manifest;
use crate::report::UserOutcome;

/// Application user to provision.
#[derive(Debug, Clone)]
pub struct AppCredential {
    pub user: UserDefinition,
    pub auth_database: String,
    /// Replace password and roles when the user already exists.
    pub update_existing: bool,
}

impl AppCredential {
    /// Build the credential from configuration with roles taken from the manifest.
    pub fn from_manifest(config: &AccessConfig, manifest: &Manifest) -> Self {
        Self {
            user: UserDefinition {
                username: config.username.clone(),
                password: config.password.clone(),
                roles: role_grants(manifest),
            },
            auth_database: config.auth_database.clone(),
            update_existing: config.update_existing,
        }
    }
}

/// One grant per database, skipping databases with no access.
pub fn role_grants(manifest: &Manifest) -> Vec<RoleGrant> {
    manifest
        .databases
        .iter()
        .filter_map(|db| db.access.role().map(|role| RoleGrant::new(role, &db.name)))
        .collect()
}

/// Create the user, or bring an existing one in line with the credential.
pub async fn ensure_user(
    store: &dyn DocumentStore,
    credential: &AppCredential,
) -> Result<UserOutcome, ProvisionError> {
    let user = &credential.user;
    let auth_db = &credential.auth_database;
    let target = format!("{}@{}", user.username, auth_db);
    let fail = || ProvisionError::step(ProvisionStep::User, &target);

    let exists = store
        .user_exists(auth_db, &user.username)
        .await
        .map_err(fail())?;

    let outcome = match (exists, credential.update_existing) {
        (false, _) => {
            store.create_user(auth_db, user).await.map_err(fail())?;
            UserOutcome::Created
        }
        (true, true) => {
            store.update_user(auth_db, user).await.map_err(fail())?;
            UserOutcome::Updated
        }
        (true, false) => {
            warn!(user = %target, "User exists and updates are disabled, leaving it unchanged");
            UserOutcome::Unchanged
        }
    };

    info!(
        user = %target,
        roles = user.roles.len(),
        outcome = ?outcome,
        "Application user ensured"
    );
    Ok(outcome)
}
