//! mongo-provision: MongoDB bootstrap
//!
//! Runs once against a fresh (or previously provisioned) server: creates the
//! databases, collections, validators, indexes, seed data and views declared
//! in the manifest, then the application user.
//!
//! ## Configuration
//! - `--config <path>` / PROVISION_CONFIG: YAML config file
//! - PROVISION__MONGODB__URI: connection URI (default: mongodb://localhost:27017)
//! - PROVISION__SEED__POLICY: ensure | insert | skip (default: ensure)
//! - PROVISION_LOG: tracing filter (default: info)
//!
//! Prints the provisioning summary to stdout and exits non-zero on failure.

use tracing::{error, info};

use mongo_provision::config::Config;
use mongo_provision::utils::bootstrap::{init_tracing, parse_config_path};
use mongo_provision::{provision, BootstrapReport, ProvisionError};

async fn run() -> Result<BootstrapReport, ProvisionError> {
    let config_path = parse_config_path(std::env::args().skip(1))?;
    let config = Config::load(config_path.as_deref())?;

    info!(
        uri = %config.mongodb.redacted_uri(),
        seed_policy = %config.seed.policy,
        access = config.access.enabled,
        "mongo-provision starting"
    );

    provision(&config).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    match run().await {
        Ok(report) => {
            print!("{}", report);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Bootstrap failed");
            Err(e.into())
        }
    }
}
