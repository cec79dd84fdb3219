//! mongo-provision: declarative MongoDB bootstrap.
//!
//! Applies a manifest of databases, collections, validators, indexes, seed
//! data and views to a MongoDB server, then provisions an application user
//! with per-database roles.
//!
//! Architecture:
//! - `manifest`: what to provision, loaded from YAML (embedded by default)
//! - `seed`: seed documents and their JSON-to-BSON conversion
//! - `interfaces`: the `DocumentStore` seam
//! - `storage`: MongoDB and in-memory store implementations
//! - `provision`: the ordered provisioning steps
//! - `report`: per-run outcomes and the summary banner

pub mod config;
pub mod error;
pub mod interfaces;
pub mod manifest;
pub mod provision;
pub mod report;
pub mod seed;
pub mod storage;
pub mod utils;

pub use crate::config::Config;
pub use error::{ProvisionError, ProvisionStep};
pub use interfaces::{DocumentStore, StoreError};
pub use manifest::Manifest;
pub use provision::{provision, wait_for_server, AppCredential, DatabaseContext, Provisioner};
pub use report::BootstrapReport;
pub use seed::{SeedSet, SeedSource};
