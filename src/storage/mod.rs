//! Storage implementations.

use tracing::info;

use crate::config::MongodbConfig;
use crate::interfaces::Result;

pub mod mongodb;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use self::mongodb::MongoDocumentStore;

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockDocumentStore;

/// Initialize the MongoDB store from configuration.
///
/// Does not contact the server; connection is verified by the provisioner's ping.
pub async fn init_store(config: &MongodbConfig) -> Result<MongoDocumentStore> {
    info!(uri = %config.redacted_uri(), "Storage: mongodb");
    MongoDocumentStore::connect(config).await
}
