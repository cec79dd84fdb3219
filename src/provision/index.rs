//! Index step.

use tracing::info;

use crate::error::{ProvisionError, ProvisionStep};
use crate::manifest::CollectionSpec;

use super::DatabaseContext;

/// Create every declared index; identical existing indexes are left alone by the server.
pub(super) async fn ensure_indexes(
    ctx: &DatabaseContext<'_>,
    collection: &CollectionSpec,
) -> Result<Vec<String>, ProvisionError> {
    if collection.indexes.is_empty() {
        return Ok(Vec::new());
    }

    let namespace = ctx.namespace(&collection.name);
    let models = collection.indexes.iter().map(|index| index.to_model()).collect();

    let names = ctx
        .store
        .create_indexes(&ctx.database.name, &collection.name, models)
        .await
        .map_err(ProvisionError::step(ProvisionStep::Indexes, &namespace))?;

    info!(collection = %namespace, indexes = ?names, "Indexes ensured");
    Ok(names)
}
