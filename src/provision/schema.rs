//! Collection and validator step.

use tracing::{debug, info};

use crate::error::{ProvisionError, ProvisionStep};
use crate::manifest::CollectionSpec;
use crate::report::SchemaOutcome;

use super::DatabaseContext;

/// Create the collection with its validator, or re-apply the validator if the
/// collection already exists.
pub(super) async fn ensure_collection(
    ctx: &DatabaseContext<'_>,
    collection: &CollectionSpec,
    existing: &[String],
) -> Result<SchemaOutcome, ProvisionError> {
    let namespace = ctx.namespace(&collection.name);
    let validator = collection.validator_document();
    let exists = existing.iter().any(|name| *name == collection.name);

    match (exists, validator) {
        (false, validator) => {
            ctx.store
                .create_collection(&ctx.database.name, &collection.name, validator)
                .await
                .map_err(ProvisionError::step(ProvisionStep::Collection, &namespace))?;
            info!(collection = %namespace, "Created collection");
            Ok(SchemaOutcome::Created)
        }
        (true, Some(validator)) => {
            ctx.store
                .set_validator(&ctx.database.name, &collection.name, validator)
                .await
                .map_err(ProvisionError::step(ProvisionStep::Collection, &namespace))?;
            info!(collection = %namespace, "Collection exists, validator re-applied");
            Ok(SchemaOutcome::ValidatorUpdated)
        }
        (true, None) => {
            debug!(collection = %namespace, "Collection exists");
            Ok(SchemaOutcome::Unchanged)
        }
    }
}
