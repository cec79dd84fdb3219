//! Seed step.

use mongodb::bson::Document;
use tracing::{debug, info};

use crate::config::SeedPolicy;
use crate::error::{ProvisionError, ProvisionStep};
use crate::manifest::CollectionSpec;
use crate::report::SeedOutcome;

use super::DatabaseContext;

/// Load a collection's seed documents under the given policy.
///
/// Seeding is not transactional: documents written before a failure stay.
pub(super) async fn load_seed(
    ctx: &DatabaseContext<'_>,
    collection: &CollectionSpec,
    documents: &[Document],
    policy: SeedPolicy,
) -> Result<SeedOutcome, ProvisionError> {
    let Some(seed) = &collection.seed else {
        return Ok(SeedOutcome::default());
    };
    if documents.is_empty() || policy == SeedPolicy::Skip {
        return Ok(SeedOutcome::default());
    }

    let namespace = ctx.namespace(&collection.name);
    let db = &ctx.database.name;
    let fail = || ProvisionError::step(ProvisionStep::Seed, &namespace);
    let total = documents.len() as u64;

    let outcome = match (policy, &seed.key) {
        (SeedPolicy::Insert, _) => {
            let inserted = ctx
                .store
                .insert_many(db, &collection.name, documents.to_vec())
                .await
                .map_err(fail())?;
            SeedOutcome {
                inserted,
                existing: 0,
            }
        }
        (_, Some(key)) => {
            let mut inserted = 0;
            for document in documents {
                if ctx
                    .store
                    .insert_if_absent(db, &collection.name, key, document.clone())
                    .await
                    .map_err(fail())?
                {
                    inserted += 1;
                }
            }
            SeedOutcome {
                inserted,
                existing: total - inserted,
            }
        }
        (_, None) => {
            let count = ctx
                .store
                .count_documents(db, &collection.name)
                .await
                .map_err(fail())?;
            if count > 0 {
                debug!(collection = %namespace, count, "Collection not empty, seed skipped");
                SeedOutcome {
                    inserted: 0,
                    existing: total,
                }
            } else {
                let inserted = ctx
                    .store
                    .insert_many(db, &collection.name, documents.to_vec())
                    .await
                    .map_err(fail())?;
                SeedOutcome {
                    inserted,
                    existing: 0,
                }
            }
        }
    };

    info!(
        collection = %namespace,
        inserted = outcome.inserted,
        existing = outcome.existing,
        "Seed data loaded"
    );
    Ok(outcome)
}
