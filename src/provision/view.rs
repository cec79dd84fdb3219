//! View step.

use tracing::info;

use crate::error::{ProvisionError, ProvisionStep};
use crate::manifest::ViewSpec;
use crate::report::ViewOutcome;

use super::DatabaseContext;

/// Create the view, or redefine it in place if the name is taken.
pub(super) async fn ensure_view(
    ctx: &DatabaseContext<'_>,
    view: &ViewSpec,
    existing: &[String],
) -> Result<ViewOutcome, ProvisionError> {
    let namespace = ctx.namespace(&view.name);
    let pipeline = view.pipeline_documents().map_err(|source| {
        ProvisionError::Manifest(crate::manifest::ManifestError::InvalidPipeline {
            database: ctx.database.name.clone(),
            view: view.name.clone(),
            source,
        })
    })?;

    let outcome = if existing.iter().any(|name| *name == view.name) {
        ctx.store
            .modify_view(&ctx.database.name, &view.name, &view.source, pipeline)
            .await
            .map_err(ProvisionError::step(ProvisionStep::View, &namespace))?;
        ViewOutcome::Redefined
    } else {
        ctx.store
            .create_view(&ctx.database.name, &view.name, &view.source, pipeline)
            .await
            .map_err(ProvisionError::step(ProvisionStep::View, &namespace))?;
        ViewOutcome::Created
    };

    info!(view = %namespace, source = %view.source, outcome = ?outcome, "View ensured");
    Ok(outcome)
}
