//! Find the containers that reference a volume.

use crate::engine::{ContainerEngine, ContainerFilter};
use crate::volumes::error::{Result, VolumeError};

/// Names of all containers, running or not, that mount `volume`.
///
/// Names are returned without the engine's leading `/`. Containers the
/// engine reports without a name are skipped.
pub async fn try_resolve_attached(engine: &dyn ContainerEngine, volume: &str) -> Result<Vec<String>> {
    let containers = engine
        .list_containers(&ContainerFilter::Volume(volume.to_string()), true)
        .await
        .map_err(|source| VolumeError::ListFailed {
            volume: volume.to_string(),
            source,
        })?;

    Ok(containers
        .iter()
        .filter_map(|c| c.canonical_name())
        .map(str::to_string)
        .collect())
}

/// Best-effort variant of [`try_resolve_attached`].
///
/// A failed engine query is logged and reported as no attachments. An empty
/// result therefore means "none known", not "none exist".
pub async fn resolve_attached(engine: &dyn ContainerEngine, volume: &str) -> Vec<String> {
    match try_resolve_attached(engine, volume).await {
        Ok(names) => names,
        Err(e) => {
            tracing::error!(volume = %volume, "Treating volume as unattached: {}", e);
            Vec::new()
        }
    }
}
