//! Typed access to the artifact store.

use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use carepath_core::models::artifact::ArtifactKind;

use crate::error::StoreError;
use crate::traits::ArtifactStore;

/// Load and deserialize an artifact. `Ok(None)` if the job has none of this kind.
pub async fn load<T: DeserializeOwned>(
    store: &dyn ArtifactStore,
    job_id: Uuid,
    kind: ArtifactKind,
) -> Result<Option<T>, StoreError> {
    match store.get_artifact(job_id, kind).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serialize and upsert an artifact.
pub async fn save<T: Serialize>(
    store: &dyn ArtifactStore,
    job_id: Uuid,
    kind: ArtifactKind,
    value: &T,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(value)?;
    store.put_artifact(job_id, kind, value).await
}
