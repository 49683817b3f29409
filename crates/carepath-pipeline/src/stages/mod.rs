//! One processor per pipeline stage.
//!
//! Every processor reads the job and its upstream artifacts, writes exactly
//! one artifact kind, and lets [`JobTracker`] move the job along.

pub mod content;
pub mod delivery;
pub mod pdf;
pub mod ranking;
pub mod risk;
pub mod safety;
pub mod validation;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use carepath_core::models::artifact::ArtifactKind;
use carepath_rules::{RuleRegistry, SCORING_CONFIG_KEY, ScoringConfig, ScoringDefaults};
use carepath_storage::{StoreError, artifacts};

use crate::error::{ErrorCode, StageFailure, StageResult};
use crate::job::JobTracker;
use crate::settings::PipelineSettings;
use crate::stores::Stores;

/// Shared handles every processor needs.
#[derive(Clone)]
pub struct StageContext {
    pub stores: Stores,
    pub settings: Arc<PipelineSettings>,
    pub registry: RuleRegistry,
    pub tracker: JobTracker,
}

impl StageContext {
    pub fn new(stores: Stores, settings: PipelineSettings) -> Self {
        Self {
            registry: RuleRegistry::new(stores.rules.clone()),
            tracker: JobTracker::new(stores.jobs.clone()),
            settings: Arc::new(settings),
            stores,
        }
    }

    /// Load an artifact; a store error is `INTERNAL_ERROR`.
    pub(crate) async fn artifact<T: DeserializeOwned>(
        &self,
        job_id: Uuid,
        kind: ArtifactKind,
    ) -> StageResult<Option<T>> {
        artifacts::load(self.stores.artifacts.as_ref(), job_id, kind)
            .await
            .map_err(|e| StageFailure::internal(&format!("load {kind}"), e))
    }

    /// Load an upstream artifact that must exist, failing with `missing` otherwise.
    pub(crate) async fn required<T: DeserializeOwned>(
        &self,
        job_id: Uuid,
        kind: ArtifactKind,
        missing: ErrorCode,
    ) -> StageResult<T> {
        self.artifact(job_id, kind).await?.ok_or_else(|| {
            StageFailure::new(missing, format!("no {kind} artifact for job {job_id}"))
        })
    }

    /// Persist a stage's artifact; a store error is `SAVE_FAILED`.
    pub(crate) async fn save<T: Serialize>(
        &self,
        job_id: Uuid,
        kind: ArtifactKind,
        value: &T,
    ) -> StageResult<()> {
        artifacts::save(self.stores.artifacts.as_ref(), job_id, kind, value)
            .await
            .map_err(|e| StageFailure::new(ErrorCode::SaveFailed, format!("save {kind}: {e}")))
    }

    /// The active scoring configuration, or the built-in one when none is active.
    pub(crate) async fn scoring(&self) -> StageResult<ActiveScoring> {
        let Some(version) = self.registry.active_version(SCORING_CONFIG_KEY).await? else {
            return Ok(ActiveScoring {
                config: ScoringConfig::builtin().clone(),
                defaults: ScoringDefaults::default(),
                version: None,
            });
        };
        let unreadable = |e: serde_json::Error| {
            StageFailure::internal(
                &format!("active scoring config v{} is unreadable", version.version),
                e,
            )
        };
        let defaults = if version.defaults.is_null() {
            ScoringDefaults::default()
        } else {
            serde_json::from_value(version.defaults.clone()).map_err(unreadable)?
        };
        Ok(ActiveScoring {
            config: serde_json::from_value(version.logic.clone()).map_err(unreadable)?,
            defaults,
            version: Some(version.version),
        })
    }
}

pub(crate) struct ActiveScoring {
    pub config: ScoringConfig,
    pub defaults: ScoringDefaults,
    /// `None` for the built-in config.
    pub version: Option<u32>,
}

/// Run a store call under `limit`. The error is a message fit for a stage failure.
pub(crate) async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, String> {
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {}s", limit.as_secs())),
    }
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
