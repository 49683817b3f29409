//! Duplicate diagnosis-run suppression.
//!
//! A run is a duplicate when the same patient submitted inputs with the same
//! canonical hash within the trailing window. The check fails open: if the
//! lookup itself errors the run is treated as new and a warning is returned.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use carepath_core::hash::{ContentHash, canonical_hash};
use carepath_core::models::run::{DiagnosisRun, RunStatus};
use carepath_storage::RunStore;

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DedupOutcome {
    pub is_duplicate: bool,
    pub existing_run_id: Option<Uuid>,
    pub warning: Option<String>,
}

impl DedupOutcome {
    fn fresh() -> Self {
        Self {
            is_duplicate: false,
            existing_run_id: None,
            warning: None,
        }
    }
}

/// Result of [`DedupPolicy::submit_run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSubmission {
    /// The new run, or the earlier run this submission duplicates.
    pub run_id: Uuid,
    pub is_duplicate: bool,
    pub inputs_hash: ContentHash,
    pub warning: Option<String>,
}

#[derive(Clone)]
pub struct DedupPolicy {
    runs: Arc<dyn RunStore>,
    enabled: bool,
    window: jiff::SignedDuration,
    inputs_version: String,
}

impl DedupPolicy {
    pub fn new(
        runs: Arc<dyn RunStore>,
        enabled: bool,
        window: jiff::SignedDuration,
        inputs_version: impl Into<String>,
    ) -> Self {
        Self {
            runs,
            enabled,
            window,
            inputs_version: inputs_version.into(),
        }
    }

    pub fn inputs_hash(&self, inputs: &Value) -> Result<ContentHash, PipelineError> {
        Ok(canonical_hash(&self.inputs_version, inputs)?)
    }

    /// Look for a run of `subject_id` with `inputs_hash` inside `window`.
    pub async fn check_duplicate(
        &self,
        inputs_hash: &ContentHash,
        subject_id: Uuid,
        window: jiff::SignedDuration,
    ) -> DedupOutcome {
        if !self.enabled {
            return DedupOutcome::fresh();
        }
        let since = jiff::Timestamp::now()
            .checked_sub(window)
            .unwrap_or(jiff::Timestamp::MIN);

        match self.runs.find_runs(subject_id, inputs_hash, since).await {
            Ok(runs) => match runs.first() {
                Some(run) => DedupOutcome {
                    is_duplicate: true,
                    existing_run_id: Some(run.id),
                    warning: None,
                },
                None => DedupOutcome::fresh(),
            },
            Err(e) => {
                warn!(
                    subject_id = %subject_id,
                    inputs_hash = inputs_hash.short(),
                    error = %e,
                    "dedup lookup failed, treating run as new"
                );
                DedupOutcome {
                    warning: Some(format!("duplicate check skipped: {e}")),
                    ..DedupOutcome::fresh()
                }
            }
        }
    }

    /// Record a diagnosis run unless an identical one is inside the window.
    ///
    /// A duplicate returns the existing run's id and records nothing.
    pub async fn submit_run(
        &self,
        patient_id: Uuid,
        inputs: &Value,
    ) -> Result<RunSubmission, PipelineError> {
        let inputs_hash = self.inputs_hash(inputs)?;
        let outcome = self
            .check_duplicate(&inputs_hash, patient_id, self.window)
            .await;

        if let Some(existing) = outcome.existing_run_id {
            info!(
                patient_id = %patient_id,
                run_id = %existing,
                "duplicate diagnosis run suppressed"
            );
            return Ok(RunSubmission {
                run_id: existing,
                is_duplicate: true,
                inputs_hash,
                warning: outcome.warning,
            });
        }

        let run = DiagnosisRun {
            id: Uuid::new_v4(),
            patient_id,
            inputs_hash: inputs_hash.clone(),
            status: RunStatus::Created,
            created_at: jiff::Timestamp::now(),
        };
        let run_id = run.id;
        self.runs.insert_run(run).await?;
        info!(patient_id = %patient_id, run_id = %run_id, "diagnosis run recorded");

        Ok(RunSubmission {
            run_id,
            is_duplicate: false,
            inputs_hash,
            warning: outcome.warning,
        })
    }

    pub fn window(&self) -> jiff::SignedDuration {
        self.window
    }
}
