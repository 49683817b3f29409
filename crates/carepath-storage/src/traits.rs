use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use carepath_core::hash::ContentHash;
use carepath_core::models::artifact::ArtifactKind;
use carepath_core::models::audit::AuditRecord;
use carepath_core::models::intake::IntakeData;
use carepath_core::models::job::{JobPatch, ProcessingJob};
use carepath_core::models::risk::Answer;
use carepath_core::models::rule::{RuleKind, RuleVersion};
use carepath_core::models::run::DiagnosisRun;

use crate::activation::{ActivationPlan, StatusChange};
use crate::error::StoreError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Single-row job fetch/insert/update.
pub trait JobStore: Send + Sync {
    fn get_job(&self, id: Uuid) -> BoxFuture<'_, Result<Option<ProcessingJob>, StoreError>>;

    fn insert_job(&self, job: ProcessingJob) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Apply `patch` and return the updated job. `NotFound` if the job is missing.
    fn update_job(
        &self,
        id: Uuid,
        patch: JobPatch,
    ) -> BoxFuture<'_, Result<ProcessingJob, StoreError>>;
}

/// Stage outputs, keyed by `(job_id, kind)`. `put_artifact` is an upsert.
pub trait ArtifactStore: Send + Sync {
    fn get_artifact(
        &self,
        job_id: Uuid,
        kind: ArtifactKind,
    ) -> BoxFuture<'_, Result<Option<Value>, StoreError>>;

    fn put_artifact(
        &self,
        job_id: Uuid,
        kind: ArtifactKind,
        data: Value,
    ) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// Versioned rule/config documents and their audit trail.
pub trait RuleStore: Send + Sync {
    fn get_version(&self, id: Uuid) -> BoxFuture<'_, Result<Option<RuleVersion>, StoreError>>;

    /// All versions of `rule_key`, ascending by version number.
    fn list_versions<'a>(
        &'a self,
        rule_key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<RuleVersion>, StoreError>>;

    fn list_active_by_key<'a>(
        &'a self,
        rule_key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<RuleVersion>, StoreError>>;

    /// Every active version of `kind`, ordered by `(rule_key, version)`.
    fn list_active(&self, kind: RuleKind) -> BoxFuture<'_, Result<Vec<RuleVersion>, StoreError>>;

    fn insert_version(&self, version: RuleVersion) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Overwrite a stored version. `NotFound` if it was never inserted.
    /// Lifecycle rules are enforced by [`ActivationPlan::verify`], not here.
    fn put_version(&self, version: RuleVersion) -> BoxFuture<'_, Result<(), StoreError>>;

    fn insert_audit(&self, record: AuditRecord) -> BoxFuture<'_, Result<(), StoreError>>;

    fn list_audit(&self, record_id: Uuid) -> BoxFuture<'_, Result<Vec<AuditRecord>, StoreError>>;

    /// Write an activation's version changes and audit records as a unit.
    ///
    /// Backends with transactions or conditional writes should override this
    /// with a single atomic commit. The provided implementation verifies the
    /// plan, writes the versions, then the audit records, and restores every
    /// written version if a later write fails. A failed restore is reported
    /// as [`StoreError::Inconsistent`].
    fn commit_activation<'a>(
        &'a self,
        plan: &'a ActivationPlan,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let current = self.list_versions(&plan.rule_key).await?;
            plan.verify(&current)?;

            let mut written: Vec<&StatusChange> = Vec::with_capacity(plan.changes.len());
            for change in &plan.changes {
                if let Err(e) = self.put_version(change.after.clone()).await {
                    restore(self, &written).await?;
                    return Err(e);
                }
                written.push(change);
            }
            for record in &plan.audit {
                if let Err(e) = self.insert_audit(record.clone()).await {
                    restore(self, &written).await?;
                    return Err(e);
                }
            }
            Ok(())
        })
    }
}

async fn restore<S: RuleStore + ?Sized>(
    store: &S,
    written: &[&StatusChange],
) -> Result<(), StoreError> {
    for change in written.iter().rev() {
        let original = &change.before;
        if let Err(e) = store.put_version(original.clone()).await {
            tracing::error!(
                rule_key = %original.rule_key,
                version = original.version,
                error = %e,
                "restoring rule version after failed activation failed"
            );
            return Err(StoreError::Inconsistent(format!(
                "rule key '{}' left half-activated: restoring v{} failed: {e}",
                original.rule_key, original.version
            )));
        }
    }
    Ok(())
}

/// Prior diagnosis runs, for duplicate detection.
pub trait RunStore: Send + Sync {
    /// Runs for `patient_id` with `inputs_hash` created at or after `since`, newest first.
    fn find_runs<'a>(
        &'a self,
        patient_id: Uuid,
        inputs_hash: &'a ContentHash,
        since: jiff::Timestamp,
    ) -> BoxFuture<'a, Result<Vec<DiagnosisRun>, StoreError>>;

    fn insert_run(&self, run: DiagnosisRun) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// Answered questionnaire items for an assessment.
pub trait AnswerStore: Send + Sync {
    fn list_answers(&self, assessment_id: Uuid) -> BoxFuture<'_, Result<Vec<Answer>, StoreError>>;
}

/// Structured intake data and conversation turns for an assessment.
pub trait IntakeStore: Send + Sync {
    fn get_intake(
        &self,
        assessment_id: Uuid,
    ) -> BoxFuture<'_, Result<Option<IntakeData>, StoreError>>;
}

/// Blob storage for rendered documents.
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` at `path` and return the path written.
    fn upload<'a>(
        &'a self,
        path: &'a str,
        bytes: Vec<u8>,
        content_type: &'a str,
    ) -> BoxFuture<'a, Result<String, StoreError>>;

    /// Returns whether an object was removed.
    fn delete<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<bool, StoreError>>;

    fn signed_url<'a>(
        &'a self,
        path: &'a str,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<String, StoreError>>;
}

pub trait NotificationSink: Send + Sync {
    fn create_notification(
        &self,
        user_id: Uuid,
        payload: Value,
    ) -> BoxFuture<'_, Result<Uuid, StoreError>>;
}
