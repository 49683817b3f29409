//! S3-backed document store.
//!
//! Jobs, artifacts, rule versions, audit records, runs and notifications are
//! JSON documents under the key layout in [`carepath_core::keys`]. Read-modify-
//! write cycles use ETag preconditions; a lost race surfaces as
//! [`StoreError::Conflict`] after a bounded number of retries.

use std::collections::BTreeMap;
use std::time::Duration;

use aws_sdk_s3::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use carepath_core::hash::ContentHash;
use carepath_core::keys;
use carepath_core::models::artifact::ArtifactKind;
use carepath_core::models::audit::AuditRecord;
use carepath_core::models::delivery::Notification;
use carepath_core::models::intake::IntakeData;
use carepath_core::models::job::{JobPatch, ProcessingJob};
use carepath_core::models::risk::Answer;
use carepath_core::models::rule::{RuleKind, RuleStatus, RuleVersion};
use carepath_core::models::run::DiagnosisRun;

use crate::activation::ActivationPlan;
use crate::error::StoreError;
use crate::objects::{self, Precondition};
use crate::traits::{
    AnswerStore, ArtifactStore, BoxFuture, IntakeStore, JobStore, NotificationSink, ObjectStore,
    RuleStore, RunStore,
};

const MAX_CAS_ATTEMPTS: usize = 3;

/// Every version of one rule key and its audit trail, committed as a unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RuleKeyDocument {
    rule_key: String,
    versions: Vec<RuleVersion>,
    #[serde(default)]
    audit: Vec<AuditRecord>,
}

pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn save_new<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        objects::save_json(&self.client, &self.bucket, key, value, Precondition::IfAbsent)
            .await
            .map_err(|e| match e {
                StoreError::PreconditionFailed { key } => {
                    StoreError::Conflict(format!("{key} already exists"))
                }
                other => other,
            })?;
        Ok(())
    }

    async fn load_rule_document(
        &self,
        rule_key: &str,
    ) -> Result<Option<(RuleKeyDocument, String)>, StoreError> {
        objects::load_json(&self.client, &self.bucket, &keys::rule_key_document(rule_key)).await
    }

    async fn save_rule_document(
        &self,
        doc: &RuleKeyDocument,
        etag: Option<&str>,
    ) -> Result<(), StoreError> {
        let precondition = match etag {
            Some(etag) => Precondition::IfMatch(etag),
            None => Precondition::IfAbsent,
        };
        let key = keys::rule_key_document(&doc.rule_key);
        objects::save_json(&self.client, &self.bucket, &key, doc, precondition)
            .await
            .map_err(|e| match e {
                StoreError::PreconditionFailed { .. } => StoreError::Conflict(format!(
                    "rule key '{}' was modified concurrently",
                    doc.rule_key
                )),
                other => other,
            })?;
        Ok(())
    }

    async fn rule_key_for(&self, id: Uuid) -> Result<Option<String>, StoreError> {
        let index: Option<(BTreeMap<Uuid, String>, String)> =
            objects::load_json(&self.client, &self.bucket, keys::RULE_INDEX).await?;
        Ok(index.and_then(|(index, _)| index.get(&id).cloned()))
    }

    async fn index_rule_version(&self, id: Uuid, rule_key: &str) -> Result<(), StoreError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let loaded: Option<(BTreeMap<Uuid, String>, String)> =
                objects::load_json(&self.client, &self.bucket, keys::RULE_INDEX).await?;
            let (mut index, precondition_etag) = match loaded {
                Some((index, etag)) => (index, Some(etag)),
                None => (BTreeMap::new(), None),
            };
            index.insert(id, rule_key.to_string());
            let precondition = match precondition_etag.as_deref() {
                Some(etag) => Precondition::IfMatch(etag),
                None => Precondition::IfAbsent,
            };
            match objects::save_json(
                &self.client,
                &self.bucket,
                keys::RULE_INDEX,
                &index,
                precondition,
            )
            .await
            {
                Ok(_) => return Ok(()),
                Err(StoreError::PreconditionFailed { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::Conflict("rule index was modified concurrently".to_string()))
    }
}

impl JobStore for S3Store {
    fn get_job(&self, id: Uuid) -> BoxFuture<'_, Result<Option<ProcessingJob>, StoreError>> {
        Box::pin(async move {
            let loaded: Option<(ProcessingJob, String)> =
                objects::load_json(&self.client, &self.bucket, &keys::job(id)).await?;
            Ok(loaded.map(|(job, _)| job))
        })
    }

    fn insert_job(&self, job: ProcessingJob) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move { self.save_new(&keys::job(job.id), &job).await })
    }

    fn update_job(
        &self,
        id: Uuid,
        patch: JobPatch,
    ) -> BoxFuture<'_, Result<ProcessingJob, StoreError>> {
        Box::pin(async move {
            let key = keys::job(id);
            for _ in 0..MAX_CAS_ATTEMPTS {
                let Some((mut job, etag)) =
                    objects::load_json::<ProcessingJob>(&self.client, &self.bucket, &key).await?
                else {
                    return Err(StoreError::NotFound { key });
                };
                patch.clone().apply(&mut job);
                match objects::save_json(
                    &self.client,
                    &self.bucket,
                    &key,
                    &job,
                    Precondition::IfMatch(&etag),
                )
                .await
                {
                    Ok(_) => return Ok(job),
                    Err(StoreError::PreconditionFailed { .. }) => {
                        tracing::debug!(job_id = %id, "job update raced, retrying");
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(StoreError::Conflict(format!("job {id} was modified concurrently")))
        })
    }
}

impl ArtifactStore for S3Store {
    fn get_artifact(
        &self,
        job_id: Uuid,
        kind: ArtifactKind,
    ) -> BoxFuture<'_, Result<Option<Value>, StoreError>> {
        Box::pin(async move {
            let loaded: Option<(Value, String)> =
                objects::load_json(&self.client, &self.bucket, &keys::artifact(job_id, kind))
                    .await?;
            Ok(loaded.map(|(value, _)| value))
        })
    }

    fn put_artifact(
        &self,
        job_id: Uuid,
        kind: ArtifactKind,
        data: Value,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            objects::save_json(
                &self.client,
                &self.bucket,
                &keys::artifact(job_id, kind),
                &data,
                Precondition::None,
            )
            .await?;
            Ok(())
        })
    }
}

impl RuleStore for S3Store {
    fn get_version(&self, id: Uuid) -> BoxFuture<'_, Result<Option<RuleVersion>, StoreError>> {
        Box::pin(async move {
            let Some(rule_key) = self.rule_key_for(id).await? else {
                return Ok(None);
            };
            let doc = self.load_rule_document(&rule_key).await?;
            Ok(doc.and_then(|(doc, _)| doc.versions.into_iter().find(|v| v.id == id)))
        })
    }

    fn list_versions<'a>(
        &'a self,
        rule_key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<RuleVersion>, StoreError>> {
        Box::pin(async move {
            let mut versions = self
                .load_rule_document(rule_key)
                .await?
                .map(|(doc, _)| doc.versions)
                .unwrap_or_default();
            versions.sort_by_key(|v| v.version);
            Ok(versions)
        })
    }

    fn list_active_by_key<'a>(
        &'a self,
        rule_key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<RuleVersion>, StoreError>> {
        Box::pin(async move {
            let versions = self.list_versions(rule_key).await?;
            Ok(versions
                .into_iter()
                .filter(|v| v.status == RuleStatus::Active)
                .collect())
        })
    }

    fn list_active(&self, kind: RuleKind) -> BoxFuture<'_, Result<Vec<RuleVersion>, StoreError>> {
        Box::pin(async move {
            let index: Option<(BTreeMap<Uuid, String>, String)> =
                objects::load_json(&self.client, &self.bucket, keys::RULE_INDEX).await?;
            let mut rule_keys: Vec<String> = index
                .map(|(index, _)| index.into_values().collect())
                .unwrap_or_default();
            rule_keys.sort();
            rule_keys.dedup();

            let mut active = Vec::new();
            for rule_key in rule_keys {
                let versions = self.list_active_by_key(&rule_key).await?;
                active.extend(versions.into_iter().filter(|v| v.kind == kind));
            }
            Ok(active)
        })
    }

    fn insert_version(&self, version: RuleVersion) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let (mut doc, etag) = match self.load_rule_document(&version.rule_key).await? {
                Some((doc, etag)) => (doc, Some(etag)),
                None => (
                    RuleKeyDocument {
                        rule_key: version.rule_key.clone(),
                        ..RuleKeyDocument::default()
                    },
                    None,
                ),
            };
            if doc.versions.iter().any(|v| v.version == version.version) {
                return Err(StoreError::Conflict(format!(
                    "{} v{} already exists",
                    version.rule_key, version.version
                )));
            }
            let id = version.id;
            let rule_key = version.rule_key.clone();
            doc.versions.push(version);
            self.save_rule_document(&doc, etag.as_deref()).await?;
            self.index_rule_version(id, &rule_key).await
        })
    }

    fn put_version(&self, version: RuleVersion) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let id = version.id;
            let not_found = || StoreError::NotFound {
                key: format!("rule version {id}"),
            };
            let (mut doc, etag) = self
                .load_rule_document(&version.rule_key)
                .await?
                .ok_or_else(not_found)?;
            let slot = doc
                .versions
                .iter_mut()
                .find(|v| v.id == id)
                .ok_or_else(not_found)?;
            *slot = version;
            self.save_rule_document(&doc, Some(&etag)).await
        })
    }

    fn insert_audit(&self, record: AuditRecord) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let not_found = || StoreError::NotFound {
                key: format!("rule version {}", record.record_id),
            };
            let rule_key = self.rule_key_for(record.record_id).await?.ok_or_else(not_found)?;
            for _ in 0..MAX_CAS_ATTEMPTS {
                let (mut doc, etag) = self
                    .load_rule_document(&rule_key)
                    .await?
                    .ok_or_else(not_found)?;
                doc.audit.push(record.clone());
                match self.save_rule_document(&doc, Some(&etag)).await {
                    Ok(()) => return Ok(()),
                    Err(StoreError::Conflict(_)) => continue,
                    Err(e) => return Err(e),
                }
            }
            Err(StoreError::Conflict(format!(
                "rule key '{rule_key}' was modified concurrently"
            )))
        })
    }

    fn list_audit(&self, record_id: Uuid) -> BoxFuture<'_, Result<Vec<AuditRecord>, StoreError>> {
        Box::pin(async move {
            let Some(rule_key) = self.rule_key_for(record_id).await? else {
                return Ok(Vec::new());
            };
            let mut records: Vec<AuditRecord> = self
                .load_rule_document(&rule_key)
                .await?
                .map(|(doc, _)| doc.audit)
                .unwrap_or_default()
                .into_iter()
                .filter(|r| r.record_id == record_id)
                .collect();
            records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            Ok(records)
        })
    }

    /// Versions and audit records share the key's document, so the plan is
    /// one conditional write. A lost race re-reads and re-verifies.
    fn commit_activation<'a>(
        &'a self,
        plan: &'a ActivationPlan,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            for _ in 0..MAX_CAS_ATTEMPTS {
                let (mut doc, etag) = self
                    .load_rule_document(&plan.rule_key)
                    .await?
                    .ok_or_else(|| StoreError::NotFound {
                        key: keys::rule_key_document(&plan.rule_key),
                    })?;
                plan.verify(&doc.versions)?;
                for change in &plan.changes {
                    if let Some(slot) = doc.versions.iter_mut().find(|v| v.id == change.after.id) {
                        *slot = change.after.clone();
                    }
                }
                doc.audit.extend(plan.audit.iter().cloned());
                match self.save_rule_document(&doc, Some(&etag)).await {
                    Ok(()) => return Ok(()),
                    Err(StoreError::Conflict(_)) => {
                        tracing::debug!(rule_key = %plan.rule_key, "activation raced, retrying");
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(StoreError::Conflict(format!(
                "rule key '{}' was modified concurrently",
                plan.rule_key
            )))
        })
    }
}

impl RunStore for S3Store {
    fn find_runs<'a>(
        &'a self,
        patient_id: Uuid,
        inputs_hash: &'a ContentHash,
        since: jiff::Timestamp,
    ) -> BoxFuture<'a, Result<Vec<DiagnosisRun>, StoreError>> {
        Box::pin(async move {
            let keys =
                objects::list_objects(&self.client, &self.bucket, &keys::runs_prefix(patient_id))
                    .await?;
            let mut runs = Vec::new();
            for key in keys {
                if let Some((run, _)) =
                    objects::load_json::<DiagnosisRun>(&self.client, &self.bucket, &key).await?
                    && &run.inputs_hash == inputs_hash
                    && run.created_at >= since
                {
                    runs.push(run);
                }
            }
            runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(runs)
        })
    }

    fn insert_run(&self, run: DiagnosisRun) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move { self.save_new(&keys::run(run.patient_id, run.id), &run).await })
    }
}

impl AnswerStore for S3Store {
    fn list_answers(&self, assessment_id: Uuid) -> BoxFuture<'_, Result<Vec<Answer>, StoreError>> {
        Box::pin(async move {
            let loaded: Option<(Vec<Answer>, String)> =
                objects::load_json(&self.client, &self.bucket, &keys::answers(assessment_id))
                    .await?;
            Ok(loaded.map(|(answers, _)| answers).unwrap_or_default())
        })
    }
}

impl IntakeStore for S3Store {
    fn get_intake(
        &self,
        assessment_id: Uuid,
    ) -> BoxFuture<'_, Result<Option<IntakeData>, StoreError>> {
        Box::pin(async move {
            let loaded: Option<(IntakeData, String)> =
                objects::load_json(&self.client, &self.bucket, &keys::intake(assessment_id))
                    .await?;
            Ok(loaded.map(|(intake, _)| intake))
        })
    }
}

impl ObjectStore for S3Store {
    fn upload<'a>(
        &'a self,
        path: &'a str,
        bytes: Vec<u8>,
        content_type: &'a str,
    ) -> BoxFuture<'a, Result<String, StoreError>> {
        Box::pin(async move {
            objects::put_object(
                &self.client,
                &self.bucket,
                path,
                bytes,
                Some(content_type),
                Precondition::None,
            )
            .await?;
            Ok(path.to_string())
        })
    }

    fn delete<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<bool, StoreError>> {
        Box::pin(async move {
            if !objects::object_exists(&self.client, &self.bucket, path).await? {
                return Ok(false);
            }
            objects::delete_object(&self.client, &self.bucket, path).await?;
            Ok(true)
        })
    }

    fn signed_url<'a>(
        &'a self,
        path: &'a str,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<String, StoreError>> {
        Box::pin(async move { objects::presign_get(&self.client, &self.bucket, path, ttl).await })
    }
}

impl NotificationSink for S3Store {
    fn create_notification(
        &self,
        user_id: Uuid,
        payload: Value,
    ) -> BoxFuture<'_, Result<Uuid, StoreError>> {
        Box::pin(async move {
            let notification = Notification {
                id: Uuid::new_v4(),
                user_id,
                payload,
                created_at: jiff::Timestamp::now(),
            };
            self.save_new(&keys::notification(user_id, notification.id), &notification)
                .await?;
            Ok(notification.id)
        })
    }
}
