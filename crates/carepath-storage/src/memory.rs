//! In-memory backend implementing every store trait.
//!
//! Used by tests and by embedders that keep state elsewhere. Each call takes
//! one short lock; no lock is ever held across an await.

use std::collections::{BTreeMap, HashMap};
use std::future::ready;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use carepath_core::hash::ContentHash;
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
use crate::traits::{
    AnswerStore, ArtifactStore, BoxFuture, IntakeStore, JobStore, NotificationSink, ObjectStore,
    RuleStore, RunStore,
};

#[derive(Default)]
struct Inner {
    jobs: HashMap<Uuid, ProcessingJob>,
    artifacts: HashMap<(Uuid, ArtifactKind), Value>,
    rules: BTreeMap<Uuid, RuleVersion>,
    audit: Vec<AuditRecord>,
    runs: Vec<DiagnosisRun>,
    answers: HashMap<Uuid, Vec<Answer>>,
    intake: HashMap<Uuid, IntakeData>,
    objects: BTreeMap<String, Vec<u8>>,
    notifications: Vec<Notification>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(
        &self,
        f: impl FnOnce(&mut Inner) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard: MutexGuard<'_, Inner> = self
            .inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))?;
        f(&mut guard)
    }

    pub fn seed_answers(&self, assessment_id: Uuid, answers: Vec<Answer>) {
        let _ = self.with(|inner| {
            inner.answers.insert(assessment_id, answers);
            Ok(())
        });
    }

    pub fn seed_intake(&self, assessment_id: Uuid, intake: IntakeData) {
        let _ = self.with(|inner| {
            inner.intake.insert(assessment_id, intake);
            Ok(())
        });
    }

    /// Paths of all stored objects, sorted.
    pub fn object_paths(&self) -> Vec<String> {
        self.with(|inner| Ok(inner.objects.keys().cloned().collect()))
            .unwrap_or_default()
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.with(|inner| Ok(inner.objects.get(path).cloned()))
            .ok()
            .flatten()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.with(|inner| Ok(inner.notifications.clone()))
            .unwrap_or_default()
    }

    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.with(|inner| Ok(inner.audit.clone())).unwrap_or_default()
    }

    pub fn runs(&self) -> Vec<DiagnosisRun> {
        self.with(|inner| Ok(inner.runs.clone())).unwrap_or_default()
    }
}

impl JobStore for MemoryStore {
    fn get_job(&self, id: Uuid) -> BoxFuture<'_, Result<Option<ProcessingJob>, StoreError>> {
        Box::pin(ready(self.with(|inner| Ok(inner.jobs.get(&id).cloned()))))
    }

    fn insert_job(&self, job: ProcessingJob) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(ready(self.with(|inner| {
            inner.jobs.insert(job.id, job);
            Ok(())
        })))
    }

    fn update_job(
        &self,
        id: Uuid,
        patch: JobPatch,
    ) -> BoxFuture<'_, Result<ProcessingJob, StoreError>> {
        Box::pin(ready(self.with(|inner| {
            let job = inner.jobs.get_mut(&id).ok_or_else(|| StoreError::NotFound {
                key: format!("job {id}"),
            })?;
            patch.apply(job);
            Ok(job.clone())
        })))
    }
}

impl ArtifactStore for MemoryStore {
    fn get_artifact(
        &self,
        job_id: Uuid,
        kind: ArtifactKind,
    ) -> BoxFuture<'_, Result<Option<Value>, StoreError>> {
        Box::pin(ready(
            self.with(|inner| Ok(inner.artifacts.get(&(job_id, kind)).cloned())),
        ))
    }

    fn put_artifact(
        &self,
        job_id: Uuid,
        kind: ArtifactKind,
        data: Value,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(ready(self.with(|inner| {
            inner.artifacts.insert((job_id, kind), data);
            Ok(())
        })))
    }
}

impl RuleStore for MemoryStore {
    fn get_version(&self, id: Uuid) -> BoxFuture<'_, Result<Option<RuleVersion>, StoreError>> {
        Box::pin(ready(self.with(|inner| Ok(inner.rules.get(&id).cloned()))))
    }

    fn list_versions<'a>(
        &'a self,
        rule_key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<RuleVersion>, StoreError>> {
        Box::pin(ready(self.with(|inner| {
            let mut versions: Vec<_> = inner
                .rules
                .values()
                .filter(|v| v.rule_key == rule_key)
                .cloned()
                .collect();
            versions.sort_by_key(|v| v.version);
            Ok(versions)
        })))
    }

    fn list_active_by_key<'a>(
        &'a self,
        rule_key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<RuleVersion>, StoreError>> {
        Box::pin(ready(self.with(|inner| {
            let mut versions: Vec<_> = inner
                .rules
                .values()
                .filter(|v| v.rule_key == rule_key && v.status == RuleStatus::Active)
                .cloned()
                .collect();
            versions.sort_by_key(|v| v.version);
            Ok(versions)
        })))
    }

    fn list_active(&self, kind: RuleKind) -> BoxFuture<'_, Result<Vec<RuleVersion>, StoreError>> {
        Box::pin(ready(self.with(|inner| {
            let mut versions: Vec<_> = inner
                .rules
                .values()
                .filter(|v| v.kind == kind && v.status == RuleStatus::Active)
                .cloned()
                .collect();
            versions.sort_by(|a, b| (&a.rule_key, a.version).cmp(&(&b.rule_key, b.version)));
            Ok(versions)
        })))
    }

    fn insert_version(&self, version: RuleVersion) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(ready(self.with(|inner| {
            let taken = inner
                .rules
                .values()
                .any(|v| v.rule_key == version.rule_key && v.version == version.version);
            if taken {
                return Err(StoreError::Conflict(format!(
                    "{} v{} already exists",
                    version.rule_key, version.version
                )));
            }
            inner.rules.insert(version.id, version);
            Ok(())
        })))
    }

    fn put_version(&self, version: RuleVersion) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(ready(self.with(|inner| {
            let slot = inner.rules.get_mut(&version.id).ok_or_else(|| StoreError::NotFound {
                key: format!("rule version {}", version.id),
            })?;
            *slot = version;
            Ok(())
        })))
    }

    fn insert_audit(&self, record: AuditRecord) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(ready(self.with(|inner| {
            inner.audit.push(record);
            Ok(())
        })))
    }

    fn list_audit(&self, record_id: Uuid) -> BoxFuture<'_, Result<Vec<AuditRecord>, StoreError>> {
        Box::pin(ready(self.with(|inner| {
            Ok(inner
                .audit
                .iter()
                .filter(|r| r.record_id == record_id)
                .cloned()
                .collect())
        })))
    }

    /// Verified and applied under one lock, so the plan lands whole or not at all.
    fn commit_activation<'a>(
        &'a self,
        plan: &'a ActivationPlan,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(ready(self.with(|inner| {
            let current: Vec<RuleVersion> = inner
                .rules
                .values()
                .filter(|v| v.rule_key == plan.rule_key)
                .cloned()
                .collect();
            plan.verify(&current)?;
            for change in &plan.changes {
                inner.rules.insert(change.after.id, change.after.clone());
            }
            inner.audit.extend(plan.audit.iter().cloned());
            Ok(())
        })))
    }
}

impl RunStore for MemoryStore {
    fn find_runs<'a>(
        &'a self,
        patient_id: Uuid,
        inputs_hash: &'a ContentHash,
        since: jiff::Timestamp,
    ) -> BoxFuture<'a, Result<Vec<DiagnosisRun>, StoreError>> {
        Box::pin(ready(self.with(|inner| {
            let mut runs: Vec<_> = inner
                .runs
                .iter()
                .filter(|r| {
                    r.patient_id == patient_id
                        && &r.inputs_hash == inputs_hash
                        && r.created_at >= since
                })
                .cloned()
                .collect();
            runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(runs)
        })))
    }

    fn insert_run(&self, run: DiagnosisRun) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(ready(self.with(|inner| {
            inner.runs.push(run);
            Ok(())
        })))
    }
}

impl AnswerStore for MemoryStore {
    fn list_answers(&self, assessment_id: Uuid) -> BoxFuture<'_, Result<Vec<Answer>, StoreError>> {
        Box::pin(ready(self.with(|inner| {
            Ok(inner.answers.get(&assessment_id).cloned().unwrap_or_default())
        })))
    }
}

impl IntakeStore for MemoryStore {
    fn get_intake(
        &self,
        assessment_id: Uuid,
    ) -> BoxFuture<'_, Result<Option<IntakeData>, StoreError>> {
        Box::pin(ready(
            self.with(|inner| Ok(inner.intake.get(&assessment_id).cloned())),
        ))
    }
}

impl ObjectStore for MemoryStore {
    fn upload<'a>(
        &'a self,
        path: &'a str,
        bytes: Vec<u8>,
        _content_type: &'a str,
    ) -> BoxFuture<'a, Result<String, StoreError>> {
        Box::pin(ready(self.with(|inner| {
            inner.objects.insert(path.to_string(), bytes);
            Ok(path.to_string())
        })))
    }

    fn delete<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<bool, StoreError>> {
        Box::pin(ready(
            self.with(|inner| Ok(inner.objects.remove(path).is_some())),
        ))
    }

    fn signed_url<'a>(
        &'a self,
        path: &'a str,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<String, StoreError>> {
        Box::pin(ready(self.with(|inner| {
            if !inner.objects.contains_key(path) {
                return Err(StoreError::NotFound {
                    key: path.to_string(),
                });
            }
            Ok(format!("memory://{path}?expires_in={}", ttl.as_secs()))
        })))
    }
}

impl NotificationSink for MemoryStore {
    fn create_notification(
        &self,
        user_id: Uuid,
        payload: Value,
    ) -> BoxFuture<'_, Result<Uuid, StoreError>> {
        Box::pin(ready(self.with(|inner| {
            let notification = Notification {
                id: Uuid::new_v4(),
                user_id,
                payload,
                created_at: jiff::Timestamp::now(),
            };
            let id = notification.id;
            inner.notifications.push(notification);
            Ok(id)
        })))
    }
}
