use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use carepath_core::hash::hash_value;
use carepath_core::models::artifact::ArtifactKind;
use carepath_core::models::job::{JobPatch, JobStatus, ProcessingJob, Stage};
use carepath_core::models::rule::{RuleKind, RuleStatus, RuleVersion};
use carepath_core::models::run::{DiagnosisRun, RunStatus};
use carepath_storage::{
    ActivationPlan, ArtifactStore, JobStore, MemoryStore, NotificationSink, ObjectStore,
    RuleStore, RunStore, StatusChange, StoreError, artifacts,
};

fn rule(key: &str, version: u32, status: RuleStatus) -> RuleVersion {
    RuleVersion {
        id: Uuid::new_v4(),
        kind: RuleKind::SafetyRule,
        rule_key: key.to_string(),
        version,
        status,
        logic: json!({}),
        defaults: json!({}),
        change_reason: None,
        created_by: "tester".to_string(),
        created_at: jiff::Timestamp::now(),
        activated_at: None,
        archived_at: None,
    }
}

#[tokio::test]
async fn update_job_applies_patch() {
    let store = MemoryStore::new();
    let job = ProcessingJob::new(Uuid::new_v4(), Uuid::new_v4(), 3);
    let id = job.id;
    store.insert_job(job).await.unwrap();

    let updated = store
        .update_job(
            id,
            JobPatch {
                stage: Some(Stage::Ranking),
                status: Some(JobStatus::Running),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.stage, Stage::Ranking);
    assert_eq!(updated.status, JobStatus::Running);
    let fetched = store.get_job(id).await.unwrap().unwrap();
    assert_eq!(fetched.stage, Stage::Ranking);
}

#[tokio::test]
async fn update_missing_job_is_not_found() {
    let store = MemoryStore::new();
    let err = store
        .update_job(Uuid::new_v4(), JobPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn artifact_upsert_replaces_previous_value() {
    let store = MemoryStore::new();
    let job_id = Uuid::new_v4();

    artifacts::save(&store, job_id, ArtifactKind::Ranking, &json!({"n": 1}))
        .await
        .unwrap();
    artifacts::save(&store, job_id, ArtifactKind::Ranking, &json!({"n": 2}))
        .await
        .unwrap();

    let loaded: Option<serde_json::Value> = artifacts::load(&store, job_id, ArtifactKind::Ranking)
        .await
        .unwrap();
    assert_eq!(loaded, Some(json!({"n": 2})));
    assert!(
        store
            .get_artifact(job_id, ArtifactKind::Sections)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn duplicate_rule_version_number_conflicts() {
    let store = MemoryStore::new();
    store
        .insert_version(rule("chest_pain", 1, RuleStatus::Draft))
        .await
        .unwrap();
    let err = store
        .insert_version(rule("chest_pain", 1, RuleStatus::Draft))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn commit_activation_applies_plan_under_one_lock() {
    let store = MemoryStore::new();
    let v1 = rule("chest_pain", 1, RuleStatus::Active);
    let v2 = rule("chest_pain", 2, RuleStatus::Draft);
    store.insert_version(v1.clone()).await.unwrap();
    store.insert_version(v2.clone()).await.unwrap();

    let archive = StatusChange::to(&v1, RuleStatus::Archived, None).unwrap();
    let activate =
        StatusChange::to(&v2, RuleStatus::Active, Some("tighten threshold".to_string())).unwrap();
    let plan = ActivationPlan {
        rule_key: "chest_pain".to_string(),
        changes: vec![archive, activate],
        audit: vec![],
    };
    assert_eq!(plan.activated().map(|v| v.id), Some(v2.id));
    store.commit_activation(&plan).await.unwrap();

    let active = store.list_active_by_key("chest_pain").await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, v2.id);
    assert!(active[0].activated_at.is_some());
    assert_eq!(active[0].change_reason.as_deref(), Some("tighten threshold"));
    let archived = store.get_version(v1.id).await.unwrap().unwrap();
    assert!(archived.archived_at.is_some());

    // Replaying the same plan finds v2 already active.
    let err = store.commit_activation(&plan).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn status_change_rejects_illegal_edge() {
    let archived = rule("chest_pain", 1, RuleStatus::Archived);
    let err = StatusChange::to(&archived, RuleStatus::Active, None).unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition(_)));
}

#[tokio::test]
async fn find_runs_filters_by_hash_and_window_newest_first() {
    let store = MemoryStore::new();
    let patient = Uuid::new_v4();
    let hash = hash_value("diagnosis-inputs/v1", &json!({"a": 1}));
    let other = hash_value("diagnosis-inputs/v1", &json!({"a": 2}));
    let now = jiff::Timestamp::now();

    let run = |inputs_hash, minutes_ago: i64| DiagnosisRun {
        id: Uuid::new_v4(),
        patient_id: patient,
        inputs_hash,
        status: RunStatus::Created,
        created_at: now - jiff::SignedDuration::from_mins(minutes_ago),
    };
    let older = run(hash.clone(), 90);
    let newer = run(hash.clone(), 10);
    let stale = run(hash.clone(), 60 * 48);
    store.insert_run(older.clone()).await.unwrap();
    store.insert_run(newer.clone()).await.unwrap();
    store.insert_run(stale).await.unwrap();
    store.insert_run(run(other, 5)).await.unwrap();

    let since = now - jiff::SignedDuration::from_hours(24);
    let found = store.find_runs(patient, &hash, since).await.unwrap();
    let ids: Vec<_> = found.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![newer.id, older.id]);
}

#[tokio::test]
async fn objects_upload_delete_and_sign() {
    let store = MemoryStore::new();
    store
        .upload("jobs/a/report.pdf", b"%PDF".to_vec(), "application/pdf")
        .await
        .unwrap();

    let url = store
        .signed_url("jobs/a/report.pdf", Duration::from_secs(900))
        .await
        .unwrap();
    assert!(url.contains("expires_in=900"));

    assert!(store.delete("jobs/a/report.pdf").await.unwrap());
    assert!(!store.delete("jobs/a/report.pdf").await.unwrap());
    assert!(
        store
            .signed_url("jobs/a/report.pdf", Duration::from_secs(60))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn notifications_are_recorded() {
    let store = MemoryStore::new();
    let user = Uuid::new_v4();
    let id = store
        .create_notification(user, json!({"kind": "report_ready"}))
        .await
        .unwrap();

    let notifications = store.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].id, id);
    assert_eq!(notifications[0].user_id, user);
}
