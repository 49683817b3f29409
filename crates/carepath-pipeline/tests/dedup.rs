mod common;

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use carepath_core::hash::{ContentHash, canonical_hash};
use carepath_core::models::run::{DiagnosisRun, RunStatus};
use carepath_pipeline::PipelineSettings;
use carepath_storage::{BoxFuture, MemoryStore, RunStore, StoreError};

use common::Harness;

/// Lookups always fail; inserts reach the inner store.
struct BlindRuns {
    inner: Arc<MemoryStore>,
}

impl RunStore for BlindRuns {
    fn find_runs<'a>(
        &'a self,
        _patient_id: Uuid,
        _inputs_hash: &'a ContentHash,
        _since: jiff::Timestamp,
    ) -> BoxFuture<'a, Result<Vec<DiagnosisRun>, StoreError>> {
        Box::pin(std::future::ready(Err(StoreError::Backend(
            "index offline".to_string(),
        ))))
    }

    fn insert_run(&self, run: DiagnosisRun) -> BoxFuture<'_, Result<(), StoreError>> {
        self.inner.insert_run(run)
    }
}

#[tokio::test]
async fn identical_inputs_within_window_are_suppressed() {
    let h = Harness::new().await;
    let patient = Uuid::new_v4();

    let first = h
        .pipeline
        .submit_diagnosis_run(patient, &json!({ "symptoms": ["cough"], "age": 54 }))
        .await
        .unwrap();
    let second = h
        .pipeline
        .submit_diagnosis_run(patient, &json!({ "age": 54, "symptoms": ["cough"] }))
        .await
        .unwrap();

    assert!(!first.is_duplicate);
    assert!(second.is_duplicate);
    assert_eq!(second.run_id, first.run_id);
    assert_eq!(second.inputs_hash, first.inputs_hash);
    assert_eq!(h.store.runs().len(), 1);
    assert_eq!(h.store.runs()[0].status, RunStatus::Created);

    let other = h
        .pipeline
        .submit_diagnosis_run(Uuid::new_v4(), &json!({ "symptoms": ["cough"], "age": 54 }))
        .await
        .unwrap();
    assert!(!other.is_duplicate);
    assert_eq!(h.store.runs().len(), 2);
}

#[tokio::test]
async fn runs_outside_the_window_do_not_count() {
    let h = Harness::new().await;
    let patient = Uuid::new_v4();
    let inputs = json!({ "symptoms": ["fever"] });
    let inputs_hash = canonical_hash("diagnosis-inputs/v1", &inputs).unwrap();
    h.store
        .insert_run(DiagnosisRun {
            id: Uuid::new_v4(),
            patient_id: patient,
            inputs_hash,
            status: RunStatus::Completed,
            created_at: jiff::Timestamp::now() - jiff::SignedDuration::from_hours(25),
        })
        .await
        .unwrap();

    let outcome = h.pipeline.check_duplicate_run(patient, &inputs).await.unwrap();
    assert!(!outcome.is_duplicate);
    assert_eq!(outcome.existing_run_id, None);
}

#[tokio::test]
async fn disabled_policy_never_suppresses() {
    let settings = PipelineSettings {
        dedup_enabled: false,
        ..PipelineSettings::default()
    };
    let h = Harness::with(settings, |_, stores| stores).await;
    let patient = Uuid::new_v4();
    let inputs = json!({ "symptoms": ["rash"] });

    for _ in 0..2 {
        let submission = h.pipeline.submit_diagnosis_run(patient, &inputs).await.unwrap();
        assert!(!submission.is_duplicate);
    }
    assert_eq!(h.store.runs().len(), 2);
}

#[tokio::test]
async fn lookup_failure_fails_open_with_a_warning() {
    let h = Harness::with(PipelineSettings::default(), |store, mut stores| {
        stores.runs = Arc::new(BlindRuns {
            inner: store.clone(),
        });
        stores
    })
    .await;

    let submission = h
        .pipeline
        .submit_diagnosis_run(Uuid::new_v4(), &json!({ "symptoms": ["headache"] }))
        .await
        .unwrap();
    assert!(!submission.is_duplicate);
    assert!(submission.warning.unwrap().contains("index offline"));
    assert_eq!(h.store.runs().len(), 1);
}
