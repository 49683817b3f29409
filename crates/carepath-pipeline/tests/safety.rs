mod common;

use serde_json::json;

use carepath_core::models::artifact::ArtifactKind;
use carepath_core::models::job::{JobPatch, JobStatus, Stage};
use carepath_core::models::rule::{RuleKind, RuleStatus};
use carepath_core::models::safety::{EscalationLevel, SafetyCheck};
use carepath_pipeline::{ErrorCode, PipelineSettings, StageArgs};
use carepath_rules::RuleSelection;
use carepath_storage::{JobStore, artifacts};

use common::{FailingArtifacts, Harness, chest_pain_intake, chest_pain_rule};

#[tokio::test]
async fn pinned_sandbox_evaluation_is_deterministic() {
    let h = Harness::new().await;
    let active = h
        .activate_safety_rule("chest_pain", chest_pain_rule("advisory"), "monitor")
        .await;
    let registry = h.pipeline.registry();
    let mut drafts = Vec::new();
    for level in ["urgent", "emergency"] {
        drafts.push(
            registry
                .create_draft(
                    RuleKind::SafetyRule,
                    "chest_pain",
                    chest_pain_rule(level),
                    json!({ "action_default": "call_emergency" }),
                    "clinical-ops",
                    None,
                )
                .await
                .unwrap(),
        );
    }
    let v3 = &drafts[1];
    assert_eq!(v3.version, 3);

    let selection = RuleSelection::active().pin(v3.id);
    let intake = chest_pain_intake();
    let first = h
        .pipeline
        .evaluate_safety_sandbox(&intake, &selection)
        .await
        .unwrap();
    let second = h
        .pipeline
        .evaluate_safety_sandbox(&intake, &selection)
        .await
        .unwrap();

    assert_eq!(first.verdict.escalation_level, EscalationLevel::Emergency);
    assert_eq!(first.recommended_action, "call_emergency");
    assert_eq!(
        serde_json::to_vec(&first.verdict.triggered_rules).unwrap(),
        serde_json::to_vec(&second.verdict.triggered_rules).unwrap()
    );
    assert_eq!(first.verdict.escalation_level, second.verdict.escalation_level);
    assert_eq!(first.rule_snapshot.len(), 1);
    assert_eq!(first.rule_snapshot[0].id, v3.id);

    let current = registry.active_version("chest_pain").await.unwrap().unwrap();
    assert_eq!(current.id, active.id);
    assert_eq!(registry.get(v3.id).await.unwrap().status, RuleStatus::Draft);
}

#[tokio::test]
async fn safety_stage_evaluates_active_rules_once() {
    let h = Harness::new().await;
    h.store.seed_intake(h.job.assessment_id, chest_pain_intake());
    h.activate_safety_rule("chest_pain", chest_pain_rule("urgent"), "same_day_review")
        .await;
    h.run_until(Stage::Safety).await;

    let first = h
        .pipeline
        .safety(h.job.id, &RuleSelection::active())
        .await
        .unwrap()
        .check;
    assert!(first.is_new_check);
    assert_eq!(first.escalation_level, EscalationLevel::Urgent);
    assert_eq!(first.safety_score, 70.0);
    assert_eq!(first.recommended_action, "same_day_review");
    assert!(first.requires_review);
    assert_eq!(first.red_flags, vec!["chest_pain"]);
    assert!(!first.triggered_rules[0].verified);

    let again = h
        .pipeline
        .safety(h.job.id, &RuleSelection::active())
        .await
        .unwrap()
        .check;
    assert!(!again.is_new_check);
    assert_eq!(again.id, first.id);
    assert_eq!(again.inputs_hash, first.inputs_hash);
    assert_eq!(h.current().await.stage, Stage::Validation);
}

#[tokio::test]
async fn pinned_rules_flow_through_process() {
    let h = Harness::new().await;
    h.store.seed_intake(h.job.assessment_id, chest_pain_intake());
    let draft = h
        .pipeline
        .registry()
        .create_draft(
            RuleKind::SafetyRule,
            "chest_pain",
            chest_pain_rule("advisory"),
            json!({ "action_default": "monitor" }),
            "clinical-ops",
            None,
        )
        .await
        .unwrap();
    h.run_until(Stage::Safety).await;

    let args = StageArgs {
        pinned_rules: vec![draft.id],
        ..StageArgs::default()
    };
    let data = h
        .pipeline
        .process(Stage::Safety, h.job.id, args)
        .await
        .unwrap();
    assert_eq!(data["check"]["escalation_level"], "advisory");
    assert_eq!(data["check"]["rule_snapshot"][0]["id"], json!(draft.id));
}

#[tokio::test]
async fn safety_requires_sections() {
    let h = Harness::new().await;
    h.store
        .update_job(
            h.job.id,
            JobPatch {
                stage: Some(Stage::Safety),
                ..JobPatch::default()
            },
        )
        .await
        .unwrap();

    let err = h
        .pipeline
        .safety(h.job.id, &RuleSelection::active())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::LoadSectionsFailed);
    assert!(err.is_retryable());
    assert_eq!(h.current().await.status, JobStatus::Failed);
}

#[tokio::test]
async fn failed_save_keeps_the_verdict_for_retry() {
    let mut hook = None;
    let h = Harness::with(PipelineSettings::default(), |store, mut stores| {
        let failing = FailingArtifacts::new(store.clone(), ArtifactKind::SafetyCheck);
        stores.artifacts = failing.clone();
        hook = Some(failing);
        stores
    })
    .await;
    let failing = hook.unwrap();
    h.store.seed_intake(h.job.assessment_id, chest_pain_intake());
    h.activate_safety_rule("chest_pain", chest_pain_rule("urgent"), "same_day_review")
        .await;
    h.run_until(Stage::Safety).await;

    failing.arm(true);
    let err = h
        .pipeline
        .safety(h.job.id, &RuleSelection::active())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::SaveFailed);
    assert!(err.is_retryable());
    let details = err.details.unwrap();
    let check: SafetyCheck = serde_json::from_value(details["safety_check"].clone()).unwrap();
    assert_eq!(check.escalation_level, EscalationLevel::Urgent);
    assert_eq!(h.current().await.status, JobStatus::Failed);

    failing.arm(false);
    let saved = h
        .pipeline
        .retry_safety_save(h.job.id, check.clone())
        .await
        .unwrap();
    assert_eq!(saved.check, check);

    let stored: SafetyCheck = artifacts::load(&*h.store, h.job.id, ArtifactKind::SafetyCheck)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.id, check.id);
    let job = h.current().await;
    assert_eq!(job.stage, Stage::Validation);
    assert_eq!(job.status, JobStatus::Queued);
}

#[tokio::test]
async fn retry_save_rejects_a_foreign_check() {
    let h = Harness::new().await;
    let other = h
        .pipeline
        .create_job(h.job.assessment_id, uuid::Uuid::new_v4())
        .await
        .unwrap();
    h.run_until(Stage::Validation).await;
    let check = h
        .pipeline
        .safety(h.job.id, &RuleSelection::active())
        .await
        .unwrap()
        .check;

    let err = h
        .pipeline
        .retry_safety_save(other.id, check)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);
}
