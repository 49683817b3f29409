mod common;

use serde_json::{Value, json};
use uuid::Uuid;

use carepath_core::models::job::Stage;
use carepath_core::models::risk::RiskLevel;
use carepath_core::models::rule::{RuleKind, RuleStatus};
use carepath_pipeline::ErrorCode;
use carepath_rules::SCORING_CONFIG_KEY;

use common::{Harness, chest_pain_rule};

async fn draft(h: &Harness, kind: RuleKind, key: &str, logic: Value, defaults: Value) -> Uuid {
    h.pipeline
        .registry()
        .create_draft(kind, key, logic, defaults, "clinical-ops", None)
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn activation_leaves_one_active_version() {
    let h = Harness::new().await;
    let v1 = h
        .activate_safety_rule("chest_pain", chest_pain_rule("urgent"), "same_day_review")
        .await;
    let v2 = draft(
        &h,
        RuleKind::SafetyRule,
        "chest_pain",
        chest_pain_rule("emergency"),
        json!({ "action_default": "call_emergency" }),
    )
    .await;

    let out = h
        .pipeline
        .activate_rule_version(v2, Some("escalate chest pain".to_string()), "medical-director")
        .await
        .unwrap();
    assert_eq!(out.activated.id, v2);
    assert_eq!(out.archived.len(), 1);
    assert_eq!(out.archived[0].id, v1.id);

    let versions = h.pipeline.registry().list_versions("chest_pain").await.unwrap();
    let statuses: Vec<RuleStatus> = versions.iter().map(|v| v.status).collect();
    assert_eq!(statuses, vec![RuleStatus::Archived, RuleStatus::Active]);
    h.pipeline
        .registry()
        .check_consistency("chest_pain")
        .await
        .unwrap();

    let transitions: Vec<_> = h
        .store
        .audit_records()
        .into_iter()
        .filter(|r| r.record_id == v2 && r.operation == "activate")
        .collect();
    assert_eq!(transitions.len(), 1);
    assert_eq!(transitions[0].changed_by, "medical-director");
}

#[tokio::test]
async fn guard_rejection_changes_nothing() {
    let h = Harness::new().await;
    let id = draft(
        &h,
        RuleKind::SafetyRule,
        "empty_keywords",
        json!({
            "title": "",
            "level": "urgent",
            "condition": { "type": "keyword", "keywords": [] }
        }),
        json!({}),
    )
    .await;
    let audit_before = h.store.audit_records().len();

    let err = h
        .pipeline
        .activate_rule_version(id, None, "clinical-ops")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ActivationGuardFailed);
    assert!(!err.is_retryable());
    let issues = err.details.unwrap()["issues"].as_array().unwrap().clone();
    let paths: Vec<&str> = issues.iter().filter_map(|i| i["path"].as_str()).collect();
    assert!(paths.contains(&"logic.title"));
    assert!(paths.contains(&"logic.condition.keywords"));
    assert!(paths.contains(&"defaults.action_default"));

    let version = h.pipeline.registry().get(id).await.unwrap();
    assert_eq!(version.status, RuleStatus::Draft);
    assert_eq!(h.store.audit_records().len(), audit_before);
}

#[tokio::test]
async fn only_drafts_can_be_activated() {
    let h = Harness::new().await;
    let active = h
        .activate_safety_rule("chest_pain", chest_pain_rule("urgent"), "same_day_review")
        .await;

    let err = h
        .pipeline
        .activate_rule_version(active.id, None, "clinical-ops")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);
    assert!(err.message.contains("only draft versions can be activated"));

    let err = h
        .pipeline
        .activate_rule_version(Uuid::new_v4(), None, "clinical-ops")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn active_scoring_config_drives_risk_and_ranking() {
    let h = Harness::new().await;
    let id = draft(
        &h,
        RuleKind::ScoringConfig,
        SCORING_CONFIG_KEY,
        json!({
            "factors": [
                { "id": "sleep", "label": "Sleep", "question_ids": ["sleep_hours"], "weight": 1.0 }
            ],
            "thresholds": { "moderate": 10.0, "high": 20.0, "critical": 30.0 }
        }),
        json!({
            "interventions": [
                { "id": "naps", "topic": "sleep", "title": "Short afternoon naps", "impact": 0.5, "feasibility": 1.0 }
            ]
        }),
    )
    .await;
    h.pipeline
        .activate_rule_version(id, None, "clinical-ops")
        .await
        .unwrap();

    let risk = h.pipeline.risk(h.job.id).await.unwrap().bundle;
    assert_eq!(risk.scoring_config_version, Some(1));
    assert_eq!(risk.risk_score.overall, 80.0);
    assert_eq!(risk.risk_score.risk_level, RiskLevel::Critical);
    assert_eq!(h.current().await.stage, Stage::Ranking);

    let ranking = h.pipeline.ranking(h.job.id, None, None).await.unwrap().ranking;
    assert_eq!(ranking.top_n, 5);
    assert_eq!(ranking.top_interventions.len(), 1);
    assert_eq!(ranking.top_interventions[0].intervention_id, "naps");
    assert_eq!(ranking.top_interventions[0].priority_score, 40.0);
}
