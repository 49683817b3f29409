use serde_json::json;
use uuid::Uuid;

use carepath_core::models::rule::{RuleKind, RuleStatus, RuleVersion};
use carepath_rules::guard;

fn version(kind: RuleKind, logic: serde_json::Value, defaults: serde_json::Value) -> RuleVersion {
    RuleVersion {
        id: Uuid::new_v4(),
        kind,
        rule_key: "k".to_string(),
        version: 1,
        status: RuleStatus::Draft,
        logic,
        defaults,
        change_reason: None,
        created_by: "ops".to_string(),
        created_at: jiff::Timestamp::now(),
        activated_at: None,
        archived_at: None,
    }
}

#[test]
fn valid_safety_rule_passes() {
    let v = version(
        RuleKind::SafetyRule,
        json!({
            "title": "Low oxygen saturation",
            "level": "urgent",
            "condition": { "type": "threshold", "path": "vitals.spo2", "op": "lt", "value": 92 }
        }),
        json!({"action_default": "same_day_review"}),
    );
    assert!(guard::check(&v).is_empty());
}

#[test]
fn unparseable_logic_is_reported_at_root() {
    let v = version(
        RuleKind::SafetyRule,
        json!({"title": "x", "level": "severe", "condition": {"type": "keyword", "keywords": ["a"]}}),
        json!({"action_default": "review"}),
    );
    let issues = guard::check(&v);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].path, "logic");
}

#[test]
fn empty_composite_is_reported_with_nested_path() {
    let v = version(
        RuleKind::SafetyRule,
        json!({
            "title": "Composite",
            "level": "advisory",
            "condition": {
                "type": "any",
                "conditions": [
                    { "type": "all", "conditions": [] },
                    { "type": "flag", "path": "", "equals": true }
                ]
            }
        }),
        json!({"action_default": "review"}),
    );
    let paths: Vec<_> = guard::check(&v).into_iter().map(|i| i.path).collect();
    assert_eq!(
        paths,
        vec![
            "logic.condition.conditions[0].conditions".to_string(),
            "logic.condition.conditions[1].path".to_string(),
        ]
    );
}

#[test]
fn scoring_config_rules() {
    let v = version(
        RuleKind::ScoringConfig,
        json!({
            "factors": [
                { "id": "sleep", "label": "Sleep", "question_ids": ["q1"], "weight": 1.0 },
                { "id": "sleep", "label": "Sleep again", "question_ids": [], "weight": 0.0 }
            ],
            "thresholds": { "moderate": 50, "high": 40, "critical": 90 }
        }),
        json!({ "interventions": [
            { "id": "i1", "topic": "sleep", "title": "Wind down", "impact": 1.5, "feasibility": 0.5 }
        ]}),
    );
    let paths: Vec<_> = guard::check(&v).into_iter().map(|i| i.path).collect();
    assert!(paths.contains(&"logic.factors[1].id".to_string()));
    assert!(paths.contains(&"logic.factors[1].question_ids".to_string()));
    assert!(paths.contains(&"logic.factors[1].weight".to_string()));
    assert!(paths.contains(&"logic.thresholds".to_string()));
    assert!(paths.contains(&"defaults.interventions[0].impact".to_string()));
    assert!(!paths.contains(&"defaults.interventions[0].feasibility".to_string()));
}

#[test]
fn scoring_config_without_factors_is_rejected() {
    let v = version(
        RuleKind::ScoringConfig,
        json!({ "factors": [], "thresholds": { "moderate": 10, "high": 20, "critical": 30 } }),
        json!(null),
    );
    let issues = guard::check(&v);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].path, "logic.factors");
}
