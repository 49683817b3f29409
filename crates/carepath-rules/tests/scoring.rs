use carepath_core::models::risk::{Answer, RiskLevel};
use carepath_rules::scoring::{FactorConfig, LevelThresholds, ScoringConfig, ScoringDefaults};

fn answer(question_id: &str, value: f64, max_value: f64) -> Answer {
    Answer {
        question_id: question_id.to_string(),
        value,
        max_value,
    }
}

fn config() -> ScoringConfig {
    ScoringConfig {
        factors: vec![
            FactorConfig {
                id: "sleep".to_string(),
                label: "Sleep".to_string(),
                question_ids: vec!["s1".to_string(), "s2".to_string()],
                weight: 1.0,
            },
            FactorConfig {
                id: "stress".to_string(),
                label: "Stress".to_string(),
                question_ids: vec!["t1".to_string()],
                weight: 3.0,
            },
            FactorConfig {
                id: "diet".to_string(),
                label: "Diet".to_string(),
                question_ids: vec!["d1".to_string()],
                weight: 2.0,
            },
        ],
        thresholds: LevelThresholds {
            moderate: 25.0,
            high: 50.0,
            critical: 75.0,
        },
    }
}

#[test]
fn weighted_mean_over_answered_factors() {
    let answers = vec![
        answer("s1", 2.0, 4.0),
        answer("s2", 4.0, 4.0),
        answer("t1", 8.0, 10.0),
        answer("ignored", 1.0, 0.0),
    ];
    let score = config().score(&answers);

    assert_eq!(score.factors[0].score, 75.0);
    assert_eq!(score.factors[0].answered_questions, 2);
    assert_eq!(score.factors[1].score, 80.0);
    assert_eq!(score.factors[2].score, 0.0);
    assert_eq!(score.factors[2].answered_questions, 0);
    // (75 * 1 + 80 * 3) / 4
    assert_eq!(score.overall, 78.75);
    assert_eq!(score.risk_level, RiskLevel::Critical);
}

#[test]
fn values_are_clamped_to_max() {
    let score = config().score(&[answer("d1", 12.0, 10.0)]);
    assert_eq!(score.factors[2].score, 100.0);
    assert_eq!(score.overall, 100.0);
}

#[test]
fn thresholds_map_levels_inclusively() {
    let t = config().thresholds;
    assert_eq!(t.level_for(0.0), RiskLevel::Low);
    assert_eq!(t.level_for(24.99), RiskLevel::Low);
    assert_eq!(t.level_for(25.0), RiskLevel::Moderate);
    assert_eq!(t.level_for(50.0), RiskLevel::High);
    assert_eq!(t.level_for(75.0), RiskLevel::Critical);
}

#[test]
fn builtin_catalog_used_unless_overridden() {
    let defaults = ScoringDefaults::default();
    assert!(!defaults.catalog().is_empty());
    for factor in &ScoringConfig::builtin().factors {
        assert!(
            defaults.catalog().iter().any(|i| i.topic == factor.id),
            "no intervention for {}",
            factor.id
        );
    }

    let overridden: ScoringDefaults = serde_json::from_value(serde_json::json!({
        "interventions": [
            { "id": "x", "topic": "sleep", "title": "Wind down", "impact": 0.5, "feasibility": 0.5 }
        ]
    }))
    .unwrap();
    assert_eq!(overridden.catalog().len(), 1);
}
