//! Scoring configuration: the `logic` and `defaults` of a `scoring_config`
//! rule version, and the built-in configuration used when none is active.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use carepath_core::models::risk::{Answer, RiskFactor, RiskLevel, RiskScore};

/// Rule key of the scoring configuration the risk and ranking stages read.
pub const SCORING_CONFIG_KEY: &str = "risk_scoring";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ScoringConfig {
    pub factors: Vec<FactorConfig>,
    pub thresholds: LevelThresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FactorConfig {
    pub id: String,
    pub label: String,
    pub question_ids: Vec<String>,
    pub weight: f64,
}

/// Lower bounds (inclusive, 0–100) of each level above `low`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LevelThresholds {
    pub moderate: f64,
    pub high: f64,
    pub critical: f64,
}

impl LevelThresholds {
    pub fn level_for(&self, overall: f64) -> RiskLevel {
        if overall >= self.critical {
            RiskLevel::Critical
        } else if overall >= self.high {
            RiskLevel::High
        } else if overall >= self.moderate {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }
}

/// A scoring config's `defaults` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ScoringDefaults {
    /// Replaces the built-in intervention catalog when present.
    #[serde(default)]
    pub interventions: Option<Vec<InterventionTemplate>>,
}

impl ScoringDefaults {
    pub fn catalog(&self) -> &[InterventionTemplate] {
        match &self.interventions {
            Some(interventions) => interventions.as_slice(),
            None => DEFAULT_CATALOG.as_slice(),
        }
    }
}

/// A catalog entry the ranking stage can recommend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InterventionTemplate {
    pub id: String,
    /// Factor id this intervention addresses.
    pub topic: String,
    pub title: String,
    /// 0–1, effect at full factor risk.
    pub impact: f64,
    /// 0–1.
    pub feasibility: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl ScoringConfig {
    /// Score `answers` against this configuration.
    ///
    /// Each factor scores the mean normalized value of its answered questions
    /// (0–100). The overall score is the weight-averaged score of factors with
    /// at least one answer. Answers with a non-positive `max_value` are ignored.
    pub fn score(&self, answers: &[Answer]) -> RiskScore {
        let by_question: HashMap<&str, &Answer> = answers
            .iter()
            .filter(|a| a.max_value > 0.0)
            .map(|a| (a.question_id.as_str(), a))
            .collect();

        let mut factors = Vec::with_capacity(self.factors.len());
        let mut weighted = 0.0;
        let mut total_weight = 0.0;

        for factor in &self.factors {
            let normalized: Vec<f64> = factor
                .question_ids
                .iter()
                .filter_map(|q| by_question.get(q.as_str()))
                .map(|a| (a.value / a.max_value).clamp(0.0, 1.0))
                .collect();
            let answered = normalized.len() as u32;
            let score = if normalized.is_empty() {
                0.0
            } else {
                round2(normalized.iter().sum::<f64>() / normalized.len() as f64 * 100.0)
            };
            if answered > 0 {
                weighted += score * factor.weight;
                total_weight += factor.weight;
            }
            factors.push(RiskFactor {
                factor_id: factor.id.clone(),
                label: factor.label.clone(),
                score,
                weight: factor.weight,
                answered_questions: answered,
            });
        }

        let overall = if total_weight > 0.0 {
            round2(weighted / total_weight)
        } else {
            0.0
        };

        RiskScore {
            overall,
            risk_level: self.thresholds.level_for(overall),
            factors,
        }
    }

    pub fn builtin() -> &'static ScoringConfig {
        &DEFAULT_CONFIG
    }
}

fn factor(id: &str, label: &str, questions: &[&str], weight: f64) -> FactorConfig {
    FactorConfig {
        id: id.to_string(),
        label: label.to_string(),
        question_ids: questions.iter().map(|q| q.to_string()).collect(),
        weight,
    }
}

fn intervention(
    id: &str,
    topic: &str,
    title: &str,
    impact: f64,
    feasibility: f64,
) -> InterventionTemplate {
    InterventionTemplate {
        id: id.to_string(),
        topic: topic.to_string(),
        title: title.to_string(),
        impact,
        feasibility,
    }
}

static DEFAULT_CONFIG: LazyLock<ScoringConfig> = LazyLock::new(|| ScoringConfig {
    factors: vec![
        factor("cardiometabolic", "Cardiometabolic", &["bp", "glucose", "bmi"], 1.5),
        factor("activity", "Physical activity", &["exercise_days", "sitting_hours"], 1.0),
        factor("nutrition", "Nutrition", &["vegetables", "processed_food", "sugary_drinks"], 1.0),
        factor("sleep", "Sleep", &["sleep_hours", "sleep_quality"], 0.8),
        factor("stress", "Stress and mood", &["stress", "low_mood"], 1.0),
        factor("substances", "Tobacco and alcohol", &["tobacco", "alcohol"], 1.2),
    ],
    thresholds: LevelThresholds {
        moderate: 25.0,
        high: 50.0,
        critical: 75.0,
    },
});

static DEFAULT_CATALOG: LazyLock<Vec<InterventionTemplate>> = LazyLock::new(|| {
    vec![
        intervention(
            "bp_monitoring",
            "cardiometabolic",
            "Home blood pressure monitoring",
            0.8,
            0.8,
        ),
        intervention("metabolic_panel", "cardiometabolic", "Fasting metabolic panel", 0.7, 0.6),
        intervention("walking_plan", "activity", "Daily 30-minute walking plan", 0.7, 0.9),
        intervention("strength_training", "activity", "Twice-weekly strength training", 0.6, 0.5),
        intervention("plate_method", "nutrition", "Balanced plate method", 0.6, 0.8),
        intervention("drink_swap", "nutrition", "Replace sugary drinks with water", 0.5, 0.9),
        intervention("sleep_schedule", "sleep", "Fixed sleep and wake schedule", 0.6, 0.7),
        intervention("cbt_i", "sleep", "CBT for insomnia", 0.8, 0.3),
        intervention("breathing", "stress", "Daily guided breathing", 0.4, 0.9),
        intervention("counselling", "stress", "Counselling referral", 0.8, 0.4),
        intervention("quit_program", "substances", "Smoking cessation program", 0.9, 0.4),
        intervention("alcohol_limits", "substances", "Alcohol reduction goals", 0.6, 0.6),
    ]
});
