use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::hash::ContentHash;
use crate::models::rule::RuleKind;

/// The safety stage's verdict, evaluated against a specific rule snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SafetyCheck {
    pub id: Uuid,
    pub job_id: Uuid,
    /// 0–100, higher is safer.
    pub safety_score: f64,
    pub recommended_action: String,
    pub requires_review: bool,
    pub is_new_check: bool,
    pub escalation_level: EscalationLevel,
    pub red_flags: Vec<String>,
    pub triggered_rules: Vec<TriggeredRule>,
    pub rule_snapshot: Vec<RuleVersionRef>,
    /// Hash over the rule snapshot and intake data.
    pub inputs_hash: ContentHash,
    pub evaluated_at: jiff::Timestamp,
}

/// Escalation levels, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum EscalationLevel {
    #[default]
    None,
    Advisory,
    Urgent,
    Emergency,
}

impl EscalationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Advisory => "advisory",
            Self::Urgent => "urgent",
            Self::Emergency => "emergency",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TriggeredRule {
    pub rule_id: Uuid,
    pub rule_key: String,
    pub version: u32,
    pub title: String,
    pub level: EscalationLevel,
    /// True when the match came from structured intake rather than free text.
    pub verified: bool,
    pub evidence: Vec<String>,
    pub action: String,
}

/// Identifies the exact rule version a verdict was computed against.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RuleVersionRef {
    pub rule_key: String,
    pub kind: RuleKind,
    pub version: u32,
    pub id: Uuid,
}
