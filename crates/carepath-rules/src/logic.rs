//! Typed shape of a safety rule's `logic` and `defaults` documents.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use carepath_core::models::intake::Speaker;
use carepath_core::models::safety::EscalationLevel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RuleLogic {
    pub title: String,
    pub level: EscalationLevel,
    /// Label added to the verdict's red flags; the rule key when absent.
    #[serde(default)]
    pub red_flag: Option<String>,
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum Condition {
    /// Case-insensitive substring match over conversation turns. Unverified.
    Keyword {
        keywords: Vec<String>,
        /// Restrict to these speakers; empty means every turn.
        #[serde(default)]
        speakers: Vec<Speaker>,
    },
    /// Numeric comparison against a dotted path into structured intake. Verified.
    Threshold {
        path: String,
        op: Comparison,
        value: f64,
    },
    /// Exact value match against a dotted path into structured intake. Verified.
    Flag {
        path: String,
        equals: serde_json::Value,
    },
    All {
        conditions: Vec<Condition>,
    },
    Any {
        conditions: Vec<Condition>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
}

impl Comparison {
    pub fn holds(self, actual: f64, expected: f64) -> bool {
        match self {
            Self::Gt => actual > expected,
            Self::Gte => actual >= expected,
            Self::Lt => actual < expected,
            Self::Lte => actual <= expected,
            Self::Eq => (actual - expected).abs() < f64::EPSILON,
        }
    }
}

/// A safety rule's `defaults` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SafetyDefaults {
    /// Action recommended when this rule triggers.
    pub action_default: String,
}
