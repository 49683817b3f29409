use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::CoreError;

/// A versioned, lifecycle-managed rule or configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RuleVersion {
    pub id: Uuid,
    pub kind: RuleKind,
    pub rule_key: String,
    /// Monotonic per `rule_key`, starting at 1.
    pub version: u32,
    pub status: RuleStatus,
    pub logic: serde_json::Value,
    pub defaults: serde_json::Value,
    pub change_reason: Option<String>,
    pub created_by: String,
    pub created_at: jiff::Timestamp,
    #[serde(default)]
    pub activated_at: Option<jiff::Timestamp>,
    #[serde(default)]
    pub archived_at: Option<jiff::Timestamp>,
}

impl RuleVersion {
    /// Move to `target`, stamping the matching timestamp.
    pub fn transition(&mut self, target: RuleStatus) -> Result<(), CoreError> {
        self.status = self.status.transition(target)?;
        let now = jiff::Timestamp::now();
        match target {
            RuleStatus::Active => self.activated_at = Some(now),
            RuleStatus::Archived => self.archived_at = Some(now),
            RuleStatus::Draft => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum RuleKind {
    /// Red-flag rule consumed by the safety engine.
    SafetyRule,
    /// Scoring/reasoning configuration consumed by the risk and ranking stages.
    ScoringConfig,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SafetyRule => "safety_rule",
            Self::ScoringConfig => "scoring_config",
        }
    }
}

/// Lifecycle status. `Archived` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum RuleStatus {
    Draft,
    Active,
    Archived,
}

impl RuleStatus {
    /// The only legal moves are draft → active and active → archived.
    pub fn transition(self, target: RuleStatus) -> Result<RuleStatus, CoreError> {
        match (self, target) {
            (RuleStatus::Draft, RuleStatus::Active)
            | (RuleStatus::Active, RuleStatus::Archived) => Ok(target),
            (from, to) => Err(CoreError::InvalidTransition { from, to }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
