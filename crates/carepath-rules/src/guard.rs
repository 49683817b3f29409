//! Activation guard: structural validation of a version's `logic` and
//! `defaults` before it may become active.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use carepath_core::models::rule::{RuleKind, RuleVersion};

use crate::logic::{Condition, RuleLogic};
use crate::scoring::{ScoringConfig, ScoringDefaults};

/// One reason a version was rejected, addressed by JSON path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GuardIssue {
    pub path: String,
    pub message: String,
}

impl GuardIssue {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Check `version` against the rules for its kind. Empty means it may be activated.
pub fn check(version: &RuleVersion) -> Vec<GuardIssue> {
    match version.kind {
        RuleKind::SafetyRule => check_safety_rule(&version.logic, &version.defaults),
        RuleKind::ScoringConfig => check_scoring_config(&version.logic, &version.defaults),
    }
}

fn check_safety_rule(logic: &serde_json::Value, defaults: &serde_json::Value) -> Vec<GuardIssue> {
    let mut issues = Vec::new();

    match serde_json::from_value::<RuleLogic>(logic.clone()) {
        Ok(parsed) => {
            if parsed.title.trim().is_empty() {
                issues.push(GuardIssue::new("logic.title", "title must not be empty"));
            }
            check_condition(&parsed.condition, "logic.condition", &mut issues);
        }
        Err(e) => issues.push(GuardIssue::new("logic", format!("not a valid rule: {e}"))),
    }

    match defaults.get("action_default") {
        Some(serde_json::Value::String(action)) if !action.trim().is_empty() => {}
        Some(_) => issues.push(GuardIssue::new(
            "defaults.action_default",
            "must be a non-empty string",
        )),
        None => issues.push(GuardIssue::new("defaults.action_default", "is required")),
    }

    issues
}

fn check_condition(condition: &Condition, path: &str, issues: &mut Vec<GuardIssue>) {
    match condition {
        Condition::Keyword { keywords, .. } => {
            if keywords.is_empty() {
                issues.push(GuardIssue::new(
                    format!("{path}.keywords"),
                    "at least one keyword is required",
                ));
            }
            for (i, keyword) in keywords.iter().enumerate() {
                if keyword.trim().is_empty() {
                    issues.push(GuardIssue::new(
                        format!("{path}.keywords[{i}]"),
                        "keyword must not be blank",
                    ));
                }
            }
        }
        Condition::Threshold { path: field, value, .. } => {
            if field.trim().is_empty() {
                issues.push(GuardIssue::new(format!("{path}.path"), "path must not be empty"));
            }
            if !value.is_finite() {
                issues.push(GuardIssue::new(format!("{path}.value"), "must be a finite number"));
            }
        }
        Condition::Flag { path: field, .. } => {
            if field.trim().is_empty() {
                issues.push(GuardIssue::new(format!("{path}.path"), "path must not be empty"));
            }
        }
        Condition::All { conditions } | Condition::Any { conditions } => {
            if conditions.is_empty() {
                issues.push(GuardIssue::new(
                    format!("{path}.conditions"),
                    "composite needs at least one condition",
                ));
            }
            for (i, child) in conditions.iter().enumerate() {
                check_condition(child, &format!("{path}.conditions[{i}]"), issues);
            }
        }
    }
}

fn check_scoring_config(
    logic: &serde_json::Value,
    defaults: &serde_json::Value,
) -> Vec<GuardIssue> {
    let mut issues = Vec::new();

    match serde_json::from_value::<ScoringConfig>(logic.clone()) {
        Ok(config) => {
            if config.factors.is_empty() {
                issues.push(GuardIssue::new("logic.factors", "at least one factor is required"));
            }
            let mut seen = HashSet::new();
            for (i, factor) in config.factors.iter().enumerate() {
                let path = format!("logic.factors[{i}]");
                if !seen.insert(factor.id.as_str()) {
                    issues.push(GuardIssue::new(
                        format!("{path}.id"),
                        format!("duplicate factor id '{}'", factor.id),
                    ));
                }
                if factor.question_ids.is_empty() {
                    issues.push(GuardIssue::new(
                        format!("{path}.question_ids"),
                        "at least one question is required",
                    ));
                }
                if !(factor.weight.is_finite() && factor.weight > 0.0) {
                    issues.push(GuardIssue::new(
                        format!("{path}.weight"),
                        "weight must be a positive number",
                    ));
                }
            }

            let t = config.thresholds;
            let in_range = [t.moderate, t.high, t.critical]
                .iter()
                .all(|v| v.is_finite() && (0.0..=100.0).contains(v));
            if !in_range {
                issues.push(GuardIssue::new(
                    "logic.thresholds",
                    "thresholds must lie within [0, 100]",
                ));
            } else if !(t.moderate < t.high && t.high < t.critical) {
                issues.push(GuardIssue::new(
                    "logic.thresholds",
                    "thresholds must be strictly ascending (moderate < high < critical)",
                ));
            }
        }
        Err(e) => issues.push(GuardIssue::new(
            "logic",
            format!("not a valid scoring config: {e}"),
        )),
    }

    if !defaults.is_null() {
        match serde_json::from_value::<ScoringDefaults>(defaults.clone()) {
            Ok(parsed) => {
                for (i, entry) in parsed.interventions.iter().flatten().enumerate() {
                    let path = format!("defaults.interventions[{i}]");
                    if !(0.0..=1.0).contains(&entry.impact) {
                        issues.push(GuardIssue::new(
                            format!("{path}.impact"),
                            "must be within [0, 1]",
                        ));
                    }
                    if !(0.0..=1.0).contains(&entry.feasibility) {
                        issues.push(GuardIssue::new(
                            format!("{path}.feasibility"),
                            "must be within [0, 1]",
                        ));
                    }
                }
            }
            Err(e) => issues.push(GuardIssue::new(
                "defaults",
                format!("not valid scoring defaults: {e}"),
            )),
        }
    }

    issues
}
