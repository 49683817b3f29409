//! Safety rule engine.
//!
//! Evaluation is a pure function of the rule versions and the intake data:
//! no I/O, no clock, no randomness. The same rule snapshot and intake always
//! yield the same verdict.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use carepath_core::models::intake::IntakeData;
use carepath_core::models::rule::{RuleKind, RuleVersion};
use carepath_core::models::safety::{EscalationLevel, RuleVersionRef, TriggeredRule};
use carepath_storage::RuleStore;

use crate::error::{ConsistencyIssue, EngineError, RegistryError};
use crate::logic::{Condition, RuleLogic, SafetyDefaults};

/// Characters of context kept on each side of a keyword match.
const EXCERPT_CONTEXT: usize = 30;

pub const PROCEED_ACTION: &str = "proceed";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub escalation_level: EscalationLevel,
    pub red_flags: Vec<String>,
    /// Most severe first, then by rule key.
    pub triggered_rules: Vec<TriggeredRule>,
}

impl SafetyVerdict {
    /// 100 minus the weight of every triggered rule, floored at 0.
    pub fn safety_score(&self) -> f64 {
        let penalty: f64 = self
            .triggered_rules
            .iter()
            .map(|r| match r.level {
                EscalationLevel::Emergency => 60.0,
                EscalationLevel::Urgent => 30.0,
                EscalationLevel::Advisory => 10.0,
                EscalationLevel::None => 0.0,
            })
            .sum();
        (100.0 - penalty).max(0.0)
    }

    pub fn recommended_action(&self) -> String {
        self.triggered_rules
            .first()
            .map(|r| r.action.clone())
            .unwrap_or_else(|| PROCEED_ACTION.to_string())
    }

    /// Urgent or worse, or anything matched only on free text.
    pub fn requires_review(&self) -> bool {
        self.escalation_level >= EscalationLevel::Urgent
            || self.triggered_rules.iter().any(|r| !r.verified)
    }
}

/// The exact versions a verdict is computed against, in `(rule_key, version)` order.
pub fn snapshot(rules: &[RuleVersion]) -> Vec<RuleVersionRef> {
    let mut refs: Vec<_> = rules
        .iter()
        .map(|r| RuleVersionRef {
            rule_key: r.rule_key.clone(),
            kind: r.kind,
            version: r.version,
            id: r.id,
        })
        .collect();
    refs.sort();
    refs
}

struct Match {
    verified: bool,
    evidence: Vec<String>,
}

/// Evaluate safety `rules` against `intake`.
pub fn evaluate(rules: &[RuleVersion], intake: &IntakeData) -> Result<SafetyVerdict, EngineError> {
    let mut ordered: Vec<&RuleVersion> = rules.iter().collect();
    ordered.sort_by(|a, b| (&a.rule_key, a.version).cmp(&(&b.rule_key, b.version)));

    let mut hits: Vec<(TriggeredRule, String)> = Vec::new();
    for rule in ordered {
        if rule.kind != RuleKind::SafetyRule {
            return Err(EngineError::WrongKind {
                rule_key: rule.rule_key.clone(),
                version: rule.version,
            });
        }
        let invalid = |source| EngineError::InvalidLogic {
            rule_key: rule.rule_key.clone(),
            version: rule.version,
            source,
        };
        let logic: RuleLogic = serde_json::from_value(rule.logic.clone()).map_err(invalid)?;
        let defaults: SafetyDefaults =
            serde_json::from_value(rule.defaults.clone()).map_err(invalid)?;

        let Some(found) = matches(&logic.condition, intake) else {
            continue;
        };
        tracing::debug!(
            rule_key = %rule.rule_key,
            version = rule.version,
            level = logic.level.as_str(),
            "safety rule triggered"
        );

        let red_flag = logic.red_flag.unwrap_or_else(|| rule.rule_key.clone());
        hits.push((
            TriggeredRule {
                rule_id: rule.id,
                rule_key: rule.rule_key.clone(),
                version: rule.version,
                title: logic.title,
                level: logic.level,
                verified: found.verified,
                evidence: found.evidence,
                action: defaults.action_default,
            },
            red_flag,
        ));
    }

    hits.sort_by(|(a, _), (b, _)| {
        b.level
            .cmp(&a.level)
            .then_with(|| a.rule_key.cmp(&b.rule_key))
    });

    let mut red_flags: Vec<String> = Vec::new();
    for (_, flag) in &hits {
        if !red_flags.contains(flag) {
            red_flags.push(flag.clone());
        }
    }
    let triggered_rules: Vec<TriggeredRule> = hits.into_iter().map(|(rule, _)| rule).collect();
    let escalation_level = triggered_rules
        .iter()
        .map(|r| r.level)
        .max()
        .unwrap_or_default();

    Ok(SafetyVerdict {
        escalation_level,
        red_flags,
        triggered_rules,
    })
}

fn matches(condition: &Condition, intake: &IntakeData) -> Option<Match> {
    match condition {
        Condition::Keyword { keywords, speakers } => {
            let mut evidence = Vec::new();
            let turns = intake
                .turns
                .iter()
                .filter(|t| speakers.is_empty() || speakers.contains(&t.speaker));
            for turn in turns {
                for keyword in keywords {
                    let needle = keyword.trim().to_lowercase();
                    if needle.is_empty() {
                        continue;
                    }
                    if let Some(excerpt) = excerpt(&turn.text, &needle) {
                        evidence.push(excerpt);
                    }
                }
            }
            (!evidence.is_empty()).then_some(Match {
                verified: false,
                evidence,
            })
        }
        Condition::Threshold { path, op, value } => {
            let actual = lookup(&intake.structured, path)?.as_f64()?;
            op.holds(actual, *value).then(|| Match {
                verified: true,
                evidence: vec![format!("{path} = {actual}")],
            })
        }
        Condition::Flag { path, equals } => {
            let actual = lookup(&intake.structured, path)?;
            (actual == equals).then(|| Match {
                verified: true,
                evidence: vec![format!("{path} = {actual}")],
            })
        }
        Condition::All { conditions } => {
            if conditions.is_empty() {
                return None;
            }
            let mut combined = Match {
                verified: true,
                evidence: Vec::new(),
            };
            for child in conditions {
                let found = matches(child, intake)?;
                combined.verified &= found.verified;
                combined.evidence.extend(found.evidence);
            }
            Some(combined)
        }
        Condition::Any { conditions } => {
            let found: Vec<Match> = conditions.iter().filter_map(|c| matches(c, intake)).collect();
            if found.is_empty() {
                return None;
            }
            Some(Match {
                verified: found.iter().all(|m| m.verified),
                evidence: found.into_iter().flat_map(|m| m.evidence).collect(),
            })
        }
    }
}

/// Resolve a dotted path (`vitals.heart_rate`, `medications.0`) into `root`.
fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Lowercased window around the first match of `needle` in `text`.
fn excerpt(text: &str, needle: &str) -> Option<String> {
    let haystack: Vec<char> = text.to_lowercase().chars().collect();
    let needle: Vec<char> = needle.chars().collect();
    let start = haystack
        .windows(needle.len())
        .position(|window| window == needle.as_slice())?;
    let from = start.saturating_sub(EXCERPT_CONTEXT);
    let to = (start + needle.len() + EXCERPT_CONTEXT).min(haystack.len());
    Some(haystack[from..to].iter().collect::<String>().trim().to_string())
}

/// Which safety rule versions an evaluation runs against.
///
/// By default the active version of every safety rule key. A pin replaces
/// the active version of its key with the pinned version, whatever its
/// status, without touching the registry.
#[derive(Debug, Clone, Default)]
pub struct RuleSelection {
    pins: Vec<Uuid>,
}

impl RuleSelection {
    pub fn active() -> Self {
        Self::default()
    }

    pub fn pin(mut self, version_id: Uuid) -> Self {
        self.pins.push(version_id);
        self
    }

    pub fn pins(&self) -> &[Uuid] {
        &self.pins
    }

    /// The selected versions, ordered by `(rule_key, version)`.
    ///
    /// A key with more than one active version is reported as
    /// [`ConsistencyIssue::MultipleActive`] rather than resolved.
    pub async fn resolve(
        &self,
        store: &dyn RuleStore,
    ) -> Result<Vec<RuleVersion>, RegistryError> {
        let mut by_key: BTreeMap<String, RuleVersion> = BTreeMap::new();
        for version in store.list_active(RuleKind::SafetyRule).await? {
            if let Some(other) = by_key.get(&version.rule_key) {
                return Err(RegistryError::Inconsistent(ConsistencyIssue::MultipleActive {
                    rule_key: version.rule_key.clone(),
                    versions: vec![other.version, version.version],
                }));
            }
            by_key.insert(version.rule_key.clone(), version);
        }
        for id in &self.pins {
            let pinned = store
                .get_version(*id)
                .await?
                .ok_or(RegistryError::NotFound(*id))?;
            by_key.insert(pinned.rule_key.clone(), pinned);
        }
        Ok(by_key.into_values().collect())
    }
}
