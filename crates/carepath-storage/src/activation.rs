//! One rule activation as a set of version rewrites plus their audit records.

use carepath_core::models::audit::AuditRecord;
use carepath_core::models::rule::{RuleStatus, RuleVersion};

use crate::error::StoreError;

/// A version as it was read and as it must be written.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub before: RuleVersion,
    pub after: RuleVersion,
}

impl StatusChange {
    /// Apply the lifecycle transition to a copy of `before`.
    pub fn to(
        before: &RuleVersion,
        status: RuleStatus,
        change_reason: Option<String>,
    ) -> Result<Self, StoreError> {
        let mut after = before.clone();
        after.transition(status).map_err(|e| {
            StoreError::InvalidTransition(format!("{} v{}: {e}", before.rule_key, before.version))
        })?;
        if change_reason.is_some() {
            after.change_reason = change_reason;
        }
        Ok(Self {
            before: before.clone(),
            after,
        })
    }
}

/// Everything one activation writes for a rule key.
///
/// Stores commit the changes and the audit records together, and only if
/// every version still has its `before` status and no other version of the
/// key is active.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationPlan {
    pub rule_key: String,
    /// Archives first, the activated version last.
    pub changes: Vec<StatusChange>,
    pub audit: Vec<AuditRecord>,
}

impl ActivationPlan {
    /// The version this plan activates.
    pub fn activated(&self) -> Option<&RuleVersion> {
        self.changes
            .iter()
            .map(|c| &c.after)
            .find(|v| v.status == RuleStatus::Active)
    }

    pub fn archived(&self) -> impl Iterator<Item = &RuleVersion> {
        self.changes
            .iter()
            .map(|c| &c.after)
            .filter(|v| v.status == RuleStatus::Archived)
    }

    /// Check the plan against the key's stored versions.
    pub fn verify(&self, current: &[RuleVersion]) -> Result<(), StoreError> {
        for change in &self.changes {
            change
                .before
                .status
                .transition(change.after.status)
                .map_err(|e| {
                    StoreError::InvalidTransition(format!(
                        "{} v{}: {e}",
                        change.before.rule_key, change.before.version
                    ))
                })?;
            let stored = current
                .iter()
                .find(|v| v.id == change.before.id)
                .ok_or_else(|| StoreError::NotFound {
                    key: format!("rule version {}", change.before.id),
                })?;
            if stored.status != change.before.status {
                return Err(StoreError::Conflict(format!(
                    "{} v{} is {}, expected {}",
                    stored.rule_key, stored.version, stored.status, change.before.status
                )));
            }
        }

        let untouched_active = current.iter().find(|v| {
            v.status == RuleStatus::Active && !self.changes.iter().any(|c| c.before.id == v.id)
        });
        if let Some(version) = untouched_active {
            return Err(StoreError::Conflict(format!(
                "{} v{} became active concurrently",
                version.rule_key, version.version
            )));
        }
        Ok(())
    }
}
