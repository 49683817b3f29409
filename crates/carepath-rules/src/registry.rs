//! Rule Version Registry.
//!
//! Owns the draft → active → archived lifecycle. At most one version per
//! rule key is active. An activation is planned here, with every status
//! change and its audit record, and committed by
//! [`RuleStore::commit_activation`] as one unit.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use carepath_audit::trail;
use carepath_core::models::rule::{RuleKind, RuleStatus, RuleVersion};
use carepath_storage::{ActivationPlan, RuleStore, StatusChange};

use crate::error::{ConsistencyIssue, RegistryError};
use crate::guard;

/// Result of a successful activation.
#[derive(Debug, Clone)]
pub struct Activation {
    pub activated: RuleVersion,
    pub archived: Vec<RuleVersion>,
}

#[derive(Clone)]
pub struct RuleRegistry {
    store: Arc<dyn RuleStore>,
}

fn valid_key(rule_key: &str) -> bool {
    !rule_key.is_empty()
        && rule_key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

impl RuleRegistry {
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn RuleStore {
        self.store.as_ref()
    }

    /// Create the next draft version of `rule_key`.
    pub async fn create_draft(
        &self,
        kind: RuleKind,
        rule_key: &str,
        logic: serde_json::Value,
        defaults: serde_json::Value,
        created_by: &str,
        change_reason: Option<String>,
    ) -> Result<RuleVersion, RegistryError> {
        if !valid_key(rule_key) {
            return Err(RegistryError::InvalidKey(rule_key.to_string()));
        }
        let existing = self.store.list_versions(rule_key).await?;
        let version = existing.iter().map(|v| v.version).max().unwrap_or(0) + 1;

        let draft = RuleVersion {
            id: Uuid::new_v4(),
            kind,
            rule_key: rule_key.to_string(),
            version,
            status: RuleStatus::Draft,
            logic,
            defaults,
            change_reason,
            created_by: created_by.to_string(),
            created_at: jiff::Timestamp::now(),
            activated_at: None,
            archived_at: None,
        };
        self.store.insert_version(draft.clone()).await?;
        trail::append(self.store.as_ref(), trail::creation(&draft, created_by)?).await?;

        info!(rule_key, version, kind = kind.as_str(), "rule draft created");
        Ok(draft)
    }

    pub async fn get(&self, id: Uuid) -> Result<RuleVersion, RegistryError> {
        self.store
            .get_version(id)
            .await?
            .ok_or(RegistryError::NotFound(id))
    }

    /// All versions of `rule_key`, oldest first.
    pub async fn list_versions(&self, rule_key: &str) -> Result<Vec<RuleVersion>, RegistryError> {
        Ok(self.store.list_versions(rule_key).await?)
    }

    /// The active version of `rule_key`, if any.
    ///
    /// More than one active version is reported as
    /// [`RegistryError::Inconsistent`] rather than picking one.
    pub async fn active_version(
        &self,
        rule_key: &str,
    ) -> Result<Option<RuleVersion>, RegistryError> {
        let mut active = self.store.list_active_by_key(rule_key).await?;
        if active.len() > 1 {
            return Err(RegistryError::Inconsistent(ConsistencyIssue::MultipleActive {
                rule_key: rule_key.to_string(),
                versions: active.iter().map(|v| v.version).collect(),
            }));
        }
        Ok(active.pop())
    }

    /// Promote a draft to active, archiving whatever was active for its key.
    pub async fn activate(
        &self,
        version_id: Uuid,
        change_reason: Option<String>,
        changed_by: &str,
    ) -> Result<Activation, RegistryError> {
        let target = self.get(version_id).await?;
        if target.status != RuleStatus::Draft {
            return Err(RegistryError::NotDraft {
                id: target.id,
                status: target.status,
            });
        }

        let issues = guard::check(&target);
        if !issues.is_empty() {
            warn!(
                rule_key = %target.rule_key,
                version = target.version,
                issues = issues.len(),
                "activation guard rejected rule version"
            );
            return Err(RegistryError::Guard(issues));
        }

        let plan = self.plan_activation(&target, change_reason, changed_by).await?;
        self.store.commit_activation(&plan).await?;
        for record in &plan.audit {
            trail::emit(record);
        }

        let activated = plan
            .activated()
            .cloned()
            .ok_or(RegistryError::NotFound(version_id))?;
        let archived: Vec<RuleVersion> = plan.archived().cloned().collect();
        info!(
            rule_key = %target.rule_key,
            version = target.version,
            archived = archived.len(),
            "rule version activated"
        );
        Ok(Activation {
            activated,
            archived,
        })
    }

    /// Archive every active version of the key, activate `target`, and audit
    /// each change. The activation's record comes first.
    async fn plan_activation(
        &self,
        target: &RuleVersion,
        change_reason: Option<String>,
        changed_by: &str,
    ) -> Result<ActivationPlan, RegistryError> {
        let previous = self.store.list_active_by_key(&target.rule_key).await?;
        let superseded = format!("superseded by v{}", target.version);

        let activation = StatusChange::to(target, RuleStatus::Active, change_reason.clone())?;
        let mut audit = vec![trail::status_change(
            &activation.before,
            &activation.after,
            changed_by,
            change_reason,
        )];
        let mut changes = Vec::with_capacity(previous.len() + 1);
        for before in previous.iter().filter(|v| v.id != target.id) {
            let change = StatusChange::to(before, RuleStatus::Archived, None)?;
            audit.push(trail::status_change(
                &change.before,
                &change.after,
                changed_by,
                Some(superseded.clone()),
            ));
            changes.push(change);
        }
        changes.push(activation);

        Ok(ActivationPlan {
            rule_key: target.rule_key.clone(),
            changes,
            audit,
        })
    }

    /// Verify the one-active-version invariant for `rule_key`.
    ///
    /// A key with only drafts is consistent; a key whose versions are all
    /// archived is not.
    pub async fn check_consistency(&self, rule_key: &str) -> Result<(), RegistryError> {
        let versions = self.store.list_versions(rule_key).await?;
        let active: Vec<u32> = versions
            .iter()
            .filter(|v| v.status == RuleStatus::Active)
            .map(|v| v.version)
            .collect();

        let issue = match active.len() {
            0 if versions.iter().any(|v| v.status == RuleStatus::Archived) => {
                Some(ConsistencyIssue::NoActive {
                    rule_key: rule_key.to_string(),
                })
            }
            0 | 1 => None,
            _ => Some(ConsistencyIssue::MultipleActive {
                rule_key: rule_key.to_string(),
                versions: active,
            }),
        };

        match issue {
            Some(issue) => {
                warn!(rule_key, %issue, "rule key inconsistent");
                Err(RegistryError::Inconsistent(issue))
            }
            None => Ok(()),
        }
    }
}
