use thiserror::Error;
use uuid::Uuid;

use carepath_audit::AuditError;
use carepath_core::error::CoreError;
use carepath_core::models::rule::RuleStatus;
use carepath_storage::StoreError;

use crate::guard::GuardIssue;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("rule version not found: {0}")]
    NotFound(Uuid),

    #[error("only draft versions can be activated (version {id} is {status})")]
    NotDraft { id: Uuid, status: RuleStatus },

    #[error("invalid rule key '{0}': use lowercase letters, digits, '_' or '-'")]
    InvalidKey(String),

    #[error("activation guard rejected the version: {}", summarize(.0))]
    Guard(Vec<GuardIssue>),

    #[error("rule key is inconsistent: {0}")]
    Inconsistent(ConsistencyIssue),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

fn summarize(issues: &[GuardIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("{}: {}", i.path, i.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A violation of the one-active-version-per-key invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyIssue {
    #[error("'{rule_key}' has {} active versions ({versions:?})", .versions.len())]
    MultipleActive { rule_key: String, versions: Vec<u32> },

    #[error("'{rule_key}' has archived versions but none active")]
    NoActive { rule_key: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("rule {rule_key} v{version} has unreadable logic: {source}")]
    InvalidLogic {
        rule_key: String,
        version: u32,
        source: serde_json::Error,
    },

    #[error("rule {rule_key} v{version} is not a safety rule")]
    WrongKind { rule_key: String, version: u32 },
}
