use thiserror::Error;

use crate::models::rule::RuleStatus;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid rule status transition: {from} -> {to}")]
    InvalidTransition { from: RuleStatus, to: RuleStatus },

    #[error("unknown stage: {0}")]
    UnknownStage(String),

    #[error("invalid uuid: {0}")]
    InvalidUuid(#[from] uuid::Error),
}
