use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use carepath_core::error::CoreError;
use carepath_rules::RegistryError;
use carepath_storage::StoreError;

/// Machine-readable failure codes returned by stage operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    InvalidState,
    NoAnswers,
    LoadRiskBundleFailed,
    LoadRankingFailed,
    LoadSectionsFailed,
    LoadSafetyCheckFailed,
    LoadValidationFailed,
    EvaluationFailed,
    GenerationFailed,
    UploadFailed,
    SaveFailed,
    DeliveryError,
    DeliveryIneligible,
    /// A rule version failed the activation guard. Kept apart from
    /// `VALIDATION_ERROR` so callers can tell a bad request from a rule the
    /// guard refused; details carry the itemized `issues`.
    ActivationGuardFailed,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidState => "INVALID_STATE",
            Self::NoAnswers => "NO_ANSWERS",
            Self::LoadRiskBundleFailed => "LOAD_RISK_BUNDLE_FAILED",
            Self::LoadRankingFailed => "LOAD_RANKING_FAILED",
            Self::LoadSectionsFailed => "LOAD_SECTIONS_FAILED",
            Self::LoadSafetyCheckFailed => "LOAD_SAFETY_CHECK_FAILED",
            Self::LoadValidationFailed => "LOAD_VALIDATION_FAILED",
            Self::EvaluationFailed => "EVALUATION_FAILED",
            Self::GenerationFailed => "GENERATION_FAILED",
            Self::UploadFailed => "UPLOAD_FAILED",
            Self::SaveFailed => "SAVE_FAILED",
            Self::DeliveryError => "DELIVERY_ERROR",
            Self::DeliveryIneligible => "DELIVERY_INELIGIBLE",
            Self::ActivationGuardFailed => "ACTIVATION_GUARD_FAILED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether the same call may succeed later without the caller changing anything.
    ///
    /// `LOAD_*_FAILED` counts as retryable: the upstream stage may not have run yet.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::LoadRiskBundleFailed
            | Self::LoadRankingFailed
            | Self::LoadSectionsFailed
            | Self::LoadSafetyCheckFailed
            | Self::LoadValidationFailed
            | Self::EvaluationFailed
            | Self::GenerationFailed
            | Self::UploadFailed
            | Self::SaveFailed
            | Self::DeliveryError
            | Self::InternalError => true,
            Self::ValidationError
            | Self::NotFound
            | Self::InvalidState
            | Self::NoAnswers
            | Self::DeliveryIneligible
            | Self::ActivationGuardFailed => false,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An expected failure of a stage or registry operation.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct StageFailure {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<Value>,
}

impl StageFailure {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// An unexpected backend error. `context` says what was being done.
    pub fn internal(context: &str, err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, format!("{context}: {err}"))
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

pub type StageResult<T> = Result<T, StageFailure>;

/// Errors from operations outside the stage envelope (job creation, run submission).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl From<PipelineError> for StageFailure {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Registry(e) => e.into(),
            PipelineError::Core(e) => StageFailure::validation(e.to_string()),
            PipelineError::Store(e) => StageFailure::internal("store", e),
        }
    }
}

impl From<RegistryError> for StageFailure {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => {
                StageFailure::not_found(format!("rule version not found: {id}"))
            }
            RegistryError::NotDraft { .. } | RegistryError::InvalidKey(_) => {
                StageFailure::validation(err.to_string())
            }
            RegistryError::Guard(ref issues) => {
                let details = serde_json::json!({ "issues": issues });
                StageFailure::new(ErrorCode::ActivationGuardFailed, err.to_string())
                    .with_details(details)
            }
            RegistryError::Inconsistent(_) => StageFailure::invalid_state(err.to_string()),
            RegistryError::Core(e) => StageFailure::invalid_state(e.to_string()),
            RegistryError::Store(
                e @ (StoreError::Conflict(_) | StoreError::InvalidTransition(_)),
            ) => StageFailure::invalid_state(e.to_string()),
            RegistryError::Store(e) => StageFailure::internal("rule store", e),
            RegistryError::Audit(e) => StageFailure::internal("audit trail", e),
        }
    }
}
