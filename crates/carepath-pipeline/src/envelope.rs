//! The wire shape of a stage result.
//!
//! ```json
//! { "success": true, "data": { ... } }
//! { "success": false, "error_code": "SAVE_FAILED", "error": "...", "details": { ... }, "retryable": true }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorCode, StageFailure, StageResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub retryable: Option<bool>,
}

impl StageEnvelope {
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error_code: None,
            error: None,
            details: None,
            retryable: None,
        }
    }

    pub fn failure(failure: StageFailure) -> Self {
        Self {
            success: false,
            data: None,
            error_code: Some(failure.code),
            error: Some(failure.message),
            details: failure.details,
            retryable: Some(failure.code.is_retryable()),
        }
    }

    /// Wrap any stage result. A payload that fails to serialize becomes `INTERNAL_ERROR`.
    pub fn from_result<T: Serialize>(result: StageResult<T>) -> Self {
        match result.and_then(|data| {
            serde_json::to_value(data).map_err(|e| StageFailure::internal("serialize result", e))
        }) {
            Ok(data) => Self::success(data),
            Err(failure) => Self::failure(failure),
        }
    }
}
