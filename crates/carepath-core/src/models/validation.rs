use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ValidationResult {
    pub id: Uuid,
    pub job_id: Uuid,
    pub overall_passed: bool,
    pub overall_status: ValidationStatus,
    pub critical_flags_count: u32,
    pub checks: Vec<ValidationCheck>,
    pub validated_at: jiff::Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ValidationStatus {
    Passed,
    NeedsReview,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
    pub critical: bool,
    pub message: String,
}
