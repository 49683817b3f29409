use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::hash::ContentHash;

/// One diagnostic run request for a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiagnosisRun {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub inputs_hash: ContentHash,
    pub status: RunStatus,
    pub created_at: jiff::Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum RunStatus {
    Created,
    Running,
    Completed,
    Failed,
}
