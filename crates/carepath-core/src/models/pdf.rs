use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::hash::ContentHash;

/// The job's pointer to its current rendered report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PdfRecord {
    pub job_id: Uuid,
    pub pdf_path: String,
    pub content_hash: ContentHash,
    pub template_version: String,
    pub sections_version: String,
    pub generated_at: jiff::Timestamp,
}
