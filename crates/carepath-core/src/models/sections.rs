use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::hash::ContentHash;
use crate::models::risk::RiskLevel;

/// Generated narrative sections for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportSections {
    pub id: Uuid,
    pub sections_version: String,
    pub job_id: Uuid,
    /// Hash of the template version and upstream artifacts the sections were built from.
    pub content_hash: ContentHash,
    pub template_version: String,
    pub sections: Vec<ReportSection>,
    pub created_at: jiff::Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportSection {
    pub key: String,
    pub title: String,
    pub body: String,
    pub prompt_version: String,
    pub inputs: SectionInputs,
}

/// What a section was generated from.
///
/// Scores and signal references only. Never names, contact details,
/// free-text answers or any other raw identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SectionInputs {
    pub risk_bundle_id: Uuid,
    pub ranking_id: Option<Uuid>,
    pub overall_score: f64,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub factor_ids: Vec<String>,
    #[serde(default)]
    pub intervention_ids: Vec<String>,
}
