use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriorityRanking {
    pub id: Uuid,
    pub ranking_version: String,
    pub algorithm_version: String,
    pub risk_bundle_id: Uuid,
    pub job_id: Uuid,
    pub top_n: u32,
    pub top_interventions: Vec<RankedIntervention>,
    pub created_at: jiff::Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RankedIntervention {
    pub intervention_id: String,
    /// The risk factor this intervention addresses.
    pub topic: String,
    pub title: String,
    pub impact_score: f64,
    pub feasibility_score: f64,
    pub priority_score: f64,
    /// 1-based.
    pub rank: u32,
    pub tier_compatibility: Vec<Tier>,
}

/// Service tiers an intervention can be offered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Tier {
    Essential,
    Standard,
    Premium,
}
