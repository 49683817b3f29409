use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// One answered questionnaire item, as handed to the risk stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Answer {
    pub question_id: String,
    pub value: f64,
    /// Highest value the question allows. Used to normalize to 0–1.
    pub max_value: f64,
}

/// The risk stage's output. Immutable once written for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RiskBundle {
    pub id: Uuid,
    pub risk_bundle_version: String,
    pub algorithm_version: String,
    /// Version number of the scoring config used, `None` for the built-in default.
    pub scoring_config_version: Option<u32>,
    pub assessment_id: Uuid,
    pub job_id: Uuid,
    pub calculated_at: jiff::Timestamp,
    pub risk_score: RiskScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RiskScore {
    /// 0–100, higher is riskier.
    pub overall: f64,
    pub risk_level: RiskLevel,
    pub factors: Vec<RiskFactor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RiskFactor {
    pub factor_id: String,
    pub label: String,
    /// 0–100.
    pub score: f64,
    pub weight: f64,
    pub answered_questions: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}
