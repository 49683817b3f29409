use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Everything the safety engine looks at for one assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct IntakeData {
    /// Structured intake answers, addressed by dotted path (e.g. `vitals.heart_rate`).
    pub structured: serde_json::Value,
    #[serde(default)]
    pub turns: Vec<ConversationTurn>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Speaker {
    Patient,
    Clinician,
    Assistant,
}
