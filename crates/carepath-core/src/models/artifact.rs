use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// The artifact types a stage may persist, one per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ArtifactKind {
    RiskBundle,
    Ranking,
    Sections,
    SafetyCheck,
    Validation,
    Delivery,
    Pdf,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RiskBundle => "risk_bundle",
            Self::Ranking => "ranking",
            Self::Sections => "sections",
            Self::SafetyCheck => "safety_check",
            Self::Validation => "validation",
            Self::Delivery => "delivery",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
