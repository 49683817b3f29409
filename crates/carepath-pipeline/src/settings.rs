use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Runtime knobs for the stage processors and dedup policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub dedup_enabled: bool,
    pub dedup_window_hours: u32,
    /// Attempts allowed per stage before a failed job stops accepting retries.
    pub max_attempts: u32,
    /// Bound on each notification, upload and delete call.
    pub io_timeout_secs: u64,
    pub signed_url_ttl_secs: u64,
    /// Used when a ranking request does not name `top_n`.
    pub default_top_n: u32,
    pub report_title: String,
    pub versions: VersionSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            dedup_enabled: true,
            dedup_window_hours: 24,
            max_attempts: 3,
            io_timeout_secs: 30,
            signed_url_ttl_secs: 900,
            default_top_n: 5,
            report_title: "Your health assessment".to_string(),
            versions: VersionSettings::default(),
        }
    }
}

impl PipelineSettings {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }

    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }

    pub fn dedup_window(&self) -> jiff::SignedDuration {
        jiff::SignedDuration::from_hours(i64::from(self.dedup_window_hours))
    }
}

/// Version labels stamped on artifacts. Changing one invalidates the
/// content hashes that include it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionSettings {
    pub risk_bundle: String,
    pub risk_algorithm: String,
    pub ranking: String,
    pub ranking_algorithm: String,
    pub sections: String,
    pub pdf_template: String,
    pub safety_inputs: String,
    pub diagnosis_inputs: String,
}

impl Default for VersionSettings {
    fn default() -> Self {
        Self {
            risk_bundle: "risk-bundle/v1".to_string(),
            risk_algorithm: "weighted-mean/v1".to_string(),
            ranking: "ranking/v1".to_string(),
            ranking_algorithm: "impact-feasibility/v1".to_string(),
            sections: "report-sections/v1".to_string(),
            pdf_template: "report-pdf/v1".to_string(),
            safety_inputs: "safety-inputs/v1".to_string(),
            diagnosis_inputs: "diagnosis-inputs/v1".to_string(),
        }
    }
}
