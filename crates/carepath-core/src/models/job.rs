use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::artifact::ArtifactKind;

/// The orchestration record for one assessment run through the pipeline.
///
/// Created when an assessment finishes intake. Stage processors read and
/// update it; nothing deletes it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProcessingJob {
    pub id: Uuid,
    pub assessment_id: Uuid,
    pub correlation_id: Uuid,
    pub stage: Stage,
    pub status: JobStatus,
    pub attempt: u32,
    pub max_attempts: u32,
    pub created_at: jiff::Timestamp,
    pub updated_at: jiff::Timestamp,
    pub started_at: Option<jiff::Timestamp>,
    pub completed_at: Option<jiff::Timestamp>,
    #[serde(default)]
    pub delivered_at: Option<jiff::Timestamp>,
    #[serde(default)]
    pub errors: Vec<JobErrorRecord>,
}

impl ProcessingJob {
    pub fn new(assessment_id: Uuid, correlation_id: Uuid, max_attempts: u32) -> Self {
        let now = jiff::Timestamp::now();
        Self {
            id: Uuid::new_v4(),
            assessment_id,
            correlation_id,
            stage: Stage::Risk,
            status: JobStatus::Queued,
            attempt: 0,
            max_attempts: max_attempts.max(1),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            delivered_at: None,
            errors: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status == JobStatus::Completed
            || (self.status == JobStatus::Failed && self.attempt >= self.max_attempts)
    }
}

/// One failed attempt, kept in order on the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct JobErrorRecord {
    pub stage: Stage,
    pub attempt: u32,
    pub error_code: String,
    pub message: String,
    pub retryable: bool,
    pub occurred_at: jiff::Timestamp,
}

/// A partial update to a job. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub stage: Option<Stage>,
    pub status: Option<JobStatus>,
    pub attempt: Option<u32>,
    pub started_at: Option<jiff::Timestamp>,
    pub completed_at: Option<jiff::Timestamp>,
    pub delivered_at: Option<jiff::Timestamp>,
    pub push_error: Option<JobErrorRecord>,
}

impl JobPatch {
    pub fn apply(self, job: &mut ProcessingJob) {
        if let Some(stage) = self.stage {
            job.stage = stage;
        }
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(attempt) = self.attempt {
            job.attempt = attempt.min(job.max_attempts);
        }
        if let Some(ts) = self.started_at {
            job.started_at = Some(ts);
        }
        if let Some(ts) = self.completed_at {
            job.completed_at = Some(ts);
        }
        if let Some(ts) = self.delivered_at {
            job.delivered_at = Some(ts);
        }
        if let Some(err) = self.push_error {
            job.errors.push(err);
        }
        job.updated_at = jiff::Timestamp::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Stage {
    Risk,
    Ranking,
    Content,
    Safety,
    Validation,
    Delivery,
    Pdf,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Risk,
        Stage::Ranking,
        Stage::Content,
        Stage::Safety,
        Stage::Validation,
        Stage::Delivery,
        Stage::Pdf,
    ];

    pub fn ordinal(&self) -> usize {
        match self {
            Self::Risk => 0,
            Self::Ranking => 1,
            Self::Content => 2,
            Self::Safety => 3,
            Self::Validation => 4,
            Self::Delivery => 5,
            Self::Pdf => 6,
        }
    }

    /// The stage that follows this one, or `None` after the last.
    pub fn next(&self) -> Option<Stage> {
        Self::ALL.get(self.ordinal() + 1).copied()
    }

    /// The artifact this stage writes.
    pub fn artifact(&self) -> ArtifactKind {
        match self {
            Self::Risk => ArtifactKind::RiskBundle,
            Self::Ranking => ArtifactKind::Ranking,
            Self::Content => ArtifactKind::Sections,
            Self::Safety => ArtifactKind::SafetyCheck,
            Self::Validation => ArtifactKind::Validation,
            Self::Delivery => ArtifactKind::Delivery,
            Self::Pdf => ArtifactKind::Pdf,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Risk => "risk",
            Self::Ranking => "ranking",
            Self::Content => "content",
            Self::Safety => "safety",
            Self::Validation => "validation",
            Self::Delivery => "delivery",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| CoreError::UnknownStage(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}
