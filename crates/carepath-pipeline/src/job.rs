//! Job gating and stage transitions.
//!
//! A stage may run against a job when it is the job's current stage. Earlier
//! stages (and any stage of a completed job) run as re-fetches: the processor
//! still executes, normally hitting its idempotency check, but the job record
//! is left alone. Later stages are refused.

use std::future::Future;
use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use carepath_core::models::job::{JobErrorRecord, JobPatch, JobStatus, ProcessingJob, Stage};
use carepath_storage::JobStore;

use crate::error::{StageFailure, StageResult};

/// How a stage invocation relates to the job's progress.
#[derive(Debug, Clone)]
pub enum Gate {
    /// The job's current stage; the attempt has been counted.
    Run(ProcessingJob),
    /// A stage the job has already passed. No transitions are recorded.
    Refetch(ProcessingJob),
}

impl Gate {
    pub fn job(&self) -> &ProcessingJob {
        match self {
            Gate::Run(job) | Gate::Refetch(job) => job,
        }
    }
}

#[derive(Clone)]
pub struct JobTracker {
    jobs: Arc<dyn JobStore>,
}

impl JobTracker {
    pub fn new(jobs: Arc<dyn JobStore>) -> Self {
        Self { jobs }
    }

    pub async fn load(&self, job_id: Uuid) -> StageResult<ProcessingJob> {
        self.jobs
            .get_job(job_id)
            .await
            .map_err(|e| StageFailure::internal("load job", e))?
            .ok_or_else(|| StageFailure::not_found(format!("job not found: {job_id}")))
    }

    /// Decide whether `stage` may run for `job_id`, counting the attempt if so.
    pub async fn begin(&self, stage: Stage, job_id: Uuid) -> StageResult<Gate> {
        let job = self.load(job_id).await?;

        if job.status == JobStatus::Completed || stage.ordinal() < job.stage.ordinal() {
            return Ok(Gate::Refetch(job));
        }
        if stage.ordinal() > job.stage.ordinal() {
            return Err(StageFailure::invalid_state(format!(
                "job is at stage {}, cannot run {stage}",
                job.stage
            )));
        }
        if job.is_terminal() {
            return Err(StageFailure::invalid_state(format!(
                "stage {stage} exhausted {} attempts",
                job.max_attempts
            ))
            .with_details(serde_json::json!({ "errors": job.errors })));
        }

        let patch = JobPatch {
            status: Some(JobStatus::Running),
            attempt: Some(job.attempt + 1),
            started_at: job.started_at.is_none().then(jiff::Timestamp::now),
            ..JobPatch::default()
        };
        let job = self
            .jobs
            .update_job(job_id, patch)
            .await
            .map_err(|e| StageFailure::internal("start stage", e))?;
        info!(
            job_id = %job.id,
            correlation_id = %job.correlation_id,
            stage = stage.as_str(),
            attempt = job.attempt,
            "stage started"
        );
        Ok(Gate::Run(job))
    }

    /// Advance past `stage`: queue the next stage, or complete the job after the last.
    pub async fn complete(&self, job: &ProcessingJob, stage: Stage) -> StageResult<ProcessingJob> {
        let patch = match stage.next() {
            Some(next) => JobPatch {
                stage: Some(next),
                status: Some(JobStatus::Queued),
                attempt: Some(0),
                ..JobPatch::default()
            },
            None => JobPatch {
                status: Some(JobStatus::Completed),
                completed_at: Some(jiff::Timestamp::now()),
                ..JobPatch::default()
            },
        };
        let updated = self
            .jobs
            .update_job(job.id, patch)
            .await
            .map_err(|e| StageFailure::internal("advance job", e))?;
        info!(
            job_id = %job.id,
            correlation_id = %job.correlation_id,
            stage = stage.as_str(),
            next = updated.stage.as_str(),
            "stage completed"
        );
        Ok(updated)
    }

    /// Append the failure to the job's error history and mark it failed.
    ///
    /// A failure to record is logged, not returned; the caller reports the
    /// original failure.
    pub async fn fail(&self, job: &ProcessingJob, stage: Stage, failure: &StageFailure) {
        warn!(
            job_id = %job.id,
            correlation_id = %job.correlation_id,
            stage = stage.as_str(),
            attempt = job.attempt,
            error_code = failure.code.as_str(),
            "stage failed"
        );
        let patch = JobPatch {
            status: Some(JobStatus::Failed),
            push_error: Some(JobErrorRecord {
                stage,
                attempt: job.attempt,
                error_code: failure.code.as_str().to_string(),
                message: failure.message.clone(),
                retryable: failure.is_retryable(),
                occurred_at: jiff::Timestamp::now(),
            }),
            ..JobPatch::default()
        };
        if let Err(e) = self.jobs.update_job(job.id, patch).await {
            error!(
                job_id = %job.id,
                correlation_id = %job.correlation_id,
                error = %e,
                "could not record stage failure on job"
            );
        }
    }

    pub async fn mark_delivered(&self, job_id: Uuid) -> StageResult<ProcessingJob> {
        let patch = JobPatch {
            delivered_at: Some(jiff::Timestamp::now()),
            ..JobPatch::default()
        };
        self.jobs
            .update_job(job_id, patch)
            .await
            .map_err(|e| StageFailure::internal("mark delivered", e))
    }

    /// Gate `stage`, run `work` against the job, and record the outcome.
    pub async fn run<T, F, Fut>(&self, stage: Stage, job_id: Uuid, work: F) -> StageResult<T>
    where
        F: FnOnce(ProcessingJob) -> Fut,
        Fut: Future<Output = StageResult<T>>,
    {
        match self.begin(stage, job_id).await? {
            Gate::Refetch(job) => work(job).await,
            Gate::Run(job) => match work(job.clone()).await {
                Ok(output) => {
                    self.complete(&job, stage).await?;
                    Ok(output)
                }
                Err(failure) => {
                    self.fail(&job, stage, &failure).await;
                    Err(failure)
                }
            },
        }
    }
}
