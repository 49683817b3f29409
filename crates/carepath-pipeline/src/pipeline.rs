use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use carepath_core::models::intake::IntakeData;
use carepath_core::models::job::{ProcessingJob, Stage};
use carepath_core::models::rule::RuleVersion;
use carepath_core::models::safety::{RuleVersionRef, SafetyCheck};
use carepath_rules::RuleRegistry;
use carepath_rules::engine::{self, RuleSelection, SafetyVerdict};

use crate::dedup::{DedupOutcome, DedupPolicy, RunSubmission};
use crate::error::{ErrorCode, PipelineError, StageFailure, StageResult};
use crate::settings::PipelineSettings;
use crate::stages::content::{ContentOutput, ContentProcessor};
use crate::stages::delivery::{DeliveryOutput, DeliveryProcessor};
use crate::stages::pdf::{PdfOutput, PdfProcessor};
use crate::stages::ranking::{RankingOutput, RankingProcessor};
use crate::stages::risk::{RiskOutput, RiskProcessor};
use crate::stages::safety::{SafetyOutput, SafetyProcessor};
use crate::stages::StageContext;
use crate::stages::validation::{ValidationOutput, ValidationProcessor};
use crate::stores::Stores;

/// Stage-specific arguments for [`Pipeline::process`]. Fields a stage does
/// not use are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StageArgs {
    /// Ranking: the bundle to rank; the job's bundle when absent.
    pub risk_bundle_id: Option<Uuid>,
    /// Ranking: how many interventions to keep.
    pub top_n: Option<u32>,
    /// Safety: rule versions to evaluate in place of the active ones.
    pub pinned_rules: Vec<Uuid>,
    /// Delivery: users to notify.
    pub recipients: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivationOutput {
    pub activated: RuleVersion,
    pub archived: Vec<RuleVersion>,
}

/// A what-if safety evaluation. Nothing is persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SandboxOutput {
    pub rule_snapshot: Vec<RuleVersionRef>,
    pub safety_score: f64,
    pub recommended_action: String,
    pub requires_review: bool,
    #[serde(flatten)]
    pub verdict: SafetyVerdict,
}

/// Entry point for every pipeline operation.
#[derive(Clone)]
pub struct Pipeline {
    ctx: StageContext,
    dedup: DedupPolicy,
    risk: RiskProcessor,
    ranking: RankingProcessor,
    content: ContentProcessor,
    safety: SafetyProcessor,
    validation: ValidationProcessor,
    delivery: DeliveryProcessor,
    pdf: PdfProcessor,
}

impl Pipeline {
    pub fn new(stores: Stores, settings: PipelineSettings) -> Self {
        let dedup = DedupPolicy::new(
            stores.runs.clone(),
            settings.dedup_enabled,
            settings.dedup_window(),
            settings.versions.diagnosis_inputs.clone(),
        );
        let ctx = StageContext::new(stores, settings);
        Self {
            dedup,
            risk: RiskProcessor::new(ctx.clone()),
            ranking: RankingProcessor::new(ctx.clone()),
            content: ContentProcessor::new(ctx.clone()),
            safety: SafetyProcessor::new(ctx.clone()),
            validation: ValidationProcessor::new(ctx.clone()),
            delivery: DeliveryProcessor::new(ctx.clone()),
            pdf: PdfProcessor::new(ctx.clone()),
            ctx,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.ctx.settings
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.ctx.registry
    }

    pub fn stores(&self) -> &Stores {
        &self.ctx.stores
    }

    /// Start a job for an assessment whose intake is complete.
    pub async fn create_job(
        &self,
        assessment_id: Uuid,
        correlation_id: Uuid,
    ) -> Result<ProcessingJob, PipelineError> {
        let job = ProcessingJob::new(assessment_id, correlation_id, self.ctx.settings.max_attempts);
        self.ctx.stores.jobs.insert_job(job.clone()).await?;
        info!(job_id = %job.id, correlation_id = %correlation_id, "job created");
        Ok(job)
    }

    pub async fn job(&self, job_id: Uuid) -> StageResult<ProcessingJob> {
        self.ctx.tracker.load(job_id).await
    }

    /// Run `stage` for `job_id` and return its output as JSON.
    pub async fn process(&self, stage: Stage, job_id: Uuid, args: StageArgs) -> StageResult<Value> {
        match stage {
            Stage::Risk => to_value(self.risk(job_id).await),
            Stage::Ranking => to_value(self.ranking(job_id, args.risk_bundle_id, args.top_n).await),
            Stage::Content => to_value(self.content(job_id).await),
            Stage::Safety => {
                let selection = args
                    .pinned_rules
                    .into_iter()
                    .fold(RuleSelection::active(), RuleSelection::pin);
                to_value(self.safety(job_id, &selection).await)
            }
            Stage::Validation => to_value(self.validation(job_id).await),
            Stage::Delivery => to_value(self.delivery(job_id, &args.recipients).await),
            Stage::Pdf => to_value(self.pdf(job_id).await),
        }
    }

    pub async fn risk(&self, job_id: Uuid) -> StageResult<RiskOutput> {
        self.risk.process(job_id).await
    }

    pub async fn ranking(
        &self,
        job_id: Uuid,
        risk_bundle_id: Option<Uuid>,
        top_n: Option<u32>,
    ) -> StageResult<RankingOutput> {
        self.ranking.process(job_id, risk_bundle_id, top_n).await
    }

    pub async fn content(&self, job_id: Uuid) -> StageResult<ContentOutput> {
        self.content.process(job_id).await
    }

    pub async fn safety(
        &self,
        job_id: Uuid,
        selection: &RuleSelection,
    ) -> StageResult<SafetyOutput> {
        self.safety.process(job_id, selection).await
    }

    /// Persist a check carried by an earlier `SAVE_FAILED`.
    pub async fn retry_safety_save(
        &self,
        job_id: Uuid,
        check: SafetyCheck,
    ) -> StageResult<SafetyOutput> {
        self.safety.retry_save(job_id, check).await
    }

    pub async fn validation(&self, job_id: Uuid) -> StageResult<ValidationOutput> {
        self.validation.process(job_id).await
    }

    pub async fn delivery(&self, job_id: Uuid, recipients: &[Uuid]) -> StageResult<DeliveryOutput> {
        self.delivery.process(job_id, recipients).await
    }

    pub async fn pdf(&self, job_id: Uuid) -> StageResult<PdfOutput> {
        self.pdf.process(job_id).await
    }

    pub async fn activate_rule_version(
        &self,
        version_id: Uuid,
        change_reason: Option<String>,
        changed_by: &str,
    ) -> StageResult<ActivationOutput> {
        let activation = self
            .ctx
            .registry
            .activate(version_id, change_reason, changed_by)
            .await?;
        Ok(ActivationOutput {
            activated: activation.activated,
            archived: activation.archived,
        })
    }

    /// Evaluate `intake` against `selection` without touching any job or rule.
    pub async fn evaluate_safety_sandbox(
        &self,
        intake: &IntakeData,
        selection: &RuleSelection,
    ) -> StageResult<SandboxOutput> {
        let rules = selection.resolve(self.ctx.stores.rules.as_ref()).await?;
        let verdict = engine::evaluate(&rules, intake)
            .map_err(|e| StageFailure::new(ErrorCode::EvaluationFailed, e.to_string()))?;
        Ok(SandboxOutput {
            rule_snapshot: engine::snapshot(&rules),
            safety_score: verdict.safety_score(),
            recommended_action: verdict.recommended_action(),
            requires_review: verdict.requires_review(),
            verdict,
        })
    }

    pub async fn check_duplicate_run(
        &self,
        patient_id: Uuid,
        inputs: &Value,
    ) -> Result<DedupOutcome, PipelineError> {
        let inputs_hash = self.dedup.inputs_hash(inputs)?;
        Ok(self
            .dedup
            .check_duplicate(&inputs_hash, patient_id, self.dedup.window())
            .await)
    }

    pub async fn submit_diagnosis_run(
        &self,
        patient_id: Uuid,
        inputs: &Value,
    ) -> Result<RunSubmission, PipelineError> {
        self.dedup.submit_run(patient_id, inputs).await
    }
}

fn to_value<T: Serialize>(result: StageResult<T>) -> StageResult<Value> {
    result.and_then(|output| {
        serde_json::to_value(output).map_err(|e| StageFailure::internal("serialize output", e))
    })
}
