use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use carepath_core::hash::{ContentHash, canonical_hash};
use carepath_core::models::artifact::ArtifactKind;
use carepath_core::models::intake::IntakeData;
use carepath_core::models::job::{JobStatus, Stage};
use carepath_core::models::safety::{RuleVersionRef, SafetyCheck};
use carepath_core::models::sections::ReportSections;
use carepath_rules::engine::{self, RuleSelection};

use crate::error::{ErrorCode, StageFailure, StageResult};
use crate::stages::StageContext;

#[derive(Debug, Clone, Serialize)]
pub struct SafetyOutput {
    pub check: SafetyCheck,
}

#[derive(Serialize)]
struct SafetyInputs<'a> {
    rule_snapshot: &'a [RuleVersionRef],
    intake: &'a IntakeData,
}

#[derive(Clone)]
pub struct SafetyProcessor {
    ctx: StageContext,
}

impl SafetyProcessor {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    /// Evaluate the job's intake against the selected safety rules.
    ///
    /// A stored check computed from the same rule snapshot and intake is
    /// returned as is. When persisting a fresh check fails, the failure
    /// carries it in `details.safety_check` for [`Self::retry_save`].
    pub async fn process(
        &self,
        job_id: Uuid,
        selection: &RuleSelection,
    ) -> StageResult<SafetyOutput> {
        self.ctx
            .tracker
            .run(Stage::Safety, job_id, |job| async move {
                let _sections: ReportSections = self
                    .ctx
                    .required(job.id, ArtifactKind::Sections, ErrorCode::LoadSectionsFailed)
                    .await?;
                let intake = self
                    .ctx
                    .stores
                    .intake
                    .get_intake(job.assessment_id)
                    .await
                    .map_err(|e| StageFailure::internal("load intake", e))?
                    .ok_or_else(|| {
                        StageFailure::not_found(format!(
                            "no intake data for assessment {}",
                            job.assessment_id
                        ))
                    })?;

                let rules = selection.resolve(self.ctx.stores.rules.as_ref()).await?;
                let rule_snapshot = engine::snapshot(&rules);
                let inputs_hash = self.inputs_hash(&rule_snapshot, &intake)?;

                if let Some(mut existing) = self
                    .ctx
                    .artifact::<SafetyCheck>(job.id, ArtifactKind::SafetyCheck)
                    .await?
                    && existing.inputs_hash == inputs_hash
                {
                    existing.is_new_check = false;
                    return Ok(SafetyOutput { check: existing });
                }

                let verdict = engine::evaluate(&rules, &intake)
                    .map_err(|e| StageFailure::new(ErrorCode::EvaluationFailed, e.to_string()))?;
                let check = SafetyCheck {
                    id: Uuid::new_v4(),
                    job_id: job.id,
                    safety_score: verdict.safety_score(),
                    recommended_action: verdict.recommended_action(),
                    requires_review: verdict.requires_review(),
                    is_new_check: true,
                    escalation_level: verdict.escalation_level,
                    red_flags: verdict.red_flags,
                    triggered_rules: verdict.triggered_rules,
                    rule_snapshot,
                    inputs_hash,
                    evaluated_at: jiff::Timestamp::now(),
                };

                let saved = self.ctx.save(job.id, ArtifactKind::SafetyCheck, &check).await;
                if let Err(failure) = saved {
                    return Err(failure.with_details(json!({ "safety_check": check })));
                }

                info!(
                    job_id = %job.id,
                    correlation_id = %job.correlation_id,
                    escalation_level = check.escalation_level.as_str(),
                    triggered = check.triggered_rules.len(),
                    requires_review = check.requires_review,
                    "safety check evaluated"
                );
                Ok(SafetyOutput { check })
            })
            .await
    }

    /// Persist a check returned in a `SAVE_FAILED` failure without re-evaluating.
    ///
    /// Attempt limits do not apply. The job advances past the safety stage if
    /// it is still there.
    pub async fn retry_save(&self, job_id: Uuid, check: SafetyCheck) -> StageResult<SafetyOutput> {
        if check.job_id != job_id {
            return Err(StageFailure::validation(format!(
                "safety check {} belongs to job {}, not {job_id}",
                check.id, check.job_id
            )));
        }
        let job = self.ctx.tracker.load(job_id).await?;
        if job.stage.ordinal() < Stage::Safety.ordinal() {
            return Err(StageFailure::invalid_state(format!(
                "job is at stage {}, cannot save a safety check",
                job.stage
            )));
        }

        self.ctx
            .save(job.id, ArtifactKind::SafetyCheck, &check)
            .await
            .map_err(|failure| failure.with_details(json!({ "safety_check": check })))?;

        if job.stage == Stage::Safety && job.status != JobStatus::Completed {
            self.ctx.tracker.complete(&job, Stage::Safety).await?;
        } else {
            warn!(
                job_id = %job.id,
                stage = job.stage.as_str(),
                "safety check saved for a job past the safety stage"
            );
        }
        info!(job_id = %job.id, correlation_id = %job.correlation_id, "safety check save retried");
        Ok(SafetyOutput { check })
    }

    fn inputs_hash(
        &self,
        rule_snapshot: &[RuleVersionRef],
        intake: &IntakeData,
    ) -> StageResult<ContentHash> {
        canonical_hash(
            &self.ctx.settings.versions.safety_inputs,
            &SafetyInputs {
                rule_snapshot,
                intake,
            },
        )
        .map_err(|e| StageFailure::internal("hash safety inputs", e))
    }
}
