use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use carepath_core::models::artifact::ArtifactKind;
use carepath_core::models::job::Stage;
use carepath_core::models::risk::RiskBundle;

use crate::error::{ErrorCode, StageFailure, StageResult};
use crate::stages::StageContext;

#[derive(Debug, Clone, Serialize)]
pub struct RiskOutput {
    pub bundle: RiskBundle,
    pub is_new_bundle: bool,
}

/// Scores the assessment's answers into a [`RiskBundle`].
///
/// The bundle is immutable per job: once written, later calls return it
/// without reading answers again.
#[derive(Clone)]
pub struct RiskProcessor {
    ctx: StageContext,
}

impl RiskProcessor {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    pub async fn process(&self, job_id: Uuid) -> StageResult<RiskOutput> {
        self.ctx
            .tracker
            .run(Stage::Risk, job_id, |job| async move {
                if let Some(bundle) = self
                    .ctx
                    .artifact::<RiskBundle>(job.id, ArtifactKind::RiskBundle)
                    .await?
                {
                    return Ok(RiskOutput {
                        bundle,
                        is_new_bundle: false,
                    });
                }

                let answers = self
                    .ctx
                    .stores
                    .answers
                    .list_answers(job.assessment_id)
                    .await
                    .map_err(|e| StageFailure::internal("load answers", e))?;
                if answers.is_empty() {
                    return Err(StageFailure::new(
                        ErrorCode::NoAnswers,
                        format!("assessment {} has no answers", job.assessment_id),
                    ));
                }

                let scoring = self.ctx.scoring().await?;
                let versions = &self.ctx.settings.versions;
                let bundle = RiskBundle {
                    id: Uuid::new_v4(),
                    risk_bundle_version: versions.risk_bundle.clone(),
                    algorithm_version: versions.risk_algorithm.clone(),
                    scoring_config_version: scoring.version,
                    assessment_id: job.assessment_id,
                    job_id: job.id,
                    calculated_at: jiff::Timestamp::now(),
                    risk_score: scoring.config.score(&answers),
                };
                self.ctx
                    .save(job.id, ArtifactKind::RiskBundle, &bundle)
                    .await?;

                info!(
                    job_id = %job.id,
                    correlation_id = %job.correlation_id,
                    risk_level = bundle.risk_score.risk_level.as_str(),
                    scoring_config_version = ?bundle.scoring_config_version,
                    "risk bundle created"
                );
                Ok(RiskOutput {
                    bundle,
                    is_new_bundle: true,
                })
            })
            .await
    }
}
