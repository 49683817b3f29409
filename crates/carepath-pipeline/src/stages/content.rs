use std::time::Instant;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use carepath_core::hash::canonical_hash;
use carepath_core::models::artifact::ArtifactKind;
use carepath_core::models::job::Stage;
use carepath_core::models::ranking::PriorityRanking;
use carepath_core::models::risk::RiskBundle;
use carepath_core::models::sections::{ReportSection, ReportSections, SectionInputs};
use carepath_export::render::{SectionContext, render_sections};
use carepath_export::templates::TEMPLATE_VERSION;

use crate::error::{ErrorCode, StageFailure, StageResult};
use crate::stages::StageContext;

#[derive(Debug, Clone, Serialize)]
pub struct ContentOutput {
    pub sections: ReportSections,
    pub is_new_sections: bool,
    /// Zero when existing sections were reused.
    pub generation_ms: u64,
}

#[derive(Serialize)]
struct ContentInputs<'a> {
    risk_bundle: &'a RiskBundle,
    ranking: &'a PriorityRanking,
}

#[derive(Clone)]
pub struct ContentProcessor {
    ctx: StageContext,
}

impl ContentProcessor {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    pub async fn process(&self, job_id: Uuid) -> StageResult<ContentOutput> {
        self.ctx
            .tracker
            .run(Stage::Content, job_id, |job| async move {
                let bundle: RiskBundle = self
                    .ctx
                    .required(job.id, ArtifactKind::RiskBundle, ErrorCode::LoadRiskBundleFailed)
                    .await?;
                let ranking: PriorityRanking = self
                    .ctx
                    .required(job.id, ArtifactKind::Ranking, ErrorCode::LoadRankingFailed)
                    .await?;

                let content_hash = canonical_hash(
                    TEMPLATE_VERSION,
                    &ContentInputs {
                        risk_bundle: &bundle,
                        ranking: &ranking,
                    },
                )
                .map_err(|e| StageFailure::internal("hash content inputs", e))?;

                if let Some(existing) = self
                    .ctx
                    .artifact::<ReportSections>(job.id, ArtifactKind::Sections)
                    .await?
                    && existing.content_hash == content_hash
                {
                    return Ok(ContentOutput {
                        sections: existing,
                        is_new_sections: false,
                        generation_ms: 0,
                    });
                }

                let started = Instant::now();
                let rendered = render_sections(&SectionContext::from_artifacts(&bundle, &ranking))
                    .map_err(|e| StageFailure::new(ErrorCode::GenerationFailed, e.to_string()))?;

                let inputs = SectionInputs {
                    risk_bundle_id: bundle.id,
                    ranking_id: Some(ranking.id),
                    overall_score: bundle.risk_score.overall,
                    risk_level: bundle.risk_score.risk_level,
                    factor_ids: bundle
                        .risk_score
                        .factors
                        .iter()
                        .filter(|f| f.answered_questions > 0)
                        .map(|f| f.factor_id.clone())
                        .collect(),
                    intervention_ids: ranking
                        .top_interventions
                        .iter()
                        .map(|i| i.intervention_id.clone())
                        .collect(),
                };
                let sections = ReportSections {
                    id: Uuid::new_v4(),
                    sections_version: self.ctx.settings.versions.sections.clone(),
                    job_id: job.id,
                    content_hash,
                    template_version: TEMPLATE_VERSION.to_string(),
                    sections: rendered
                        .into_iter()
                        .map(|s| ReportSection {
                            key: s.key,
                            title: s.title,
                            body: s.body,
                            prompt_version: s.prompt_version,
                            inputs: inputs.clone(),
                        })
                        .collect(),
                    created_at: jiff::Timestamp::now(),
                };
                let generation_ms = started.elapsed().as_millis() as u64;
                self.ctx.save(job.id, ArtifactKind::Sections, &sections).await?;

                info!(
                    job_id = %job.id,
                    correlation_id = %job.correlation_id,
                    sections = sections.sections.len(),
                    generation_ms,
                    "report sections generated"
                );
                Ok(ContentOutput {
                    sections,
                    is_new_sections: true,
                    generation_ms,
                })
            })
            .await
    }
}
