use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use carepath_core::models::artifact::ArtifactKind;
use carepath_core::models::job::Stage;
use carepath_core::models::ranking::{PriorityRanking, RankedIntervention, Tier};
use carepath_core::models::risk::RiskBundle;
use carepath_rules::scoring::InterventionTemplate;

use crate::error::{ErrorCode, StageFailure, StageResult};
use crate::stages::{StageContext, round_to};

pub const MIN_TOP_N: u32 = 1;
pub const MAX_TOP_N: u32 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct RankingOutput {
    pub ranking: PriorityRanking,
    pub is_new_ranking: bool,
}

#[derive(Clone)]
pub struct RankingProcessor {
    ctx: StageContext,
}

impl RankingProcessor {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    /// Rank interventions for the job's risk bundle.
    ///
    /// `top_n` is checked before the job is touched. `risk_bundle_id`, when
    /// given, must name the job's bundle.
    pub async fn process(
        &self,
        job_id: Uuid,
        risk_bundle_id: Option<Uuid>,
        top_n: Option<u32>,
    ) -> StageResult<RankingOutput> {
        let top_n = top_n.unwrap_or(self.ctx.settings.default_top_n);
        if !(MIN_TOP_N..=MAX_TOP_N).contains(&top_n) {
            return Err(StageFailure::validation(format!(
                "top_n must be between {MIN_TOP_N} and {MAX_TOP_N}, got {top_n}"
            )));
        }

        self.ctx
            .tracker
            .run(Stage::Ranking, job_id, |job| async move {
                let bundle: RiskBundle = self
                    .ctx
                    .required(job.id, ArtifactKind::RiskBundle, ErrorCode::LoadRiskBundleFailed)
                    .await?;
                if let Some(requested) = risk_bundle_id
                    && requested != bundle.id
                {
                    return Err(StageFailure::new(
                        ErrorCode::LoadRiskBundleFailed,
                        format!("risk bundle {requested} does not belong to job {}", job.id),
                    ));
                }

                if let Some(existing) = self
                    .ctx
                    .artifact::<PriorityRanking>(job.id, ArtifactKind::Ranking)
                    .await?
                    && existing.risk_bundle_id == bundle.id
                    && existing.top_n == top_n
                {
                    return Ok(RankingOutput {
                        ranking: existing,
                        is_new_ranking: false,
                    });
                }

                let scoring = self.ctx.scoring().await?;
                let versions = &self.ctx.settings.versions;
                let ranking = PriorityRanking {
                    id: Uuid::new_v4(),
                    ranking_version: versions.ranking.clone(),
                    algorithm_version: versions.ranking_algorithm.clone(),
                    risk_bundle_id: bundle.id,
                    job_id: job.id,
                    top_n,
                    top_interventions: rank(&bundle, scoring.defaults.catalog(), top_n),
                    created_at: jiff::Timestamp::now(),
                };
                self.ctx.save(job.id, ArtifactKind::Ranking, &ranking).await?;

                info!(
                    job_id = %job.id,
                    correlation_id = %job.correlation_id,
                    top_n,
                    ranked = ranking.top_interventions.len(),
                    "ranking created"
                );
                Ok(RankingOutput {
                    ranking,
                    is_new_ranking: true,
                })
            })
            .await
    }
}

/// Score catalog entries against the bundle's factors and keep the best `top_n`.
///
/// Candidates are gathered factor by factor in bundle order, then catalog
/// order within a factor; the sort is stable, so equal priorities keep that
/// order. Factors without answers contribute nothing. Fewer candidates than
/// `top_n` yields a shorter list.
pub fn rank(
    bundle: &RiskBundle,
    catalog: &[InterventionTemplate],
    top_n: u32,
) -> Vec<RankedIntervention> {
    let mut candidates: Vec<RankedIntervention> = Vec::new();
    for factor in bundle
        .risk_score
        .factors
        .iter()
        .filter(|f| f.answered_questions > 0)
    {
        for template in catalog.iter().filter(|t| t.topic == factor.factor_id) {
            let impact = round_to(factor.score / 100.0 * template.impact, 4);
            let feasibility = template.feasibility;
            candidates.push(RankedIntervention {
                intervention_id: template.id.clone(),
                topic: template.topic.clone(),
                title: template.title.clone(),
                impact_score: impact,
                feasibility_score: feasibility,
                priority_score: round_to(impact * feasibility * 100.0, 2),
                rank: 0,
                tier_compatibility: tiers_for(feasibility),
            });
        }
    }

    candidates.sort_by(|a, b| b.priority_score.total_cmp(&a.priority_score));
    candidates.truncate(top_n as usize);
    for (i, candidate) in candidates.iter_mut().enumerate() {
        candidate.rank = i as u32 + 1;
    }
    candidates
}

pub fn tiers_for(feasibility: f64) -> Vec<Tier> {
    if feasibility >= 0.7 {
        vec![Tier::Essential, Tier::Standard, Tier::Premium]
    } else if feasibility >= 0.4 {
        vec![Tier::Standard, Tier::Premium]
    } else {
        vec![Tier::Premium]
    }
}
