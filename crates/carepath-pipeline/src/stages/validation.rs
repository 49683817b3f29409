use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use carepath_core::models::artifact::ArtifactKind;
use carepath_core::models::job::Stage;
use carepath_core::models::ranking::PriorityRanking;
use carepath_core::models::risk::RiskBundle;
use carepath_core::models::safety::{EscalationLevel, SafetyCheck};
use carepath_core::models::sections::ReportSections;
use carepath_core::models::validation::{ValidationCheck, ValidationResult, ValidationStatus};

use crate::error::{ErrorCode, StageResult};
use crate::stages::StageContext;

#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutput {
    pub result: ValidationResult,
    pub is_new_result: bool,
}

#[derive(Clone)]
pub struct ValidationProcessor {
    ctx: StageContext,
}

impl ValidationProcessor {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    /// Aggregate the job's artifacts into a pass/fail verdict.
    ///
    /// The safety check must exist; any other missing artifact is recorded
    /// as a failed critical check.
    pub async fn process(&self, job_id: Uuid) -> StageResult<ValidationOutput> {
        self.ctx
            .tracker
            .run(Stage::Validation, job_id, |job| async move {
                if let Some(existing) = self
                    .ctx
                    .artifact::<ValidationResult>(job.id, ArtifactKind::Validation)
                    .await?
                {
                    return Ok(ValidationOutput {
                        result: existing,
                        is_new_result: false,
                    });
                }

                let safety: SafetyCheck = self
                    .ctx
                    .required(job.id, ArtifactKind::SafetyCheck, ErrorCode::LoadSafetyCheckFailed)
                    .await?;
                let bundle = self
                    .ctx
                    .artifact::<RiskBundle>(job.id, ArtifactKind::RiskBundle)
                    .await?;
                let ranking = self
                    .ctx
                    .artifact::<PriorityRanking>(job.id, ArtifactKind::Ranking)
                    .await?;
                let sections = self
                    .ctx
                    .artifact::<ReportSections>(job.id, ArtifactKind::Sections)
                    .await?;

                let result = validate(
                    job.id,
                    bundle.as_ref(),
                    ranking.as_ref(),
                    sections.as_ref(),
                    &safety,
                );
                self.ctx
                    .save(job.id, ArtifactKind::Validation, &result)
                    .await?;

                info!(
                    job_id = %job.id,
                    correlation_id = %job.correlation_id,
                    status = ?result.overall_status,
                    critical_flags = result.critical_flags_count,
                    "validation recorded"
                );
                Ok(ValidationOutput {
                    result,
                    is_new_result: true,
                })
            })
            .await
    }
}

fn check(name: &str, passed: bool, critical: bool, message: impl Into<String>) -> ValidationCheck {
    ValidationCheck {
        name: name.to_string(),
        passed,
        critical,
        message: message.into(),
    }
}

/// Derive a verdict from whatever artifacts exist. No I/O.
///
/// A failed critical check is a critical flag. Any critical flag fails the
/// result; otherwise a safety check that requires review holds it for review.
pub fn validate(
    job_id: Uuid,
    bundle: Option<&RiskBundle>,
    ranking: Option<&PriorityRanking>,
    sections: Option<&ReportSections>,
    safety: &SafetyCheck,
) -> ValidationResult {
    let mut checks = Vec::new();

    checks.push(match bundle {
        Some(b) => check(
            "risk_bundle",
            true,
            true,
            format!("risk level {}", b.risk_score.risk_level.as_str()),
        ),
        None => check("risk_bundle", false, true, "risk bundle is missing"),
    });

    checks.push(match (ranking, bundle) {
        (None, _) => check("ranking", false, true, "ranking is missing"),
        (Some(r), Some(b)) if r.risk_bundle_id != b.id => {
            check("ranking", false, true, "ranking was built from a different risk bundle")
        }
        (Some(r), _) => check(
            "ranking",
            true,
            true,
            format!("{} interventions ranked", r.top_interventions.len()),
        ),
    });

    match sections {
        None => checks.push(check("sections", false, true, "report sections are missing")),
        Some(s) => {
            let empty: Vec<&str> = s
                .sections
                .iter()
                .filter(|section| section.body.trim().is_empty())
                .map(|section| section.key.as_str())
                .collect();
            checks.push(if s.sections.is_empty() {
                check("sections", false, true, "no report sections were generated")
            } else if !empty.is_empty() {
                check("sections", false, true, format!("empty sections: {}", empty.join(", ")))
            } else {
                check("sections", true, true, format!("{} sections", s.sections.len()))
            });

            let foreign = s.sections.iter().any(|section| {
                bundle.is_some_and(|b| section.inputs.risk_bundle_id != b.id)
                    || section
                        .inputs
                        .ranking_id
                        .is_some_and(|id| ranking.is_some_and(|r| r.id != id))
            });
            checks.push(if foreign {
                check(
                    "section_inputs",
                    false,
                    false,
                    "sections reference artifacts from another run",
                )
            } else {
                check(
                    "section_inputs",
                    true,
                    false,
                    "sections reference only scores and signal ids",
                )
            });
        }
    }

    checks.push(if safety.escalation_level == EscalationLevel::Emergency {
        check("escalation", false, true, "emergency escalation")
    } else {
        check(
            "escalation",
            true,
            true,
            format!("escalation {}", safety.escalation_level.as_str()),
        )
    });
    checks.push(check(
        "safety_review",
        !safety.requires_review,
        false,
        if safety.requires_review {
            "safety check requires clinician review"
        } else {
            "no review required"
        },
    ));

    let critical_flags_count = checks.iter().filter(|c| c.critical && !c.passed).count() as u32;
    let overall_status = if critical_flags_count > 0 {
        ValidationStatus::Failed
    } else if safety.requires_review {
        ValidationStatus::NeedsReview
    } else {
        ValidationStatus::Passed
    };

    ValidationResult {
        id: Uuid::new_v4(),
        job_id,
        overall_passed: overall_status == ValidationStatus::Passed,
        overall_status,
        critical_flags_count,
        checks,
        validated_at: jiff::Timestamp::now(),
    }
}
