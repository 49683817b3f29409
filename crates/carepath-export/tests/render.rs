use uuid::Uuid;

use carepath_core::models::ranking::{PriorityRanking, RankedIntervention, Tier};
use carepath_core::models::risk::{RiskBundle, RiskFactor, RiskLevel, RiskScore};
use carepath_core::models::sections::{ReportSection, SectionInputs};
use carepath_export::pdf::{generate_pdf, wrap_text};
use carepath_export::render::{SectionContext, render_sections, render_template, report_text};
use carepath_export::styles::PdfStyles;
use carepath_export::templates::SECTION_TEMPLATES;

fn risk() -> RiskBundle {
    RiskBundle {
        id: Uuid::new_v4(),
        risk_bundle_version: "risk-bundle-v1".to_string(),
        algorithm_version: "weighted-mean-v1".to_string(),
        scoring_config_version: None,
        assessment_id: Uuid::new_v4(),
        job_id: Uuid::new_v4(),
        calculated_at: jiff::Timestamp::now(),
        risk_score: RiskScore {
            overall: 62.5,
            risk_level: RiskLevel::High,
            factors: vec![
                RiskFactor {
                    factor_id: "sleep".to_string(),
                    label: "Sleep".to_string(),
                    score: 80.0,
                    weight: 1.0,
                    answered_questions: 2,
                },
                RiskFactor {
                    factor_id: "diet".to_string(),
                    label: "Diet".to_string(),
                    score: 0.0,
                    weight: 1.0,
                    answered_questions: 0,
                },
            ],
        },
    }
}

fn ranking(bundle: &RiskBundle) -> PriorityRanking {
    PriorityRanking {
        id: Uuid::new_v4(),
        ranking_version: "ranking-v1".to_string(),
        algorithm_version: "impact-feasibility-v1".to_string(),
        risk_bundle_id: bundle.id,
        job_id: bundle.job_id,
        top_n: 5,
        top_interventions: vec![RankedIntervention {
            intervention_id: "sleep_schedule".to_string(),
            topic: "sleep".to_string(),
            title: "Fixed sleep and wake schedule".to_string(),
            impact_score: 0.48,
            feasibility_score: 0.7,
            priority_score: 33.6,
            rank: 1,
            tier_compatibility: vec![Tier::Essential, Tier::Standard, Tier::Premium],
        }],
        created_at: jiff::Timestamp::now(),
    }
}

#[test]
fn renders_every_section_in_order() {
    let bundle = risk();
    let context = SectionContext::from_artifacts(&bundle, &ranking(&bundle));
    let sections = render_sections(&context).unwrap();

    let keys: Vec<_> = sections.iter().map(|s| s.key.as_str()).collect();
    assert_eq!(keys, vec!["summary", "risk_factors", "priorities", "next_steps"]);
    assert_eq!(sections.len(), SECTION_TEMPLATES.len());

    assert!(sections[0].body.contains("high"));
    assert!(sections[0].body.contains("sleep"));
    assert!(sections[1].body.contains("Diet: 0"));
    assert!(sections[1].body.contains("(not assessed)"));
    assert!(sections[2].body.contains("1. Fixed sleep and wake schedule"));
    assert!(sections[3].body.contains("follow-up"));
    assert!(sections.iter().all(|s| !s.body.is_empty()));
}

#[test]
fn empty_ranking_still_renders() {
    let bundle = risk();
    let mut empty = ranking(&bundle);
    empty.top_interventions.clear();
    let sections = render_sections(&SectionContext::from_artifacts(&bundle, &empty)).unwrap();
    assert!(sections[2].body.contains("No priority actions"));
    assert!(!sections[3].body.contains("Start with"));
}

#[test]
fn render_template_reports_parse_errors() {
    let err = render_template("broken", "{% if %}", &serde_json::json!({})).unwrap_err();
    assert!(matches!(err, carepath_export::ExportError::TemplateParse(_)));
}

#[test]
fn wrap_text_respects_width() {
    let lines = wrap_text("one two three four five six", 9);
    assert_eq!(lines, vec!["one two", "three", "four five", "six"]);
    assert!(wrap_text("", 10).is_empty());
}

#[test]
fn pdf_bytes_have_pdf_header() {
    let bundle = risk();
    let section = ReportSection {
        key: "summary".to_string(),
        title: "Summary".to_string(),
        body: "Line one.\n- bullet item".to_string(),
        prompt_version: "summary/v1".to_string(),
        inputs: SectionInputs {
            risk_bundle_id: bundle.id,
            ranking_id: None,
            overall_score: 62.5,
            risk_level: RiskLevel::High,
            factor_ids: vec!["sleep".to_string()],
            intervention_ids: vec![],
        },
    };
    let text = report_text("Assessment report", &[section]);
    assert!(text.starts_with("# Assessment report\n"));
    assert!(text.contains("## Summary\n"));

    let long = format!("{text}{}", "- filler line\n".repeat(200));
    let bytes = generate_pdf("Assessment report", &long, &PdfStyles::default()).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}
