use serde::Serialize;
use tera::{Context, Tera};

use carepath_core::models::ranking::PriorityRanking;
use carepath_core::models::risk::RiskBundle;
use carepath_core::models::sections::ReportSection;

use crate::error::ExportError;
use crate::templates::SECTION_TEMPLATES;

/// Render a Tera template against any serializable context.
///
/// `template_content` is the raw template string (Jinja2 syntax); the
/// context's top-level fields become template variables.
pub fn render_template<C: Serialize>(
    template_name: &str,
    template_content: &str,
    context: &C,
) -> Result<String, ExportError> {
    let mut tera = Tera::default();
    tera.add_raw_template(template_name, template_content)
        .map_err(|e| ExportError::TemplateParse(e.to_string()))?;

    let value = serde_json::to_value(context)?;
    let context =
        Context::from_value(value).map_err(|e| ExportError::TemplateRender(e.to_string()))?;

    Ok(tera.render(template_name, &context)?)
}

#[derive(Debug, Clone, Serialize)]
pub struct FactorView {
    pub factor_id: String,
    pub label: String,
    pub score: f64,
    pub answered_questions: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterventionView {
    pub intervention_id: String,
    pub rank: u32,
    pub title: String,
    pub topic: String,
    pub priority_score: f64,
}

/// Everything the section templates may reference.
#[derive(Debug, Clone, Serialize)]
pub struct SectionContext {
    pub overall_score: f64,
    pub risk_level: String,
    pub top_factor: Option<FactorView>,
    pub factors: Vec<FactorView>,
    pub interventions: Vec<InterventionView>,
}

impl SectionContext {
    pub fn from_artifacts(risk: &RiskBundle, ranking: &PriorityRanking) -> Self {
        let factors: Vec<FactorView> = risk
            .risk_score
            .factors
            .iter()
            .map(|f| FactorView {
                factor_id: f.factor_id.clone(),
                label: f.label.clone(),
                score: f.score,
                answered_questions: f.answered_questions,
            })
            .collect();
        let top_factor = factors
            .iter()
            .filter(|f| f.answered_questions > 0)
            .fold(None::<&FactorView>, |best, f| match best {
                Some(b) if b.score >= f.score => Some(b),
                _ => Some(f),
            })
            .cloned();
        let interventions = ranking
            .top_interventions
            .iter()
            .map(|i| InterventionView {
                intervention_id: i.intervention_id.clone(),
                rank: i.rank,
                title: i.title.clone(),
                topic: i.topic.clone(),
                priority_score: i.priority_score,
            })
            .collect();

        Self {
            overall_score: risk.risk_score.overall,
            risk_level: risk.risk_score.risk_level.as_str().to_string(),
            top_factor,
            factors,
            interventions,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSection {
    pub key: String,
    pub title: String,
    pub prompt_version: String,
    pub body: String,
}

/// Render every built-in section, in report order.
pub fn render_sections(context: &SectionContext) -> Result<Vec<RenderedSection>, ExportError> {
    let mut tera = Tera::default();
    for template in SECTION_TEMPLATES {
        tera.add_raw_template(template.key, template.source)
            .map_err(|e| ExportError::TemplateParse(format!("{}: {e}", template.key)))?;
    }
    let context = Context::from_serialize(context)
        .map_err(|e| ExportError::TemplateRender(e.to_string()))?;

    SECTION_TEMPLATES
        .iter()
        .map(|template| {
            let body = tera.render(template.key, &context)?;
            Ok(RenderedSection {
                key: template.key.to_string(),
                title: template.title.to_string(),
                prompt_version: template.prompt_version.to_string(),
                body: body.trim().to_string(),
            })
        })
        .collect()
}

/// Flatten sections into the Markdown-ish text the PDF writer lays out.
///
/// - `# Heading` is the document title
/// - `## Heading` starts a section
/// - `- item` is a bullet
/// - anything else is a paragraph line
pub fn report_text(title: &str, sections: &[ReportSection]) -> String {
    let mut out = format!("# {title}\n\n");
    for section in sections {
        out.push_str(&format!("## {}\n", section.title));
        out.push_str(section.body.trim());
        out.push_str("\n\n");
    }
    out
}
