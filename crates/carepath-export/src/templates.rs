//! Built-in report section templates.
//!
//! Templates only ever see scores, levels, factor labels and intervention
//! titles. Nothing that identifies the patient is in their context.

/// Bumped whenever any template below changes; part of the content hash.
pub const TEMPLATE_VERSION: &str = "sections-v1";

pub struct SectionTemplate {
    pub key: &'static str,
    pub title: &'static str,
    /// Per-section version recorded on each generated section.
    pub prompt_version: &'static str,
    pub source: &'static str,
}

pub const SECTION_TEMPLATES: &[SectionTemplate] = &[
    SectionTemplate {
        key: "summary",
        title: "Summary",
        prompt_version: "summary/v1",
        source: "Your overall risk score is {{ overall_score }} out of 100, which we rate as {{ risk_level }}.
{% if top_factor %}The area contributing most is {{ top_factor.label | lower }} ({{ top_factor.score }}).{% endif %}",
    },
    SectionTemplate {
        key: "risk_factors",
        title: "Risk factors",
        prompt_version: "risk_factors/v1",
        source: "{% for f in factors %}- {{ f.label }}: {{ f.score }} / 100{% if f.answered_questions == 0 %} (not assessed){% endif %}
{% endfor %}",
    },
    SectionTemplate {
        key: "priorities",
        title: "Your priorities",
        prompt_version: "priorities/v1",
        source: "{% if interventions | length == 0 %}No priority actions were identified.{% else %}{% for i in interventions %}- {{ i.rank }}. {{ i.title }} (priority {{ i.priority_score }})
{% endfor %}{% endif %}",
    },
    SectionTemplate {
        key: "next_steps",
        title: "Next steps",
        prompt_version: "next_steps/v1",
        source: "{% if risk_level == \"critical\" or risk_level == \"high\" %}Please book a follow-up with your clinician within the next two weeks.{% else %}Review your priorities and check in again in three months.{% endif %}
{% if interventions | length > 0 %}Start with: {{ interventions.0.title }}.{% endif %}",
    },
];
