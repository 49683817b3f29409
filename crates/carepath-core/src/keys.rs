//! Object key conventions.
//!
//! Pure string functions with no AWS SDK dependency. These define the canonical
//! layout of documents and blobs in the Carepath bucket.

use uuid::Uuid;

use crate::models::artifact::ArtifactKind;

pub fn job(id: Uuid) -> String {
    format!("jobs/{id}/job.json")
}

pub fn artifact(job_id: Uuid, kind: ArtifactKind) -> String {
    format!("jobs/{job_id}/{}.json", kind.as_str())
}

/// A fresh PDF object path. The nonce keeps regenerated documents from
/// overwriting the object the current pointer still references.
pub fn job_pdf(job_id: Uuid, hash_short: &str, nonce: Uuid) -> String {
    let nonce = nonce.simple().to_string();
    format!("jobs/{job_id}/report-{hash_short}-{}.pdf", &nonce[..8])
}

pub fn answers(assessment_id: Uuid) -> String {
    format!("assessments/{assessment_id}/answers.json")
}

pub fn intake(assessment_id: Uuid) -> String {
    format!("assessments/{assessment_id}/intake.json")
}

/// All versions of one rule key and their audit records live in a single
/// document so that an activation can be committed with one conditional write.
pub fn rule_key_document(rule_key: &str) -> String {
    format!("rules/{rule_key}.json")
}

/// Version id → rule key lookup.
pub const RULE_INDEX: &str = "rules/_index.json";

pub fn runs_prefix(patient_id: Uuid) -> String {
    format!("runs/{patient_id}/")
}

pub fn run(patient_id: Uuid, run_id: Uuid) -> String {
    format!("runs/{patient_id}/{run_id}.json")
}

pub fn notification(user_id: Uuid, notification_id: Uuid) -> String {
    format!("notifications/{user_id}/{notification_id}.json")
}
