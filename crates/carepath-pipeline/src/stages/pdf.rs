//! Report PDF generation.
//!
//! Fail-closed: the job's [`PdfRecord`] always points at an object that
//! exists. A new document is uploaded under a fresh path, the pointer is
//! switched, and only then is the superseded object deleted. If the pointer
//! cannot be switched the new upload is removed and the old pointer stays.

use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use carepath_core::hash::{ContentHash, canonical_hash};
use carepath_core::keys;
use carepath_core::models::artifact::ArtifactKind;
use carepath_core::models::job::{ProcessingJob, Stage};
use carepath_core::models::pdf::PdfRecord;
use carepath_core::models::sections::{ReportSection, ReportSections};
use carepath_export::pdf::generate_pdf;
use carepath_export::render::report_text;
use carepath_export::styles::PdfStyles;

use crate::error::{ErrorCode, StageFailure, StageResult};
use crate::stages::{StageContext, bounded};

const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Clone, Serialize)]
pub struct PdfOutput {
    pub pdf_path: String,
    pub content_hash: ContentHash,
    /// `None` if the URL could not be signed; the document itself is stored.
    pub signed_url: Option<String>,
    pub is_new_pdf: bool,
    /// Zero when the existing document was reused.
    pub generation_ms: u64,
}

#[derive(Serialize)]
struct PdfInputs<'a> {
    template_version: &'a str,
    sections_version: &'a str,
    sections: &'a [ReportSection],
}

#[derive(Clone)]
pub struct PdfProcessor {
    ctx: StageContext,
    styles: PdfStyles,
}

impl PdfProcessor {
    pub fn new(ctx: StageContext) -> Self {
        Self {
            ctx,
            styles: PdfStyles::default(),
        }
    }

    pub async fn process(&self, job_id: Uuid) -> StageResult<PdfOutput> {
        self.ctx
            .tracker
            .run(Stage::Pdf, job_id, |job| async move { self.generate(&job).await })
            .await
    }

    async fn generate(&self, job: &ProcessingJob) -> StageResult<PdfOutput> {
        let sections: ReportSections = self
            .ctx
            .required(job.id, ArtifactKind::Sections, ErrorCode::LoadSectionsFailed)
            .await?;
        let template_version = &self.ctx.settings.versions.pdf_template;
        let content_hash = canonical_hash(
            template_version,
            &PdfInputs {
                template_version,
                sections_version: &sections.sections_version,
                sections: &sections.sections,
            },
        )
        .map_err(|e| StageFailure::internal("hash pdf inputs", e))?;

        let previous = self
            .ctx
            .artifact::<PdfRecord>(job.id, ArtifactKind::Pdf)
            .await?;
        if let Some(existing) = &previous
            && existing.content_hash == content_hash
        {
            return Ok(PdfOutput {
                signed_url: self.sign(job, &existing.pdf_path).await,
                pdf_path: existing.pdf_path.clone(),
                content_hash,
                is_new_pdf: false,
                generation_ms: 0,
            });
        }

        let started = Instant::now();
        let text = report_text(&self.ctx.settings.report_title, &sections.sections);
        let bytes = generate_pdf(&self.ctx.settings.report_title, &text, &self.styles)
            .map_err(|e| StageFailure::new(ErrorCode::GenerationFailed, e.to_string()))?;
        let generation_ms = started.elapsed().as_millis() as u64;

        let limit = self.ctx.settings.io_timeout();
        let path = keys::job_pdf(job.id, content_hash.short(), Uuid::new_v4());
        let pdf_path = bounded(
            limit,
            self.ctx.stores.objects.upload(&path, bytes, PDF_CONTENT_TYPE),
        )
        .await
        .map_err(|message| {
            StageFailure::new(ErrorCode::UploadFailed, format!("upload report: {message}"))
        })?;

        let record = PdfRecord {
            job_id: job.id,
            pdf_path: pdf_path.clone(),
            content_hash: content_hash.clone(),
            template_version: template_version.clone(),
            sections_version: sections.sections_version.clone(),
            generated_at: jiff::Timestamp::now(),
        };
        if let Err(failure) = self.ctx.save(job.id, ArtifactKind::Pdf, &record).await {
            self.discard(job, &pdf_path).await;
            return Err(failure);
        }

        if let Some(old) = previous.filter(|old| old.pdf_path != pdf_path) {
            self.discard(job, &old.pdf_path).await;
        }

        info!(
            job_id = %job.id,
            correlation_id = %job.correlation_id,
            content_hash = content_hash.short(),
            generation_ms,
            "report pdf generated"
        );
        Ok(PdfOutput {
            signed_url: self.sign(job, &pdf_path).await,
            pdf_path,
            content_hash,
            is_new_pdf: true,
            generation_ms,
        })
    }

    /// Best-effort delete; failures are logged and swallowed.
    async fn discard(&self, job: &ProcessingJob, path: &str) {
        let limit = self.ctx.settings.io_timeout();
        match bounded(limit, self.ctx.stores.objects.delete(path)).await {
            Ok(true) => {}
            Ok(false) => warn!(job_id = %job.id, path, "pdf object already gone"),
            Err(message) => warn!(
                job_id = %job.id,
                correlation_id = %job.correlation_id,
                path,
                error = %message,
                "failed to delete pdf object"
            ),
        }
    }

    async fn sign(&self, job: &ProcessingJob, path: &str) -> Option<String> {
        let settings = &self.ctx.settings;
        match bounded(
            settings.io_timeout(),
            self.ctx.stores.objects.signed_url(path, settings.signed_url_ttl()),
        )
        .await
        {
            Ok(url) => Some(url),
            Err(message) => {
                warn!(job_id = %job.id, path, error = %message, "failed to sign pdf url");
                None
            }
        }
    }
}
