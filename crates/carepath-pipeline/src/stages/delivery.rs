use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use carepath_core::models::artifact::ArtifactKind;
use carepath_core::models::delivery::{DeliveryRecord, RecipientNotification};
use carepath_core::models::job::Stage;
use carepath_core::models::validation::ValidationResult;

use crate::error::{ErrorCode, StageFailure, StageResult};
use crate::stages::{StageContext, bounded};

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutput {
    pub notification_ids: Vec<Uuid>,
    pub is_new_delivery: bool,
}

/// Notifies recipients that a job's report is ready.
///
/// Who may trigger delivery is decided by the caller.
#[derive(Clone)]
pub struct DeliveryProcessor {
    ctx: StageContext,
}

impl DeliveryProcessor {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    pub async fn process(&self, job_id: Uuid, recipients: &[Uuid]) -> StageResult<DeliveryOutput> {
        self.ctx
            .tracker
            .run(Stage::Delivery, job_id, |job| async move {
                let validation: ValidationResult = self
                    .ctx
                    .required(job.id, ArtifactKind::Validation, ErrorCode::LoadValidationFailed)
                    .await?;

                let existing = self
                    .ctx
                    .artifact::<DeliveryRecord>(job.id, ArtifactKind::Delivery)
                    .await?;
                if let Some(record) = existing.as_ref().filter(|r| r.is_complete()) {
                    if job.delivered_at.is_none() {
                        self.ctx.tracker.mark_delivered(job.id).await?;
                    }
                    return Ok(DeliveryOutput {
                        notification_ids: record.notification_ids(),
                        is_new_delivery: false,
                    });
                }

                if !validation.overall_passed {
                    return Err(StageFailure::new(
                        ErrorCode::DeliveryIneligible,
                        format!("validation status is {:?}", validation.overall_status),
                    )
                    .with_details(json!({
                        "overall_status": validation.overall_status,
                        "critical_flags_count": validation.critical_flags_count,
                    })));
                }

                // Recipients of an interrupted delivery are kept; new ones are appended.
                let mut record =
                    existing.unwrap_or_else(|| DeliveryRecord::pending(job.id, Vec::new()));
                for recipient in recipients {
                    if !record.recipients.contains(recipient) {
                        record.recipients.push(*recipient);
                    }
                }
                if record.recipients.is_empty() {
                    return Err(StageFailure::new(
                        ErrorCode::DeliveryIneligible,
                        "no recipients to notify",
                    ));
                }

                let payload = json!({
                    "kind": "report_ready",
                    "job_id": job.id,
                    "assessment_id": job.assessment_id,
                });
                let limit = self.ctx.settings.io_timeout();
                for recipient in record.recipients.clone() {
                    if record.notified(recipient) {
                        continue;
                    }
                    let created = bounded(
                        limit,
                        self.ctx
                            .stores
                            .notifications
                            .create_notification(recipient, payload.clone()),
                    )
                    .await;
                    match created {
                        Ok(notification_id) => {
                            record.notifications.push(RecipientNotification {
                                recipient,
                                notification_id,
                            });
                            self.ctx.save(job.id, ArtifactKind::Delivery, &record).await?;
                        }
                        Err(message) => {
                            warn!(
                                job_id = %job.id,
                                correlation_id = %job.correlation_id,
                                created = record.notifications.len(),
                                "notification failed"
                            );
                            return Err(StageFailure::new(
                                ErrorCode::DeliveryError,
                                format!("create notification: {message}"),
                            )
                            .with_details(json!({
                                "created_notification_ids": record.notification_ids(),
                            })));
                        }
                    }
                }

                record.delivered_at = Some(jiff::Timestamp::now());
                self.ctx.save(job.id, ArtifactKind::Delivery, &record).await?;
                self.ctx.tracker.mark_delivered(job.id).await?;

                let notification_ids = record.notification_ids();
                info!(
                    job_id = %job.id,
                    correlation_id = %job.correlation_id,
                    notifications = notification_ids.len(),
                    "report delivered"
                );
                Ok(DeliveryOutput {
                    notification_ids,
                    is_new_delivery: true,
                })
            })
            .await
    }
}
