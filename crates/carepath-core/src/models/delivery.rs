use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Per-job delivery progress.
///
/// Saved after every notification, so a retried delivery only notifies the
/// recipients that have no entry yet. `delivered_at` is set once all of them
/// have one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeliveryRecord {
    pub job_id: Uuid,
    pub recipients: Vec<Uuid>,
    pub notifications: Vec<RecipientNotification>,
    pub delivered_at: Option<jiff::Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecipientNotification {
    pub recipient: Uuid,
    pub notification_id: Uuid,
}

impl DeliveryRecord {
    pub fn pending(job_id: Uuid, recipients: Vec<Uuid>) -> Self {
        Self {
            job_id,
            recipients,
            notifications: Vec::new(),
            delivered_at: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.delivered_at.is_some()
    }

    pub fn notified(&self, recipient: Uuid) -> bool {
        self.notifications.iter().any(|n| n.recipient == recipient)
    }

    /// Notification ids in recipient order.
    pub fn notification_ids(&self) -> Vec<Uuid> {
        self.recipients
            .iter()
            .filter_map(|r| {
                self.notifications
                    .iter()
                    .find(|n| n.recipient == *r)
                    .map(|n| n.notification_id)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub payload: serde_json::Value,
    pub created_at: jiff::Timestamp,
}
