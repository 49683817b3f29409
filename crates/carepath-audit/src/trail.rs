//! Rule-version change records.

use serde_json::json;
use uuid::Uuid;

use carepath_core::models::audit::AuditRecord;
use carepath_core::models::rule::{RuleStatus, RuleVersion};
use carepath_storage::RuleStore;

use crate::error::AuditError;
use crate::events::AuditEvent;

pub const RULE_VERSIONS_TABLE: &str = "rule_versions";

fn status_snapshot(version: &RuleVersion) -> serde_json::Value {
    json!({
        "rule_key": version.rule_key,
        "version": version.version,
        "status": version.status,
        "activated_at": version.activated_at,
        "archived_at": version.archived_at,
    })
}

fn record(
    record_id: Uuid,
    operation: &str,
    old_values: Option<serde_json::Value>,
    new_values: Option<serde_json::Value>,
    changed_by: &str,
    change_reason: Option<String>,
) -> AuditRecord {
    AuditRecord {
        id: Uuid::new_v4(),
        table_name: RULE_VERSIONS_TABLE.to_string(),
        record_id,
        operation: operation.to_string(),
        old_values,
        new_values,
        changed_by: changed_by.to_string(),
        change_reason,
        created_at: jiff::Timestamp::now(),
    }
}

/// Record for a freshly created draft; carries the full document.
pub fn creation(version: &RuleVersion, changed_by: &str) -> Result<AuditRecord, AuditError> {
    Ok(record(
        version.id,
        "create",
        None,
        Some(serde_json::to_value(version)?),
        changed_by,
        version.change_reason.clone(),
    ))
}

/// Record for a status transition, holding before/after status snapshots.
pub fn status_change(
    before: &RuleVersion,
    after: &RuleVersion,
    changed_by: &str,
    change_reason: Option<String>,
) -> AuditRecord {
    let operation = match after.status {
        RuleStatus::Active => "activate",
        RuleStatus::Archived => "archive",
        RuleStatus::Draft => "update",
    };
    record(
        after.id,
        operation,
        Some(status_snapshot(before)),
        Some(status_snapshot(after)),
        changed_by,
        change_reason,
    )
}

/// Persist `record` and emit the matching audit event.
pub async fn append(store: &dyn RuleStore, record: AuditRecord) -> Result<(), AuditError> {
    store.insert_audit(record.clone()).await?;
    emit(&record);
    Ok(())
}

/// Emit the audit event for a record that has already been persisted.
pub fn emit(record: &AuditRecord) {
    let event = AuditEvent::new(
        record.operation.clone(),
        record.table_name.clone(),
        record.record_id.to_string(),
        record.changed_by.clone(),
    );
    let event = match &record.new_values {
        Some(values) => event.with_details(values.clone()),
        None => event,
    };
    event.emit();
}

/// Every change record for one rule version, oldest first.
pub async fn history(
    store: &dyn RuleStore,
    record_id: Uuid,
) -> Result<Vec<AuditRecord>, AuditError> {
    let mut records = store.list_audit(record_id).await?;
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(records)
}
