//! Compensation behavior of the provided `commit_activation`.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::json;
use uuid::Uuid;

use carepath_core::models::audit::AuditRecord;
use carepath_core::models::rule::{RuleKind, RuleStatus, RuleVersion};
use carepath_storage::{
    ActivationPlan, BoxFuture, MemoryStore, RuleStore, StatusChange, StoreError,
};

/// Delegates to a [`MemoryStore`] but fails selected writes. Keeps the
/// provided `commit_activation`.
struct FlakyRules {
    inner: MemoryStore,
    fail_audit: AtomicBool,
    /// Fail every write that puts a version back to active.
    fail_restores: AtomicBool,
}

impl FlakyRules {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_audit: AtomicBool::new(false),
            fail_restores: AtomicBool::new(false),
        }
    }
}

fn injected<T>() -> BoxFuture<'static, Result<T, StoreError>>
where
    T: Send + 'static,
{
    Box::pin(std::future::ready(Err(StoreError::Backend(
        "injected failure".to_string(),
    ))))
}

impl RuleStore for FlakyRules {
    fn get_version(&self, id: Uuid) -> BoxFuture<'_, Result<Option<RuleVersion>, StoreError>> {
        self.inner.get_version(id)
    }

    fn list_versions<'a>(
        &'a self,
        rule_key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<RuleVersion>, StoreError>> {
        self.inner.list_versions(rule_key)
    }

    fn list_active_by_key<'a>(
        &'a self,
        rule_key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<RuleVersion>, StoreError>> {
        self.inner.list_active_by_key(rule_key)
    }

    fn list_active(&self, kind: RuleKind) -> BoxFuture<'_, Result<Vec<RuleVersion>, StoreError>> {
        self.inner.list_active(kind)
    }

    fn insert_version(&self, version: RuleVersion) -> BoxFuture<'_, Result<(), StoreError>> {
        self.inner.insert_version(version)
    }

    fn put_version(&self, version: RuleVersion) -> BoxFuture<'_, Result<(), StoreError>> {
        if version.status == RuleStatus::Active
            && version.activated_at.is_none()
            && self.fail_restores.load(Ordering::SeqCst)
        {
            return injected();
        }
        self.inner.put_version(version)
    }

    fn insert_audit(&self, record: AuditRecord) -> BoxFuture<'_, Result<(), StoreError>> {
        if self.fail_audit.load(Ordering::SeqCst) {
            return injected();
        }
        self.inner.insert_audit(record)
    }

    fn list_audit(&self, record_id: Uuid) -> BoxFuture<'_, Result<Vec<AuditRecord>, StoreError>> {
        self.inner.list_audit(record_id)
    }
}

fn rule(version: u32, status: RuleStatus) -> RuleVersion {
    RuleVersion {
        id: Uuid::new_v4(),
        kind: RuleKind::SafetyRule,
        rule_key: "suicidal_ideation".to_string(),
        version,
        status,
        logic: json!({}),
        defaults: json!({}),
        change_reason: None,
        created_by: "tester".to_string(),
        created_at: jiff::Timestamp::now(),
        activated_at: None,
        archived_at: None,
    }
}

fn audit_for(version: &RuleVersion, operation: &str) -> AuditRecord {
    AuditRecord {
        id: Uuid::new_v4(),
        table_name: "rule_versions".to_string(),
        record_id: version.id,
        operation: operation.to_string(),
        old_values: None,
        new_values: None,
        changed_by: "tester".to_string(),
        change_reason: None,
        created_at: jiff::Timestamp::now(),
    }
}

fn plan(previous: &RuleVersion, target: &RuleVersion) -> ActivationPlan {
    let archive = StatusChange::to(previous, RuleStatus::Archived, None).unwrap();
    let activate = StatusChange::to(target, RuleStatus::Active, None).unwrap();
    ActivationPlan {
        rule_key: target.rule_key.clone(),
        audit: vec![audit_for(target, "activate"), audit_for(previous, "archive")],
        changes: vec![archive, activate],
    }
}

async fn seeded(store: &FlakyRules) -> (RuleVersion, RuleVersion) {
    let v1 = rule(1, RuleStatus::Active);
    let v2 = rule(2, RuleStatus::Draft);
    store.insert_version(v1.clone()).await.unwrap();
    store.insert_version(v2.clone()).await.unwrap();
    (v1, v2)
}

#[tokio::test]
async fn commit_writes_versions_and_audit() {
    let store = FlakyRules::new();
    let (v1, v2) = seeded(&store).await;

    store.commit_activation(&plan(&v1, &v2)).await.unwrap();

    let active = store.list_active_by_key("suicidal_ideation").await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, v2.id);
    let archived = store.get_version(v1.id).await.unwrap().unwrap();
    assert_eq!(archived.status, RuleStatus::Archived);
    assert_eq!(store.list_audit(v2.id).await.unwrap().len(), 1);
    assert_eq!(store.list_audit(v1.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_audit_restores_both_versions() {
    let store = FlakyRules::new();
    let (v1, v2) = seeded(&store).await;
    store.fail_audit.store(true, Ordering::SeqCst);

    let err = store.commit_activation(&plan(&v1, &v2)).await.unwrap_err();
    assert!(matches!(err, StoreError::Backend(_)));

    let active = store.list_active_by_key("suicidal_ideation").await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, v1.id);
    let target = store.get_version(v2.id).await.unwrap().unwrap();
    assert_eq!(target.status, RuleStatus::Draft);
    assert!(target.activated_at.is_none());
}

#[tokio::test]
async fn failed_restore_reports_inconsistency() {
    let store = FlakyRules::new();
    let (v1, v2) = seeded(&store).await;
    store.fail_audit.store(true, Ordering::SeqCst);
    store.fail_restores.store(true, Ordering::SeqCst);

    let err = store.commit_activation(&plan(&v1, &v2)).await.unwrap_err();
    assert!(matches!(err, StoreError::Inconsistent(_)));
}

#[tokio::test]
async fn stale_plan_is_a_conflict() {
    let store = FlakyRules::new();
    let (v1, v2) = seeded(&store).await;
    let stale = plan(&v1, &v2);
    store.commit_activation(&plan(&v1, &v2)).await.unwrap();

    let err = store.commit_activation(&stale).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    assert_eq!(store.list_audit(v2.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn illegal_edge_is_rejected_before_any_write() {
    let store = FlakyRules::new();
    let (v1, v2) = seeded(&store).await;
    let mut bad = plan(&v1, &v2);
    // Active to draft is not a lifecycle edge.
    bad.changes[0].after.status = RuleStatus::Draft;

    let err = store.commit_activation(&bad).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition(_)));
    let untouched = store.get_version(v2.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, RuleStatus::Draft);
}
