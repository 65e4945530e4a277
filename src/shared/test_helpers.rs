#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::core::config::{AttachmentConfig, WorkflowConfig};
use crate::core::error::{AppError, Result};
use crate::features::access::AccessPolicy;
use crate::features::categories::models::{Category, NewCategory};
use crate::features::reimbursements::models::{
    BudgetScope, DecideOutcome, DeletedPolicy, DomainEvent, NewReimbursement, Reimbursement,
    ReimbursementFilter, ReimbursementStats, ReviewDecision,
};
use crate::features::reimbursements::ReimbursementService;
use crate::features::users::models::{Actor, User};
use crate::modules::audit::{AuditEntry, AuditRecorder};
use crate::modules::ledger::{LedgerStore, LedgerTx, MemoryLedger};
use crate::modules::notifier::{NotificationMessage, Notifier, SubmissionNotice};
use crate::modules::storage::MemoryFileStorage;
use crate::shared::constants::{ROLE_ADMIN, ROLE_EMPLOYEE, ROLE_MANAGER};

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    });
}

/// Whole Rupiah amount
pub fn rupiah(value: i64) -> Decimal {
    Decimal::new(value, 0)
}

pub fn user(name: &str, roles: &[&str]) -> User {
    User {
        id: Uuid::now_v7(),
        name: name.to_string(),
        email: SafeEmail().fake(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        created_at: Utc::now(),
    }
}

/// User with a generated name
pub fn fake_user(roles: &[&str]) -> User {
    let name: String = Name().fake();
    user(&name, roles)
}

pub fn category(name: &str, limit_per_month: i64) -> Category {
    let now = Utc::now();
    Category {
        id: Uuid::now_v7(),
        name: name.to_string(),
        limit_per_month: rupiah(limit_per_month),
        created_at: now,
        updated_at: now,
    }
}

pub fn pending_reimbursement(user_id: Uuid, category_id: Uuid, amount: i64) -> Reimbursement {
    Reimbursement::from_new(
        Uuid::now_v7(),
        &NewReimbursement {
            user_id,
            category_id,
            title: "Perjalanan dinas".to_string(),
            description: Some("Tiket dan taksi".to_string()),
            amount: rupiah(amount),
            attachment_path: None,
            submitted_at: Utc::now(),
        },
    )
}

/// Notifier double that keeps every rendered message, keyed by recipient name
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, NotificationMessage)>>,
}

impl RecordingNotifier {
    pub async fn sent(&self) -> Vec<(String, NotificationMessage)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notice: &SubmissionNotice, recipients: &[User]) -> Result<()> {
        let mut sent = self.sent.lock().await;
        for recipient in recipients {
            sent.push((recipient.name.clone(), notice.render_for(recipient)?));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAuditRecorder {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAuditRecorder {
    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl AuditRecorder for RecordingAuditRecorder {
    async fn record(&self, entry: &AuditEntry) -> Result<()> {
        self.entries.lock().await.push(entry.clone());
        Ok(())
    }
}

pub struct FailingAuditRecorder;

#[async_trait]
impl AuditRecorder for FailingAuditRecorder {
    async fn record(&self, _entry: &AuditEntry) -> Result<()> {
        Err(AppError::Transient("activity log unavailable".to_string()))
    }
}

/// Memory ledger whose units of work stall for `delay` before committing
#[derive(Clone)]
pub struct SlowCommitLedger {
    pub inner: MemoryLedger,
    pub delay: Duration,
}

struct SlowCommitTx {
    inner: Box<dyn LedgerTx>,
    delay: Duration,
}

#[async_trait]
impl LedgerTx for SlowCommitTx {
    async fn lock_budget_scope(&mut self, scope: &BudgetScope) -> Result<()> {
        self.inner.lock_budget_scope(scope).await
    }

    async fn find_category(&mut self, id: Uuid) -> Result<Option<Category>> {
        self.inner.find_category(id).await
    }

    async fn sum_amount(&mut self, filter: &ReimbursementFilter) -> Result<Decimal> {
        self.inner.sum_amount(filter).await
    }

    async fn insert_reimbursement(&mut self, data: &NewReimbursement) -> Result<Reimbursement> {
        self.inner.insert_reimbursement(data).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.commit().await
    }
}

#[async_trait]
impl LedgerStore for SlowCommitLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        Ok(Box::new(SlowCommitTx {
            inner: self.inner.begin().await?,
            delay: self.delay,
        }))
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>> {
        self.inner.find_category(id).await
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        self.inner.list_categories().await
    }

    async fn insert_category(&self, data: &NewCategory) -> Result<Category> {
        self.inner.insert_category(data).await
    }

    async fn update_category(&self, id: Uuid, data: &NewCategory) -> Result<Option<Category>> {
        self.inner.update_category(id, data).await
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool> {
        self.inner.delete_category(id).await
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        self.inner.find_user(id).await
    }

    async fn list_users_with_any_role(&self, roles: &[String]) -> Result<Vec<User>> {
        self.inner.list_users_with_any_role(roles).await
    }

    async fn load_role_permissions(&self) -> Result<Vec<(String, String)>> {
        self.inner.load_role_permissions().await
    }

    async fn find_reimbursement(
        &self,
        id: Uuid,
        deleted: DeletedPolicy,
    ) -> Result<Option<Reimbursement>> {
        self.inner.find_reimbursement(id, deleted).await
    }

    async fn list_reimbursements(&self, filter: &ReimbursementFilter) -> Result<Vec<Reimbursement>> {
        self.inner.list_reimbursements(filter).await
    }

    async fn decide_reimbursement(
        &self,
        id: Uuid,
        decision: &ReviewDecision,
    ) -> Result<DecideOutcome> {
        self.inner.decide_reimbursement(id, decision).await
    }

    async fn soft_delete_reimbursement(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Reimbursement>> {
        self.inner.soft_delete_reimbursement(id, at).await
    }

    async fn reimbursement_stats(
        &self,
        filter: &ReimbursementFilter,
    ) -> Result<ReimbursementStats> {
        self.inner.reimbursement_stats(filter).await
    }
}

/// A memory-backed workflow with one user per default role and a
/// "Transportasi" category limited to 1.000.000 per month
pub struct TestWorld {
    pub ledger: MemoryLedger,
    pub storage: MemoryFileStorage,
    pub service: ReimbursementService,
    pub events: mpsc::Receiver<DomainEvent>,
    pub admin: Actor,
    pub manager: Actor,
    pub employee: Actor,
    pub other_employee: Actor,
    pub transport: Category,
}

impl TestWorld {
    pub async fn new() -> Self {
        Self::with_capacity(64).await
    }

    pub async fn with_capacity(event_capacity: usize) -> Self {
        init_test_tracing();

        let ledger = MemoryLedger::new();
        let storage = MemoryFileStorage::new();

        let admin = user("Adi Admin", &[ROLE_ADMIN]);
        let manager = user("Sari Manager", &[ROLE_MANAGER]);
        let employee = user("Budi Santoso", &[ROLE_EMPLOYEE]);
        let other_employee = fake_user(&[ROLE_EMPLOYEE]);
        for u in [&admin, &manager, &employee, &other_employee] {
            ledger.seed_user(u.clone()).await;
        }

        let transport = category("Transportasi", 1_000_000);
        ledger.seed_category(transport.clone()).await;

        let (tx, events) = mpsc::channel(event_capacity);
        let service = ReimbursementService::new(
            Arc::new(ledger.clone()),
            Arc::new(AccessPolicy::with_defaults()),
            Arc::new(storage.clone()),
            tx,
            WorkflowConfig::default(),
            AttachmentConfig::default(),
        );

        Self {
            ledger,
            storage,
            service,
            events,
            admin: Actor::from(&admin),
            manager: Actor::from(&manager),
            employee: Actor::from(&employee),
            other_employee: Actor::from(&other_employee),
            transport,
        }
    }

    /// Every event queued so far
    pub fn drain_events(&mut self) -> Vec<DomainEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
