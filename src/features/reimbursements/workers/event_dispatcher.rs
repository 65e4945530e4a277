use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::core::error::Result;
use crate::features::access::AccessPolicy;
use crate::features::reimbursements::models::{DomainEvent, Reimbursement};
use crate::modules::audit::{AuditEntry, AuditRecorder};
use crate::modules::ledger::{bounded, LedgerStore};
use crate::modules::notifier::{Notifier, SubmissionNotice};
use crate::shared::constants::PERM_REIMBURSEMENT_APPROVE;

/// Name used when a referenced user or category no longer exists
const UNKNOWN_NAME: &str = "Unknown";

/// Background worker that consumes domain events.
///
/// Every event becomes one audit entry; submissions additionally notify every
/// user whose roles grant `reimbursement.approve`. Failures are logged and the
/// worker moves on, the originating operation has already succeeded.
pub struct EventDispatcher {
    ledger: Arc<dyn LedgerStore>,
    policy: Arc<AccessPolicy>,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditRecorder>,
    store_timeout: Duration,
}

impl EventDispatcher {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        policy: Arc<AccessPolicy>,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditRecorder>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            policy,
            notifier,
            audit,
            store_timeout,
        }
    }

    /// Bounded queue feeding the dispatcher
    pub fn channel(capacity: usize) -> (mpsc::Sender<DomainEvent>, mpsc::Receiver<DomainEvent>) {
        mpsc::channel(capacity)
    }

    /// Run until every sender has been dropped
    pub async fn run(self, mut events: mpsc::Receiver<DomainEvent>) {
        tracing::info!("Starting event dispatcher worker");

        while let Some(event) = events.recv().await {
            self.dispatch(&event).await;
        }

        tracing::info!("Event dispatcher stopped: queue closed");
    }

    pub async fn dispatch(&self, event: &DomainEvent) {
        let entry = AuditEntry::from_event(event);
        if let Err(e) = bounded(self.store_timeout, self.audit.record(&entry)).await {
            tracing::error!(
                "Failed to record audit entry '{}' for reimbursement {}: {:?}",
                entry.description,
                entry.subject_id,
                e
            );
        }

        if let DomainEvent::SubmissionCreated { reimbursement, .. } = event {
            if let Err(e) = self.notify_reviewers(reimbursement).await {
                tracing::error!(
                    "Failed to notify reviewers about reimbursement {}: {:?}",
                    reimbursement.id,
                    e
                );
            }
        }
    }

    async fn notify_reviewers(&self, reimbursement: &Reimbursement) -> Result<()> {
        let roles = self.policy.roles_granting(PERM_REIMBURSEMENT_APPROVE);
        let recipients = bounded(
            self.store_timeout,
            self.ledger.list_users_with_any_role(&roles),
        )
        .await?;

        if recipients.is_empty() {
            tracing::warn!(
                "No reviewers to notify about reimbursement {}",
                reimbursement.id
            );
            return Ok(());
        }

        let submitter_name = bounded(self.store_timeout, self.ledger.find_user(reimbursement.user_id))
            .await?
            .map(|u| u.name)
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());
        let category_name = bounded(
            self.store_timeout,
            self.ledger.find_category(reimbursement.category_id),
        )
        .await?
        .map(|c| c.name)
        .unwrap_or_else(|| UNKNOWN_NAME.to_string());

        let notice = SubmissionNotice {
            reimbursement: reimbursement.clone(),
            submitter_name,
            category_name,
        };

        self.notifier.notify(&notice, &recipients).await?;

        tracing::info!(
            "Notified {} reviewers about reimbursement {}",
            recipients.len(),
            reimbursement.id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::reimbursements::models::Decision;
    use crate::modules::ledger::MemoryLedger;
    use crate::shared::test_helpers::{
        category, init_test_tracing, pending_reimbursement, user, FailingAuditRecorder,
        RecordingAuditRecorder, RecordingNotifier,
    };

    async fn setup() -> (MemoryLedger, Reimbursement) {
        let ledger = MemoryLedger::new();
        let employee = user("Budi Santoso", &["employee"]);
        let cat = category("Transportasi", 1_000_000);
        ledger.seed_user(employee.clone()).await;
        ledger.seed_user(user("Sari Manager", &["manager"])).await;
        ledger.seed_user(user("Adi Admin", &["admin"])).await;
        ledger.seed_user(user("Citra Staff", &["employee"])).await;
        ledger.seed_category(cat.clone()).await;

        let record = pending_reimbursement(employee.id, cat.id, 1_000_000);
        ledger.seed_reimbursement(record.clone()).await;
        (ledger, record)
    }

    #[tokio::test]
    async fn test_submission_notifies_approvers_and_records_audit() {
        init_test_tracing();
        let (ledger, record) = setup().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let audit = Arc::new(RecordingAuditRecorder::default());
        let dispatcher = EventDispatcher::new(
            Arc::new(ledger),
            Arc::new(AccessPolicy::with_defaults()),
            notifier.clone(),
            audit.clone(),
            Duration::from_secs(1),
        );

        dispatcher
            .dispatch(&DomainEvent::SubmissionCreated {
                reimbursement: record.clone(),
                actor_id: record.user_id,
            })
            .await;

        let sent = notifier.sent().await;
        let mut recipients: Vec<String> = sent.iter().map(|(name, _)| name.clone()).collect();
        recipients.sort();
        assert_eq!(recipients, vec!["Adi Admin", "Sari Manager"]);
        assert!(sent[0].1.body.contains("made by Budi Santoso"));
        assert!(sent[0].1.body.contains("Rp 1.000.000"));
        assert!(sent[0].1.body.contains("Category: Transportasi"));

        let entries = audit.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description, "Reimbursement submission");
        assert_eq!(entries[0].subject_id, record.id);
    }

    #[tokio::test]
    async fn test_decision_only_records_audit() {
        let (ledger, record) = setup().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let audit = Arc::new(RecordingAuditRecorder::default());
        let dispatcher = EventDispatcher::new(
            Arc::new(ledger),
            Arc::new(AccessPolicy::with_defaults()),
            notifier.clone(),
            audit.clone(),
            Duration::from_secs(1),
        );

        dispatcher
            .dispatch(&DomainEvent::DecisionRecorded {
                reimbursement: record,
                decision: Decision::Approved,
                actor_id: uuid::Uuid::now_v7(),
            })
            .await;

        assert!(notifier.sent().await.is_empty());
        assert_eq!(audit.entries().await[0].description, "Reimbursement approved");
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_stop_notification() {
        let (ledger, record) = setup().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = EventDispatcher::new(
            Arc::new(ledger),
            Arc::new(AccessPolicy::with_defaults()),
            notifier.clone(),
            Arc::new(FailingAuditRecorder),
            Duration::from_secs(1),
        );

        dispatcher
            .dispatch(&DomainEvent::SubmissionCreated {
                reimbursement: record.clone(),
                actor_id: record.user_id,
            })
            .await;

        assert_eq!(notifier.sent().await.len(), 2);
    }

    #[tokio::test]
    async fn test_run_drains_queue_until_closed() {
        let (ledger, record) = setup().await;
        let audit = Arc::new(RecordingAuditRecorder::default());
        let dispatcher = EventDispatcher::new(
            Arc::new(ledger),
            Arc::new(AccessPolicy::with_defaults()),
            Arc::new(RecordingNotifier::default()),
            audit.clone(),
            Duration::from_secs(1),
        );

        let (tx, rx) = EventDispatcher::channel(8);
        let worker = tokio::spawn(dispatcher.run(rx));
        tx.send(DomainEvent::ReimbursementDeleted {
            reimbursement: record.clone(),
            actor_id: record.user_id,
            deleted_at: chrono::Utc::now(),
        })
        .await
        .unwrap();
        drop(tx);
        worker.await.unwrap();

        let entries = audit.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description, "Reimbursement deleted");
    }
}
