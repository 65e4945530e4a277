use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;
use validator::Validate;

use crate::core::config::{AttachmentConfig, WorkflowConfig};
use crate::core::error::{AppError, Result};
use crate::features::access::{AccessPolicy, Action, ViewScope};
use crate::features::reimbursements::dtos::{
    AttachmentUpload, BudgetStatusDto, DecideReimbursementDto, ReimbursementMetricsDto,
    ReimbursementResponseDto, SubmitReimbursementDto,
};
use crate::features::reimbursements::models::{
    DecideOutcome, DeletedPolicy, DomainEvent, NewReimbursement, Reimbursement,
    ReimbursementFilter, ReviewDecision,
};
use crate::features::reimbursements::services::BudgetChecker;
use crate::features::users::models::Actor;
use crate::modules::ledger::{bounded, LedgerStore};
use crate::modules::storage::FileStorage;

/// Reimbursement workflow: submission, review decisions, visibility and metrics.
///
/// Every operation takes the acting user explicitly and checks the access
/// policy before touching the ledger. Side effects (notification, audit) are
/// queued as [`DomainEvent`]s after the state change has committed.
pub struct ReimbursementService {
    ledger: Arc<dyn LedgerStore>,
    policy: Arc<AccessPolicy>,
    storage: Arc<dyn FileStorage>,
    events: mpsc::Sender<DomainEvent>,
    budget: BudgetChecker,
    workflow: WorkflowConfig,
    attachments: AttachmentConfig,
}

impl ReimbursementService {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        policy: Arc<AccessPolicy>,
        storage: Arc<dyn FileStorage>,
        events: mpsc::Sender<DomainEvent>,
        workflow: WorkflowConfig,
        attachments: AttachmentConfig,
    ) -> Self {
        Self {
            ledger,
            policy,
            storage,
            events,
            budget: BudgetChecker::new(workflow.budget_utc_offset),
            workflow,
            attachments,
        }
    }

    /// Submit a new reimbursement for the acting user.
    ///
    /// The budget check and the insert share one unit of work holding the
    /// (user, category, month) lock, so concurrent submissions cannot jointly
    /// exceed the monthly limit. The attachment is stored before the lock is
    /// taken and removed again if the submission does not commit.
    pub async fn submit(
        &self,
        actor: &Actor,
        dto: SubmitReimbursementDto,
        attachment: Option<AttachmentUpload>,
    ) -> Result<ReimbursementResponseDto> {
        self.policy
            .authorize(actor, Action::SubmitReimbursement, None)?;
        dto.validate()?;
        if let Some(file) = &attachment {
            self.validate_attachment(file)?;
        }

        let limit = self.workflow.store_timeout;
        let attachment_path = match &attachment {
            Some(file) => Some(
                bounded(limit, self.storage.store(&file.bytes, &file.content_type)).await?,
            ),
            None => None,
        };

        let data = NewReimbursement {
            user_id: actor.id,
            category_id: dto.category_id,
            title: dto.title.trim().to_string(),
            description: dto
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            amount: dto.amount,
            attachment_path,
            submitted_at: Utc::now(),
        };

        let reimbursement = match self.record_submission(data.clone()).await {
            Ok(reimbursement) => reimbursement,
            Err(e) => {
                if let Some(path) = &data.attachment_path {
                    self.discard_attachment(path).await;
                }
                return Err(e);
            }
        };

        tracing::info!(
            "Reimbursement {} submitted by user {} ({} in category {})",
            reimbursement.id,
            actor.id,
            reimbursement.amount,
            reimbursement.category_id
        );

        self.emit(DomainEvent::SubmissionCreated {
            reimbursement: reimbursement.clone(),
            actor_id: actor.id,
        });

        Ok(reimbursement.into())
    }

    /// Budget check and insert under the scope lock, committed as one unit
    async fn record_submission(&self, mut data: NewReimbursement) -> Result<Reimbursement> {
        let limit = self.workflow.store_timeout;
        let mut tx = bounded(limit, self.ledger.begin()).await?;

        let locked = self.budget.scope(data.user_id, data.category_id, Utc::now());
        bounded(limit, tx.lock_budget_scope(&locked)).await?;

        // Read the clock after the lock so earlier committed submissions fall inside the window
        data.submitted_at = Utc::now();
        let current = self.budget.scope(data.user_id, data.category_id, data.submitted_at);
        if current != locked {
            bounded(limit, tx.lock_budget_scope(&current)).await?;
        }

        let check = bounded(
            limit,
            self.budget.check(
                tx.as_mut(),
                data.user_id,
                data.category_id,
                data.amount,
                data.submitted_at,
            ),
        )
        .await?;

        if !check.allowed {
            tracing::info!(
                "Rejected submission from user {} in category {}: limit {}, used {}, amount {}",
                data.user_id,
                data.category_id,
                check.limit,
                check.used,
                data.amount
            );
            return Err(AppError::BudgetExceeded(check));
        }

        let reimbursement = bounded(limit, tx.insert_reimbursement(&data)).await?;
        bounded(limit, tx.commit()).await?;
        Ok(reimbursement)
    }

    async fn discard_attachment(&self, path: &str) {
        if let Err(e) = bounded(self.workflow.store_timeout, self.storage.delete(path)).await {
            tracing::error!("Failed to remove orphaned attachment {}: {:?}", path, e);
        }
    }

    /// Approve or reject a pending reimbursement.
    ///
    /// The transition is a conditional update on `status = 'pending'`; of two
    /// concurrent decisions exactly one succeeds.
    pub async fn decide(
        &self,
        actor: &Actor,
        id: Uuid,
        dto: DecideReimbursementDto,
    ) -> Result<ReimbursementResponseDto> {
        self.policy
            .authorize(actor, Action::DecideReimbursement, None)?;
        dto.validate()?;

        let decision = ReviewDecision {
            reviewer_id: actor.id,
            decision: dto.status,
            reason: dto
                .approval_reason
                .map(|r| r.trim().to_string())
                .unwrap_or_default(),
            decided_at: Utc::now(),
        };

        let outcome = bounded(
            self.workflow.store_timeout,
            self.ledger.decide_reimbursement(id, &decision),
        )
        .await?;

        match outcome {
            DecideOutcome::Decided(reimbursement) => {
                tracing::info!(
                    "Reimbursement {} {} by user {}",
                    reimbursement.id,
                    dto.status,
                    actor.id
                );
                self.emit(DomainEvent::DecisionRecorded {
                    reimbursement: reimbursement.clone(),
                    decision: dto.status,
                    actor_id: actor.id,
                });
                Ok(reimbursement.into())
            }
            DecideOutcome::NotPending(reimbursement) => Err(AppError::InvalidStateTransition {
                from: reimbursement.status,
                attempted: dto.status.status(),
            }),
            DecideOutcome::Missing => Err(AppError::not_found("Reimbursement", id)),
        }
    }

    /// List reimbursements visible to the actor, newest first.
    ///
    /// Soft-deleted records are included only when requested by a caller
    /// allowed to see them; otherwise the flag is ignored.
    pub async fn list(
        &self,
        actor: &Actor,
        include_deleted: bool,
    ) -> Result<Vec<ReimbursementResponseDto>> {
        let filter = self.scoped_filter(actor, Action::ListReimbursements, include_deleted)?;

        let records = bounded(
            self.workflow.store_timeout,
            self.ledger.list_reimbursements(&filter),
        )
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<ReimbursementResponseDto> {
        self.policy
            .authorize(actor, Action::ViewReimbursement, None)?;

        let deleted = if self
            .policy
            .can(actor, Action::ViewTrashedReimbursements, None)
        {
            DeletedPolicy::Include
        } else {
            DeletedPolicy::Exclude
        };

        let reimbursement = bounded(
            self.workflow.store_timeout,
            self.ledger.find_reimbursement(id, deleted),
        )
        .await?
        .ok_or_else(|| AppError::not_found("Reimbursement", id))?;

        self.policy
            .authorize(actor, Action::ViewReimbursement, Some(&reimbursement))?;

        Ok(reimbursement.into())
    }

    /// Soft delete. Callers without global view may only delete their own records.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
        self.policy
            .authorize(actor, Action::DeleteReimbursement, None)?;

        let limit = self.workflow.store_timeout;
        let reimbursement = bounded(
            limit,
            self.ledger.find_reimbursement(id, DeletedPolicy::Exclude),
        )
        .await?
        .ok_or_else(|| AppError::not_found("Reimbursement", id))?;

        self.policy
            .authorize(actor, Action::DeleteReimbursement, Some(&reimbursement))?;

        let deleted_at = Utc::now();
        let reimbursement = bounded(limit, self.ledger.soft_delete_reimbursement(id, deleted_at))
            .await?
            .ok_or_else(|| AppError::not_found("Reimbursement", id))?;

        tracing::info!("Reimbursement {} deleted by user {}", id, actor.id);

        self.emit(DomainEvent::ReimbursementDeleted {
            reimbursement,
            actor_id: actor.id,
            deleted_at,
        });

        Ok(())
    }

    /// Counts and approved total over the actor's scope. Soft-deleted records never count.
    pub async fn metrics(&self, actor: &Actor) -> Result<ReimbursementMetricsDto> {
        let filter = self.scoped_filter(actor, Action::ViewMetrics, false)?;

        let stats = bounded(
            self.workflow.store_timeout,
            self.ledger.reimbursement_stats(&filter),
        )
        .await?;

        Ok(stats.into())
    }

    /// The actor's usage of a category's monthly limit so far
    pub async fn budget_status(&self, actor: &Actor, category_id: Uuid) -> Result<BudgetStatusDto> {
        self.policy
            .authorize(actor, Action::SubmitReimbursement, None)?;

        let limit = self.workflow.store_timeout;
        let mut tx = bounded(limit, self.ledger.begin()).await?;
        let check = bounded(
            limit,
            self.budget.check(
                tx.as_mut(),
                actor.id,
                category_id,
                rust_decimal::Decimal::ZERO,
                Utc::now(),
            ),
        )
        .await?;

        Ok(BudgetStatusDto::new(category_id, check))
    }

    fn scoped_filter(
        &self,
        actor: &Actor,
        action: Action,
        include_deleted: bool,
    ) -> Result<ReimbursementFilter> {
        self.policy.authorize(actor, action, None)?;

        let deleted = if include_deleted
            && self
                .policy
                .can(actor, Action::ViewTrashedReimbursements, None)
        {
            DeletedPolicy::Include
        } else {
            DeletedPolicy::Exclude
        };

        let filter = ReimbursementFilter::new(deleted);
        Ok(match self.policy.view_scope(actor) {
            Some(ViewScope::Own(user_id)) => filter.submitted_by(user_id),
            _ => filter,
        })
    }

    fn validate_attachment(&self, file: &AttachmentUpload) -> Result<()> {
        if !self.attachments.is_type_allowed(&file.content_type) {
            return Err(AppError::validation(
                "attachment",
                format!(
                    "The attachment must be a file of type: {}",
                    self.attachments.allowed_types.join(", ")
                ),
            ));
        }

        if file.bytes.len() > self.attachments.max_bytes {
            return Err(AppError::validation(
                "attachment",
                format!(
                    "The attachment must not be greater than {} kilobytes",
                    self.attachments.max_bytes / 1024
                ),
            ));
        }

        Ok(())
    }

    /// Queue a domain event without blocking. A full or closed queue is logged.
    fn emit(&self, event: DomainEvent) {
        let reimbursement_id = event.reimbursement().id;
        if let Err(e) = self.events.try_send(event) {
            tracing::error!(
                "Failed to queue {} event for reimbursement {}: {}",
                match &e {
                    mpsc::error::TrySendError::Full(event)
                    | mpsc::error::TrySendError::Closed(event) => event.action(),
                },
                reimbursement_id,
                e
            );
        }
    }
}
