use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use crate::core::error::{AppError, Result};

/// Reimbursement status enum matching database enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "reimbursement_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReimbursementStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReimbursementStatus {
    /// Approved and rejected records never change status again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReimbursementStatus::Pending)
    }
}

impl std::fmt::Display for ReimbursementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReimbursementStatus::Pending => write!(f, "pending"),
            ReimbursementStatus::Approved => write!(f, "approved"),
            ReimbursementStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Outcome a reviewer can record on a pending reimbursement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn status(&self) -> ReimbursementStatus {
        match self {
            Decision::Approved => ReimbursementStatus::Approved,
            Decision::Rejected => ReimbursementStatus::Rejected,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.status().fmt(f)
    }
}

/// Database model for reimbursement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Reimbursement {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub status: ReimbursementStatus,
    pub approval_reason: Option<String>,
    pub attachment_path: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Reimbursement {
    /// Build the pending record persisted by a successful submission
    pub fn from_new(id: Uuid, data: &NewReimbursement) -> Self {
        Self {
            id,
            user_id: data.user_id,
            category_id: data.category_id,
            title: data.title.clone(),
            description: data.description.clone(),
            amount: data.amount,
            status: ReimbursementStatus::Pending,
            approval_reason: None,
            attachment_path: data.attachment_path.clone(),
            submitted_at: data.submitted_at,
            approved_at: None,
            reviewed_by: None,
            created_at: data.submitted_at,
            updated_at: data.submitted_at,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// Record a reviewer decision. Only a pending record accepts one.
    ///
    /// `approved_at` is stamped on the approved path only; a rejection keeps it
    /// empty and the decision time lives in `updated_at`.
    pub fn apply_decision(&mut self, decision: &ReviewDecision) -> Result<()> {
        if self.status != ReimbursementStatus::Pending {
            return Err(AppError::InvalidStateTransition {
                from: self.status,
                attempted: decision.decision.status(),
            });
        }

        self.status = decision.decision.status();
        self.reviewed_by = Some(decision.reviewer_id);
        self.approval_reason = Some(decision.reason.clone());
        if decision.decision == Decision::Approved {
            self.approved_at = Some(decision.decided_at);
        }
        self.updated_at = decision.decided_at;
        Ok(())
    }
}

/// Data for creating a new reimbursement
#[derive(Debug, Clone)]
pub struct NewReimbursement {
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub attachment_path: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// A reviewer's verdict on a pending reimbursement
#[derive(Debug, Clone)]
pub struct ReviewDecision {
    pub reviewer_id: Uuid,
    pub decision: Decision,
    /// Empty when the reviewer gave no reason
    pub reason: String,
    pub decided_at: DateTime<Utc>,
}

/// Result of a conditional decide update
#[derive(Debug, Clone)]
pub enum DecideOutcome {
    Decided(Reimbursement),
    /// The record exists but had already left `pending`
    NotPending(Reimbursement),
    Missing,
}

/// How a query treats soft-deleted rows. Every reimbursement query states one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletedPolicy {
    Exclude,
    Include,
}

impl DeletedPolicy {
    pub fn admits(&self, deleted_at: Option<DateTime<Utc>>) -> bool {
        match self {
            DeletedPolicy::Exclude => deleted_at.is_none(),
            DeletedPolicy::Include => true,
        }
    }
}

/// Filter predicate for reimbursement queries
#[derive(Debug, Clone)]
pub struct ReimbursementFilter {
    pub deleted: DeletedPolicy,
    pub user_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub statuses: Option<Vec<ReimbursementStatus>>,
    /// Inclusive range on `submitted_at`
    pub submitted_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl ReimbursementFilter {
    pub fn new(deleted: DeletedPolicy) -> Self {
        Self {
            deleted,
            user_id: None,
            category_id: None,
            statuses: None,
            submitted_between: None,
        }
    }

    pub fn submitted_by(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn in_category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_statuses(mut self, statuses: &[ReimbursementStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    pub fn submitted_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.submitted_between = Some((from, to));
        self
    }

    pub fn matches(&self, r: &Reimbursement) -> bool {
        self.deleted.admits(r.deleted_at)
            && self.user_id.map_or(true, |id| r.user_id == id)
            && self.category_id.map_or(true, |id| r.category_id == id)
            && self
                .statuses
                .as_ref()
                .map_or(true, |statuses| statuses.contains(&r.status))
            && self
                .submitted_between
                .map_or(true, |(from, to)| r.submitted_at >= from && r.submitted_at <= to)
    }
}

/// Aggregated counts over a set of reimbursements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ReimbursementStats {
    pub total_requests: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    /// Sum of `amount` over approved records only
    pub total_amount: Decimal,
}

impl ReimbursementStats {
    pub fn accumulate<'a>(records: impl IntoIterator<Item = &'a Reimbursement>) -> Self {
        records.into_iter().fold(Self::default(), |mut stats, r| {
            stats.total_requests += 1;
            match r.status {
                ReimbursementStatus::Pending => stats.pending += 1,
                ReimbursementStatus::Approved => {
                    stats.approved += 1;
                    stats.total_amount += r.amount;
                }
                ReimbursementStatus::Rejected => stats.rejected += 1,
            }
            stats
        })
    }
}
