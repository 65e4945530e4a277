//! Ledger store: persistence for categories, users and reimbursements.
//!
//! Two backends implement the same traits: [`PgLedger`] on PostgreSQL and
//! [`MemoryLedger`] for tests and embedded use. Every reimbursement query
//! states its [`DeletedPolicy`](crate::features::reimbursements::models::DeletedPolicy)
//! through the filter it receives.

mod memory;
mod postgres;

pub use memory::MemoryLedger;
pub use postgres::PgLedger;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::categories::models::{Category, NewCategory};
use crate::features::reimbursements::models::{
    BudgetScope, DecideOutcome, DeletedPolicy, NewReimbursement, Reimbursement,
    ReimbursementFilter, ReimbursementStats, ReviewDecision,
};
use crate::features::users::models::User;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a unit of work. Dropping it without `commit` rolls it back.
    async fn begin(&self) -> Result<Box<dyn LedgerTx>>;

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>>;
    async fn list_categories(&self) -> Result<Vec<Category>>;
    /// Fails with `Conflict` when the name is taken
    async fn insert_category(&self, data: &NewCategory) -> Result<Category>;
    async fn update_category(&self, id: Uuid, data: &NewCategory) -> Result<Option<Category>>;
    /// Returns false when the category does not exist. Fails with `Conflict`
    /// while any reimbursement, soft-deleted or not, references it.
    async fn delete_category(&self, id: Uuid) -> Result<bool>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn list_users_with_any_role(&self, roles: &[String]) -> Result<Vec<User>>;
    /// Role to permission pairs as maintained by the admin collaborator
    async fn load_role_permissions(&self) -> Result<Vec<(String, String)>>;

    async fn find_reimbursement(
        &self,
        id: Uuid,
        deleted: DeletedPolicy,
    ) -> Result<Option<Reimbursement>>;
    /// Newest submission first
    async fn list_reimbursements(&self, filter: &ReimbursementFilter) -> Result<Vec<Reimbursement>>;
    /// Conditional transition out of `pending`
    async fn decide_reimbursement(
        &self,
        id: Uuid,
        decision: &ReviewDecision,
    ) -> Result<DecideOutcome>;
    async fn soft_delete_reimbursement(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Reimbursement>>;
    async fn reimbursement_stats(&self, filter: &ReimbursementFilter)
        -> Result<ReimbursementStats>;
}

/// Transactional unit of work used by the submission path
#[async_trait]
pub trait LedgerTx: Send {
    /// Serialize all work on the given budget scope until this unit ends
    async fn lock_budget_scope(&mut self, scope: &BudgetScope) -> Result<()>;
    async fn find_category(&mut self, id: Uuid) -> Result<Option<Category>>;
    async fn sum_amount(&mut self, filter: &ReimbursementFilter) -> Result<Decimal>;
    async fn insert_reimbursement(&mut self, data: &NewReimbursement) -> Result<Reimbursement>;
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Run a store call with an upper bound. Expiry surfaces as `Transient`.
pub async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut).await?
}
