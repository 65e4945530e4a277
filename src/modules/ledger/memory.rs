use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{LedgerStore, LedgerTx};
use crate::core::error::{AppError, Result};
use crate::features::categories::models::{Category, NewCategory};
use crate::features::reimbursements::models::{
    BudgetScope, DecideOutcome, DeletedPolicy, NewReimbursement, Reimbursement,
    ReimbursementFilter, ReimbursementStats, ReviewDecision,
};
use crate::features::users::models::User;

#[derive(Debug, Default)]
struct LedgerState {
    categories: HashMap<Uuid, Category>,
    users: HashMap<Uuid, User>,
    role_permissions: Vec<(String, String)>,
    reimbursements: Vec<Reimbursement>,
}

/// In-process ledger backed by a single async mutex.
///
/// A unit of work holds the mutex for its whole lifetime, so submissions are
/// fully serialized. Inserts are staged and only become visible on commit.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }

    pub async fn seed_category(&self, category: Category) {
        self.state
            .lock()
            .await
            .categories
            .insert(category.id, category);
    }

    pub async fn seed_reimbursement(&self, reimbursement: Reimbursement) {
        self.state.lock().await.reimbursements.push(reimbursement);
    }

    pub async fn seed_role_permissions(&self, pairs: Vec<(String, String)>) {
        self.state.lock().await.role_permissions = pairs;
    }
}

fn newest_first(mut records: Vec<Reimbursement>) -> Vec<Reimbursement> {
    records.sort_by(|a, b| {
        b.submitted_at
            .cmp(&a.submitted_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    records
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(MemoryLedgerTx {
            guard,
            staged: Vec::new(),
        }))
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>> {
        Ok(self.state.lock().await.categories.get(&id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let state = self.state.lock().await;
        let mut categories: Vec<Category> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn insert_category(&self, data: &NewCategory) -> Result<Category> {
        let mut state = self.state.lock().await;
        if state.categories.values().any(|c| c.name == data.name) {
            return Err(AppError::Conflict(format!(
                "Category '{}' already exists",
                data.name
            )));
        }

        let now = Utc::now();
        let category = Category {
            id: Uuid::now_v7(),
            name: data.name.clone(),
            limit_per_month: data.limit_per_month,
            created_at: now,
            updated_at: now,
        };
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: Uuid, data: &NewCategory) -> Result<Option<Category>> {
        let mut state = self.state.lock().await;
        if state
            .categories
            .values()
            .any(|c| c.id != id && c.name == data.name)
        {
            return Err(AppError::Conflict(format!(
                "Category '{}' already exists",
                data.name
            )));
        }

        Ok(state.categories.get_mut(&id).map(|category| {
            category.name = data.name.clone();
            category.limit_per_month = data.limit_per_month;
            category.updated_at = Utc::now();
            category.clone()
        }))
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().await;
        if !state.categories.contains_key(&id) {
            return Ok(false);
        }
        if state.reimbursements.iter().any(|r| r.category_id == id) {
            return Err(AppError::Conflict(
                "Category is still referenced by reimbursements".to_string(),
            ));
        }
        state.categories.remove(&id);
        Ok(true)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn list_users_with_any_role(&self, roles: &[String]) -> Result<Vec<User>> {
        let state = self.state.lock().await;
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| u.roles.iter().any(|r| roles.contains(r)))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn load_role_permissions(&self) -> Result<Vec<(String, String)>> {
        Ok(self.state.lock().await.role_permissions.clone())
    }

    async fn find_reimbursement(
        &self,
        id: Uuid,
        deleted: DeletedPolicy,
    ) -> Result<Option<Reimbursement>> {
        let state = self.state.lock().await;
        Ok(state
            .reimbursements
            .iter()
            .find(|r| r.id == id && deleted.admits(r.deleted_at))
            .cloned())
    }

    async fn list_reimbursements(&self, filter: &ReimbursementFilter) -> Result<Vec<Reimbursement>> {
        let state = self.state.lock().await;
        let records = state
            .reimbursements
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        Ok(newest_first(records))
    }

    async fn decide_reimbursement(
        &self,
        id: Uuid,
        decision: &ReviewDecision,
    ) -> Result<DecideOutcome> {
        let mut state = self.state.lock().await;
        let Some(record) = state
            .reimbursements
            .iter_mut()
            .find(|r| r.id == id && r.deleted_at.is_none())
        else {
            return Ok(DecideOutcome::Missing);
        };

        match record.apply_decision(decision) {
            Ok(()) => Ok(DecideOutcome::Decided(record.clone())),
            Err(AppError::InvalidStateTransition { .. }) => {
                Ok(DecideOutcome::NotPending(record.clone()))
            }
            Err(e) => Err(e),
        }
    }

    async fn soft_delete_reimbursement(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Reimbursement>> {
        let mut state = self.state.lock().await;
        Ok(state
            .reimbursements
            .iter_mut()
            .find(|r| r.id == id && r.deleted_at.is_none())
            .map(|record| {
                record.deleted_at = Some(at);
                record.updated_at = at;
                record.clone()
            }))
    }

    async fn reimbursement_stats(
        &self,
        filter: &ReimbursementFilter,
    ) -> Result<ReimbursementStats> {
        let state = self.state.lock().await;
        Ok(ReimbursementStats::accumulate(
            state.reimbursements.iter().filter(|r| filter.matches(r)),
        ))
    }
}

struct MemoryLedgerTx {
    guard: OwnedMutexGuard<LedgerState>,
    staged: Vec<Reimbursement>,
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn lock_budget_scope(&mut self, _scope: &BudgetScope) -> Result<()> {
        // The unit of work already owns the whole ledger
        Ok(())
    }

    async fn find_category(&mut self, id: Uuid) -> Result<Option<Category>> {
        Ok(self.guard.categories.get(&id).cloned())
    }

    async fn sum_amount(&mut self, filter: &ReimbursementFilter) -> Result<Decimal> {
        self.guard
            .reimbursements
            .iter()
            .chain(self.staged.iter())
            .filter(|r| filter.matches(r))
            .try_fold(Decimal::ZERO, |total, r| total.checked_add(r.amount))
            .ok_or_else(|| AppError::validation("amount", "total amount is out of range"))
    }

    async fn insert_reimbursement(&mut self, data: &NewReimbursement) -> Result<Reimbursement> {
        if !self.guard.categories.contains_key(&data.category_id) {
            return Err(AppError::Conflict(
                "Reimbursement references an unknown category".to_string(),
            ));
        }
        let record = Reimbursement::from_new(Uuid::now_v7(), data);
        self.staged.push(record.clone());
        Ok(record)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryLedgerTx { mut guard, staged } = *self;
        guard.reimbursements.extend(staged);
        Ok(())
    }
}
