use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::reimbursements::models::{
    BudgetCheck, BudgetScope, DeletedPolicy, ReimbursementFilter, ReimbursementStatus,
};
use crate::modules::ledger::LedgerTx;

/// Statuses that consume a monthly budget
const COUNTED_STATUSES: [ReimbursementStatus; 2] =
    [ReimbursementStatus::Pending, ReimbursementStatus::Approved];

/// Computes monthly usage for a (user, category) pair and checks a proposed amount
#[derive(Debug, Clone)]
pub struct BudgetChecker {
    utc_offset: FixedOffset,
}

impl BudgetChecker {
    pub fn new(utc_offset: FixedOffset) -> Self {
        Self { utc_offset }
    }

    pub fn scope(&self, user_id: Uuid, category_id: Uuid, as_of: DateTime<Utc>) -> BudgetScope {
        BudgetScope::new(user_id, category_id, as_of, self.utc_offset)
    }

    /// Start of `as_of`'s calendar month in the configured offset, converted to UTC
    pub fn month_start(&self, as_of: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let local = as_of.with_timezone(&self.utc_offset);
        self.utc_offset
            .with_ymd_and_hms(local.year(), local.month(), 1, 0, 0, 0)
            .single()
            .map(|start| start.with_timezone(&Utc))
            .ok_or_else(|| {
                AppError::Internal(format!("Invalid month start for {}", as_of.to_rfc3339()))
            })
    }

    /// Read-only check. Run it inside the unit of work that performs the insert.
    pub async fn check(
        &self,
        tx: &mut dyn LedgerTx,
        user_id: Uuid,
        category_id: Uuid,
        proposed: Decimal,
        as_of: DateTime<Utc>,
    ) -> Result<BudgetCheck> {
        let category = tx
            .find_category(category_id)
            .await?
            .ok_or_else(|| AppError::not_found("Category", category_id))?;

        let filter = ReimbursementFilter::new(DeletedPolicy::Exclude)
            .submitted_by(user_id)
            .in_category(category_id)
            .with_statuses(&COUNTED_STATUSES)
            .submitted_between(self.month_start(as_of)?, as_of);

        let used = tx.sum_amount(&filter).await?;

        Ok(BudgetCheck::evaluate(category.limit_per_month, used, proposed))
    }
}
