use chrono::{DateTime, Datelike, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Monthly budget figures for one (user, category) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetCheck {
    pub allowed: bool,
    pub limit: Decimal,
    pub used: Decimal,
    /// Clamped to zero for display
    pub remaining: Decimal,
}

impl BudgetCheck {
    /// A total that overflows `Decimal` is over any limit
    pub fn evaluate(limit: Decimal, used: Decimal, proposed: Decimal) -> Self {
        Self {
            allowed: used
                .checked_add(proposed)
                .is_some_and(|total| total <= limit),
            limit,
            used,
            remaining: limit
                .checked_sub(used)
                .unwrap_or(Decimal::ZERO)
                .max(Decimal::ZERO),
        }
    }
}

/// The unit serialized by the submission lock: one user, one category, one month
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BudgetScope {
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub year: i32,
    pub month: u32,
}

impl BudgetScope {
    pub fn new(user_id: Uuid, category_id: Uuid, as_of: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local = as_of.with_timezone(&offset);
        Self {
            user_id,
            category_id,
            year: local.year(),
            month: local.month(),
        }
    }

    /// Stable key used for advisory locking
    pub fn lock_key(&self) -> String {
        format!(
            "budget:{}:{}:{:04}-{:02}",
            self.user_id, self.category_id, self.year, self.month
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rp(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    #[test]
    fn test_evaluate_allows_exact_limit() {
        let check = BudgetCheck::evaluate(rp(1_000_000), rp(700_000), rp(300_000));
        assert!(check.allowed);
        assert_eq!(check.remaining, rp(300_000));
    }

    #[test]
    fn test_evaluate_rejects_over_limit() {
        let check = BudgetCheck::evaluate(rp(1_000_000), rp(700_000), rp(400_000));
        assert!(!check.allowed);
        assert_eq!(check.limit, rp(1_000_000));
        assert_eq!(check.used, rp(700_000));
        assert_eq!(check.remaining, rp(300_000));
    }

    #[test]
    fn test_remaining_never_negative() {
        // Limit lowered after spending
        let check = BudgetCheck::evaluate(rp(500_000), rp(700_000), rp(1));
        assert!(!check.allowed);
        assert_eq!(check.remaining, Decimal::ZERO);
    }

    #[test]
    fn test_zero_limit_rejects_everything_positive() {
        let check = BudgetCheck::evaluate(Decimal::ZERO, Decimal::ZERO, Decimal::new(1, 2));
        assert!(!check.allowed);
    }

    #[test]
    fn test_overflowing_total_is_not_allowed() {
        let check = BudgetCheck::evaluate(Decimal::MAX, Decimal::MAX, Decimal::MAX);
        assert!(!check.allowed);
        assert_eq!(check.remaining, Decimal::ZERO);
    }

    #[test]
    fn test_scope_uses_local_month() {
        let wib = FixedOffset::east_opt(7 * 3600).unwrap();
        // 2024-01-31 20:00 UTC is already February in WIB
        let at = Utc.with_ymd_and_hms(2024, 1, 31, 20, 0, 0).unwrap();
        let user = Uuid::now_v7();
        let category = Uuid::now_v7();

        let scope = BudgetScope::new(user, category, at, wib);
        assert_eq!((scope.year, scope.month), (2024, 2));
        assert!(scope.lock_key().ends_with(":2024-02"));

        let utc = FixedOffset::east_opt(0).unwrap();
        let scope = BudgetScope::new(user, category, at, utc);
        assert_eq!((scope.year, scope.month), (2024, 1));
    }
}
