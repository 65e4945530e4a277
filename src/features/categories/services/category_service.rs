use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::features::access::{AccessPolicy, Action};
use crate::features::categories::dtos::{CategoryResponseDto, UpsertCategoryDto};
use crate::features::categories::models::NewCategory;
use crate::features::users::models::Actor;
use crate::modules::ledger::{bounded, LedgerStore};

/// Service for category operations
pub struct CategoryService {
    ledger: Arc<dyn LedgerStore>,
    policy: Arc<AccessPolicy>,
    store_timeout: Duration,
}

impl CategoryService {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        policy: Arc<AccessPolicy>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            policy,
            store_timeout,
        }
    }

    /// List all categories ordered by name
    pub async fn list(&self, actor: &Actor) -> Result<Vec<CategoryResponseDto>> {
        self.policy.authorize(actor, Action::ViewCategory, None)?;

        let categories = bounded(self.store_timeout, self.ledger.list_categories()).await?;
        Ok(categories.into_iter().map(Into::into).collect())
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<CategoryResponseDto> {
        self.policy.authorize(actor, Action::ViewCategory, None)?;

        bounded(self.store_timeout, self.ledger.find_category(id))
            .await?
            .map(Into::into)
            .ok_or_else(|| AppError::not_found("Category", id))
    }

    pub async fn create(&self, actor: &Actor, dto: UpsertCategoryDto) -> Result<CategoryResponseDto> {
        self.policy.authorize(actor, Action::CreateCategory, None)?;
        let dto = dto.normalized();
        dto.validate()?;

        let category = bounded(
            self.store_timeout,
            self.ledger.insert_category(&NewCategory::from(&dto)),
        )
        .await?;

        tracing::info!(
            "Category {} '{}' created by user {} (limit {})",
            category.id,
            category.name,
            actor.id,
            category.limit_per_month
        );
        Ok(category.into())
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        dto: UpsertCategoryDto,
    ) -> Result<CategoryResponseDto> {
        self.policy.authorize(actor, Action::UpdateCategory, None)?;
        let dto = dto.normalized();
        dto.validate()?;

        let category = bounded(
            self.store_timeout,
            self.ledger.update_category(id, &NewCategory::from(&dto)),
        )
        .await?
        .ok_or_else(|| AppError::not_found("Category", id))?;

        tracing::info!("Category {} updated by user {}", id, actor.id);
        Ok(category.into())
    }

    /// Hard delete. Fails with `Conflict` while any reimbursement references it.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
        self.policy.authorize(actor, Action::DeleteCategory, None)?;

        let deleted = bounded(self.store_timeout, self.ledger.delete_category(id))
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => AppError::Conflict(
                    "Category cannot be deleted because it is used by reimbursements".to_string(),
                ),
                other => other,
            })?;

        if !deleted {
            return Err(AppError::not_found("Category", id));
        }

        tracing::info!("Category {} deleted by user {}", id, actor.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::ledger::MemoryLedger;
    use crate::shared::constants::{ROLE_ADMIN, ROLE_EMPLOYEE, ROLE_MANAGER};
    use crate::shared::test_helpers::{category, pending_reimbursement, rupiah};
    use tokio_test::assert_ok;

    fn service(ledger: &MemoryLedger) -> CategoryService {
        CategoryService::new(
            Arc::new(ledger.clone()),
            Arc::new(AccessPolicy::with_defaults()),
            Duration::from_secs(1),
        )
    }

    fn dto(name: &str, limit: i64) -> UpsertCategoryDto {
        UpsertCategoryDto {
            name: name.to_string(),
            limit_per_month: rupiah(limit),
        }
    }

    #[tokio::test]
    async fn test_delete_referenced_category_conflicts() {
        let ledger = MemoryLedger::new();
        let used = category("Transportasi", 1_000_000);
        let unused = category("Konsumsi", 500_000);
        ledger.seed_category(used.clone()).await;
        ledger.seed_category(unused.clone()).await;
        ledger
            .seed_reimbursement(pending_reimbursement(Uuid::now_v7(), used.id, 10_000))
            .await;

        let service = service(&ledger);
        let admin = Actor::new(Uuid::now_v7(), [ROLE_ADMIN]);

        let err = service.delete(&admin, used.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(err.status_code(), 409);

        assert_ok!(service.delete(&admin, unused.id).await);
        let err = service.delete(&admin, unused.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_create_trims_and_rejects_duplicates() {
        let ledger = MemoryLedger::new();
        let service = service(&ledger);
        let admin = Actor::new(Uuid::now_v7(), [ROLE_ADMIN]);

        let created = service
            .create(&admin, dto("  Transportasi ", 1_000_000))
            .await
            .unwrap();
        assert_eq!(created.name, "Transportasi");

        let err = service
            .create(&admin, dto("Transportasi", 5))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = service.create(&admin, dto("   ", 5)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "name"));
    }

    #[tokio::test]
    async fn test_limit_must_fit_money_column() {
        let ledger = MemoryLedger::new();
        let service = service(&ledger);
        let admin = Actor::new(Uuid::now_v7(), [ROLE_ADMIN]);

        for limit in [rust_decimal::Decimal::MAX, rust_decimal::Decimal::new(5, 3)] {
            let err = service
                .create(
                    &admin,
                    UpsertCategoryDto {
                        name: "Akomodasi".to_string(),
                        limit_per_month: limit,
                    },
                )
                .await
                .unwrap_err();
            assert!(
                matches!(err, AppError::Validation { ref field, .. } if field == "limit_per_month")
            );
        }
        assert!(service.list(&admin).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_category() {
        let ledger = MemoryLedger::new();
        let existing = category("Transportasi", 1_000_000);
        ledger.seed_category(existing.clone()).await;
        let service = service(&ledger);
        let admin = Actor::new(Uuid::now_v7(), [ROLE_ADMIN]);

        let updated = service
            .update(&admin, existing.id, dto("Transport", 1_500_000))
            .await
            .unwrap();
        assert_eq!(updated.name, "Transport");
        assert_eq!(updated.limit_per_month, rupiah(1_500_000));

        let err = service
            .update(&admin, Uuid::now_v7(), dto("Lainnya", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_category_permissions() {
        let ledger = MemoryLedger::new();
        ledger.seed_category(category("Transportasi", 1_000_000)).await;
        let service = service(&ledger);
        let employee = Actor::new(Uuid::now_v7(), [ROLE_EMPLOYEE]);
        let manager = Actor::new(Uuid::now_v7(), [ROLE_MANAGER]);

        // Submitters and reviewers can read categories
        assert_eq!(service.list(&employee).await.unwrap().len(), 1);
        assert_eq!(service.list(&manager).await.unwrap().len(), 1);

        let err = service
            .create(&employee, dto("Konsumsi", 10))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = service
            .list(&Actor::new(Uuid::now_v7(), ["guest"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
