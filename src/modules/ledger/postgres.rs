use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{LedgerStore, LedgerTx};
use crate::core::error::{AppError, Result};
use crate::features::categories::models::{Category, NewCategory};
use crate::features::reimbursements::models::{
    BudgetScope, DecideOutcome, DeletedPolicy, NewReimbursement, Reimbursement,
    ReimbursementFilter, ReimbursementStats, ReimbursementStatus, ReviewDecision,
};
use crate::features::users::models::User;

const REIMBURSEMENT_COLUMNS: &str = r#"
    id, user_id, category_id, title, description, amount, status, approval_reason,
    attachment_path, submitted_at, approved_at, reviewed_by, created_at, updated_at, deleted_at
"#;

const USER_SELECT: &str = r#"
    SELECT u.id, u.name, u.email, u.created_at,
           COALESCE(array_agg(r.name::TEXT ORDER BY r.name) FILTER (WHERE r.name IS NOT NULL), '{}'::TEXT[]) AS roles
    FROM users u
    LEFT JOIN user_roles ur ON ur.user_id = u.id
    LEFT JOIN roles r ON r.id = ur.role_id
"#;

/// Append the WHERE clause for a reimbursement filter
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ReimbursementFilter) {
    qb.push(" WHERE TRUE");

    match filter.deleted {
        DeletedPolicy::Exclude => {
            qb.push(" AND deleted_at IS NULL");
        }
        DeletedPolicy::Include => {}
    }

    if let Some(user_id) = filter.user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }

    if let Some(category_id) = filter.category_id {
        qb.push(" AND category_id = ").push_bind(category_id);
    }

    if let Some(statuses) = &filter.statuses {
        if statuses.is_empty() {
            qb.push(" AND FALSE");
        } else {
            qb.push(" AND status IN (");
            let mut separated = qb.separated(", ");
            for status in statuses {
                separated.push_bind(*status);
            }
            separated.push_unseparated(")");
        }
    }

    if let Some((from, to)) = filter.submitted_between {
        qb.push(" AND submitted_at >= ")
            .push_bind(from)
            .push(" AND submitted_at <= ")
            .push_bind(to);
    }
}

/// PostgreSQL ledger built on runtime-checked `sqlx` queries
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_category_with<'e, E>(executor: E, id: Uuid) -> Result<Option<Category>>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query_as::<_, Category>(
            "SELECT id, name, limit_per_month, created_at, updated_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch category {}: {:?}", id, e);
            AppError::from(e)
        })
    }
}

#[async_trait]
impl LedgerStore for PgLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        let tx = self.pool.begin().await.map_err(|e| {
            tracing::error!("Failed to begin transaction: {:?}", e);
            AppError::from(e)
        })?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>> {
        Self::find_category_with(&self.pool, id).await
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        sqlx::query_as::<_, Category>(
            "SELECT id, name, limit_per_month, created_at, updated_at FROM categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list categories: {:?}", e);
            AppError::from(e)
        })
    }

    async fn insert_category(&self, data: &NewCategory) -> Result<Category> {
        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (id, name, limit_per_month)
            VALUES ($1, $2, $3)
            RETURNING id, name, limit_per_month, created_at, updated_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&data.name)
        .bind(data.limit_per_month)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create category: {:?}", e);
            AppError::from(e)
        })
    }

    async fn update_category(&self, id: Uuid, data: &NewCategory) -> Result<Option<Category>> {
        sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
            SET name = $2, limit_per_month = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, limit_per_month, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(data.limit_per_month)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update category {}: {:?}", id, e);
            AppError::from(e)
        })
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool> {
        // ON DELETE RESTRICT on reimbursements.category_id turns a referenced
        // category into a foreign key violation, mapped to Conflict.
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete category {}: {:?}", id, e);
                AppError::from(e)
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let sql = format!("{} WHERE u.id = $1 GROUP BY u.id", USER_SELECT);
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch user {}: {:?}", id, e);
                AppError::from(e)
            })
    }

    async fn list_users_with_any_role(&self, roles: &[String]) -> Result<Vec<User>> {
        let sql = format!(
            r#"{}
            WHERE u.id IN (
                SELECT ur2.user_id FROM user_roles ur2
                JOIN roles r2 ON r2.id = ur2.role_id
                WHERE r2.name = ANY($1)
            )
            GROUP BY u.id
            ORDER BY u.name"#,
            USER_SELECT
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(roles)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list users by role: {:?}", e);
                AppError::from(e)
            })
    }

    async fn load_role_permissions(&self) -> Result<Vec<(String, String)>> {
        sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT r.name, p.name
            FROM role_has_permissions rp
            JOIN roles r ON r.id = rp.role_id
            JOIN permissions p ON p.id = rp.permission_id
            ORDER BY r.name, p.name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load role permissions: {:?}", e);
            AppError::from(e)
        })
    }

    async fn find_reimbursement(
        &self,
        id: Uuid,
        deleted: DeletedPolicy,
    ) -> Result<Option<Reimbursement>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(REIMBURSEMENT_COLUMNS).push(" FROM reimbursements");
        push_filter(&mut qb, &ReimbursementFilter::new(deleted));
        qb.push(" AND id = ").push_bind(id);

        qb.build_query_as::<Reimbursement>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch reimbursement {}: {:?}", id, e);
                AppError::from(e)
            })
    }

    async fn list_reimbursements(&self, filter: &ReimbursementFilter) -> Result<Vec<Reimbursement>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(REIMBURSEMENT_COLUMNS).push(" FROM reimbursements");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY submitted_at DESC, id DESC");

        qb.build_query_as::<Reimbursement>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list reimbursements: {:?}", e);
                AppError::from(e)
            })
    }

    async fn decide_reimbursement(
        &self,
        id: Uuid,
        decision: &ReviewDecision,
    ) -> Result<DecideOutcome> {
        let status = decision.decision.status();
        let approved_at = (status == ReimbursementStatus::Approved).then_some(decision.decided_at);

        let sql = format!(
            r#"
            UPDATE reimbursements
            SET status = $2, reviewed_by = $3, approval_reason = $4,
                approved_at = $5, updated_at = $6
            WHERE id = $1 AND status = 'pending' AND deleted_at IS NULL
            RETURNING {}
            "#,
            REIMBURSEMENT_COLUMNS
        );

        let decided = sqlx::query_as::<_, Reimbursement>(&sql)
            .bind(id)
            .bind(status)
            .bind(decision.reviewer_id)
            .bind(&decision.reason)
            .bind(approved_at)
            .bind(decision.decided_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to decide reimbursement {}: {:?}", id, e);
                AppError::from(e)
            })?;

        if let Some(record) = decided {
            return Ok(DecideOutcome::Decided(record));
        }

        // Guard did not match: tell an already decided record from a missing one
        Ok(
            match self.find_reimbursement(id, DeletedPolicy::Exclude).await? {
                Some(record) => DecideOutcome::NotPending(record),
                None => DecideOutcome::Missing,
            },
        )
    }

    async fn soft_delete_reimbursement(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Reimbursement>> {
        let sql = format!(
            r#"
            UPDATE reimbursements
            SET deleted_at = $2, updated_at = $2
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            REIMBURSEMENT_COLUMNS
        );

        sqlx::query_as::<_, Reimbursement>(&sql)
            .bind(id)
            .bind(at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to soft delete reimbursement {}: {:?}", id, e);
                AppError::from(e)
            })
    }

    async fn reimbursement_stats(
        &self,
        filter: &ReimbursementFilter,
    ) -> Result<ReimbursementStats> {
        let mut qb = QueryBuilder::<Postgres>::new(
            r#"
            SELECT
                COUNT(*) AS total_requests,
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'approved') AS approved,
                COUNT(*) FILTER (WHERE status = 'rejected') AS rejected,
                COALESCE(SUM(amount) FILTER (WHERE status = 'approved'), 0) AS total_amount
            FROM reimbursements
            "#,
        );
        push_filter(&mut qb, filter);

        qb.build_query_as::<ReimbursementStats>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to compute reimbursement stats: {:?}", e);
                AppError::from(e)
            })
    }
}

struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_budget_scope(&mut self, scope: &BudgetScope) -> Result<()> {
        // Released automatically at commit or rollback
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(scope.lock_key())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to lock budget scope {}: {:?}", scope.lock_key(), e);
                AppError::from(e)
            })?;
        Ok(())
    }

    async fn find_category(&mut self, id: Uuid) -> Result<Option<Category>> {
        PgLedger::find_category_with(&mut *self.tx, id).await
    }

    async fn sum_amount(&mut self, filter: &ReimbursementFilter) -> Result<Decimal> {
        let mut qb =
            QueryBuilder::<Postgres>::new("SELECT COALESCE(SUM(amount), 0) FROM reimbursements");
        push_filter(&mut qb, filter);

        qb.build_query_scalar::<Decimal>()
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to sum reimbursement amounts: {:?}", e);
                AppError::from(e)
            })
    }

    async fn insert_reimbursement(&mut self, data: &NewReimbursement) -> Result<Reimbursement> {
        let sql = format!(
            r#"
            INSERT INTO reimbursements
                (id, user_id, category_id, title, description, amount, status,
                 attachment_path, submitted_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8, $8, $8)
            RETURNING {}
            "#,
            REIMBURSEMENT_COLUMNS
        );

        sqlx::query_as::<_, Reimbursement>(&sql)
            .bind(Uuid::now_v7())
            .bind(data.user_id)
            .bind(data.category_id)
            .bind(&data.title)
            .bind(&data.description)
            .bind(data.amount)
            .bind(&data.attachment_path)
            .bind(data.submitted_at)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert reimbursement: {:?}", e);
                AppError::from(e)
            })
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit transaction: {:?}", e);
            AppError::from(e)
        })
    }
}
