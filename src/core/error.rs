use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::features::reimbursements::models::{BudgetCheck, ReimbursementStatus};
use crate::shared::types::ApiResponse;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Validation error on '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error(
        "Reimbursement exceeds monthly limit for this category (limit {}, used {}, remaining {})",
        .0.limit, .0.used, .0.remaining
    )]
    BudgetExceeded(BudgetCheck),

    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Cannot move reimbursement from {from} to {attempted}")]
    InvalidStateTransition {
        from: ReimbursementStatus,
        attempted: ReimbursementStatus,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        AppError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Whether the caller may retry the same operation later
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Transient(_))
    }

    /// HTTP-equivalent status for an outer transport layer
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation { .. } | AppError::BudgetExceeded(_) => 422,
            AppError::NotFound { .. } => 404,
            AppError::Forbidden(_) => 403,
            AppError::InvalidStateTransition { .. } | AppError::Conflict(_) => 409,
            AppError::Transient(_) => 503,
            AppError::Database(_) | AppError::Internal(_) => 500,
        }
    }

    /// Build the caller-facing envelope. Internal detail is logged, never returned.
    pub fn to_response(&self) -> ApiResponse<serde_json::Value> {
        match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                ApiResponse::error(Some("Database error occurred".to_string()), None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ApiResponse::error(Some("Internal server error".to_string()), None)
            }
            AppError::Validation { field, reason } => ApiResponse::error_with_data(
                Some("Validation Error".to_string()),
                json!({ "field": field, "reason": reason }),
                Some(vec![reason.clone()]),
            ),
            AppError::BudgetExceeded(check) => ApiResponse::error_with_data(
                Some("Reimbursement exceeds monthly limit for this category.".to_string()),
                json!({
                    "limit": check.limit,
                    "used": check.used,
                    "remaining": check.remaining,
                }),
                None,
            ),
            AppError::InvalidStateTransition { from, attempted } => ApiResponse::error_with_data(
                Some(self.to_string()),
                json!({ "from": from, "attempted": attempted }),
                None,
            ),
            AppError::NotFound { .. }
            | AppError::Forbidden(_)
            | AppError::Conflict(_)
            | AppError::Transient(_) => ApiResponse::error(Some(self.to_string()), None),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if matches!(
            e,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
        ) {
            return AppError::Transient(e.to_string());
        }

        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return AppError::Conflict("Data already exists".to_string());
            }
            if db.is_foreign_key_violation() {
                return AppError::Conflict("Data is still in use and cannot be deleted".to_string());
            }
            // 22003: numeric_value_out_of_range
            if db.is_check_violation() || db.code().as_deref() == Some("22003") {
                tracing::warn!("Rejected by database constraint: {}", db.message());
                return AppError::validation("request", "value is out of the allowed range");
            }
        }

        AppError::Database(e)
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        AppError::Transient("Store call timed out".to_string())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        match fields.first() {
            Some((field, field_errors)) => {
                let reason = field_errors
                    .first()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .unwrap_or_else(|| "invalid".to_string());
                AppError::validation(field.to_string(), reason)
            }
            None => AppError::validation("request", errors.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
