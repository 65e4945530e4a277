use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::features::reimbursements::models::{
    BudgetCheck, Decision, Reimbursement, ReimbursementStats, ReimbursementStatus,
};
use crate::shared::validation::{validate_not_blank, validate_positive_amount};

/// Request DTO for submitting a reimbursement
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitReimbursementDto {
    pub category_id: Uuid,

    #[validate(
        length(max = 255, message = "Title must not exceed 255 characters"),
        custom(function = "validate_not_blank")
    )]
    pub title: String,

    pub description: Option<String>,

    #[validate(custom(function = "validate_positive_amount"))]
    pub amount: Decimal,
}

/// An uploaded attachment, before it is handed to file storage
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Request DTO for approving or rejecting a reimbursement
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DecideReimbursementDto {
    pub status: Decision,

    #[validate(length(max = 1000, message = "Reason must not exceed 1000 characters"))]
    pub approval_reason: Option<String>,
}

/// Response DTO for reimbursement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReimbursementResponseDto {
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

impl From<Reimbursement> for ReimbursementResponseDto {
    fn from(r: Reimbursement) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            category_id: r.category_id,
            title: r.title,
            description: r.description,
            amount: r.amount,
            status: r.status,
            approval_reason: r.approval_reason,
            attachment_path: r.attachment_path,
            submitted_at: r.submitted_at,
            approved_at: r.approved_at,
            reviewed_by: r.reviewed_by,
            created_at: r.created_at,
            updated_at: r.updated_at,
            deleted_at: r.deleted_at,
        }
    }
}

/// Dashboard metrics over the caller's scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReimbursementMetricsDto {
    pub total_requests: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub total_amount: Decimal,
}

impl From<ReimbursementStats> for ReimbursementMetricsDto {
    fn from(s: ReimbursementStats) -> Self {
        Self {
            total_requests: s.total_requests,
            pending: s.pending,
            approved: s.approved,
            rejected: s.rejected,
            total_amount: s.total_amount,
        }
    }
}

/// Current month budget for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatusDto {
    pub category_id: Uuid,
    pub limit: Decimal,
    pub used: Decimal,
    pub remaining: Decimal,
}

impl BudgetStatusDto {
    pub fn new(category_id: Uuid, check: BudgetCheck) -> Self {
        Self {
            category_id,
            limit: check.limit,
            used: check.used,
            remaining: check.remaining,
        }
    }
}
