//! Audit recorder collaborator: append-only activity log entries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::reimbursements::models::DomainEvent;

const DEFAULT_LOG_NAME: &str = "default";
const REIMBURSEMENT_SUBJECT: &str = "reimbursement";

/// One immutable activity log entry
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub log_name: String,
    pub description: String,
    pub subject_type: String,
    pub subject_id: Uuid,
    pub causer_id: Uuid,
    pub properties: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn from_event(event: &DomainEvent) -> Self {
        let mut properties = json!({ "action": event.action() });
        if let DomainEvent::DecisionRecorded { reimbursement, .. } = event {
            if let Some(reason) = reimbursement.approval_reason.as_deref() {
                properties["approval_reason"] = json!(reason);
            }
        }

        Self {
            log_name: DEFAULT_LOG_NAME.to_string(),
            description: event.description().to_string(),
            subject_type: REIMBURSEMENT_SUBJECT.to_string(),
            subject_id: event.reimbursement().id,
            causer_id: event.actor_id(),
            properties,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait AuditRecorder: Send + Sync {
    async fn record(&self, entry: &AuditEntry) -> Result<()>;
}

/// Appends entries to the `activity_log` table
#[derive(Clone)]
pub struct PgAuditRecorder {
    pool: PgPool,
}

impl PgAuditRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRecorder for PgAuditRecorder {
    async fn record(&self, entry: &AuditEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO activity_log
                (id, log_name, description, subject_type, subject_id, causer_id, properties, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&entry.log_name)
        .bind(&entry.description)
        .bind(&entry.subject_type)
        .bind(entry.subject_id)
        .bind(entry.causer_id)
        .bind(&entry.properties)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to record activity log entry: {:?}", e);
            AppError::from(e)
        })?;

        Ok(())
    }
}
