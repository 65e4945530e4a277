use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    /// Monthly cap shared across one user's submissions in this category
    pub limit_per_month: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data for creating or replacing a category
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub limit_per_month: Decimal,
}
