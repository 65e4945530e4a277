use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::features::categories::models::{Category, NewCategory};
use crate::shared::validation::{validate_non_negative_amount, validate_not_blank};

/// Response DTO for category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResponseDto {
    pub id: Uuid,
    pub name: String,
    pub limit_per_month: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Category> for CategoryResponseDto {
    fn from(c: Category) -> Self {
        Self {
            id: c.id,
            name: c.name,
            limit_per_month: c.limit_per_month,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Request DTO for creating or updating a category
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpsertCategoryDto {
    #[validate(
        length(max = 125, message = "Name must not exceed 125 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: String,

    #[validate(custom(function = "validate_non_negative_amount"))]
    pub limit_per_month: Decimal,
}

impl UpsertCategoryDto {
    /// Copy with surrounding whitespace removed from the name
    pub fn normalized(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            limit_per_month: self.limit_per_month,
        }
    }
}

impl From<&UpsertCategoryDto> for NewCategory {
    fn from(dto: &UpsertCategoryDto) -> Self {
        Self {
            name: dto.name.clone(),
            limit_per_month: dto.limit_per_month,
        }
    }
}
