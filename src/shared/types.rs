use serde::{Deserialize, Serialize};

/// Response envelope shared by every operation an outer layer exposes
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub meta: Option<Meta>,
    pub errors: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Meta {
    pub total: i64,
}

impl<T> ApiResponse<T> {
    pub fn error(message: Option<String>, errors: Option<Vec<String>>) -> Self {
        Self {
            success: false,
            data: None,
            message,
            meta: None,
            errors,
        }
    }

    /// Error carrying structured detail, e.g. the budget figures of a rejected submission
    pub fn error_with_data(message: Option<String>, data: T, errors: Option<Vec<String>>) -> Self {
        Self {
            success: false,
            data: Some(data),
            message,
            meta: None,
            errors,
        }
    }
}
