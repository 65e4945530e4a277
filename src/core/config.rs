use std::env;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub workflow: WorkflowConfig,
    pub attachments: AttachmentConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

/// Settings for the reimbursement workflow
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Upper bound for a single store call
    pub store_timeout: Duration,
    /// Offset used to decide which calendar month a submission falls in
    pub budget_utc_offset: FixedOffset,
    /// Capacity of the domain event queue feeding the notifier and audit recorder
    pub event_queue_capacity: usize,
}

/// Limits for reimbursement attachments
#[derive(Debug, Clone)]
pub struct AttachmentConfig {
    pub max_bytes: usize,
    pub allowed_types: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            database: DatabaseConfig::from_env()?,
            workflow: WorkflowConfig::from_env()?,
            attachments: AttachmentConfig::from_env()?,
        })
    }
}

impl DatabaseConfig {
    // Default values for database connection pool (conservative defaults for small-medium apps)
    const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MAX_CONNECTIONS must be a valid number".to_string())?;

        let min_connections = env::var("DB_MIN_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MIN_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MIN_CONNECTIONS must be a valid number".to_string())?;

        let acquire_timeout_secs = env::var("DB_ACQUIRE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_ACQUIRE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_ACQUIRE_TIMEOUT_SECS must be a valid number".to_string())?;

        let idle_timeout_secs = env::var("DB_IDLE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_IDLE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_IDLE_TIMEOUT_SECS must be a valid number".to_string())?;

        let max_lifetime_secs = env::var("DB_MAX_LIFETIME_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_LIFETIME_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_MAX_LIFETIME_SECS must be a valid number".to_string())?;

        Ok(Self {
            url,
            max_connections,
            min_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
        })
    }
}

impl WorkflowConfig {
    const DEFAULT_STORE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_BUDGET_UTC_OFFSET_HOURS: i32 = 7; // WIB
    const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;

    pub fn from_env() -> Result<Self, String> {
        let store_timeout_secs = env::var("STORE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_STORE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "STORE_TIMEOUT_SECS must be a valid number".to_string())?;

        let offset_hours = env::var("BUDGET_UTC_OFFSET_HOURS")
            .unwrap_or_else(|_| Self::DEFAULT_BUDGET_UTC_OFFSET_HOURS.to_string())
            .parse::<i32>()
            .map_err(|_| "BUDGET_UTC_OFFSET_HOURS must be a valid number".to_string())?;
        let budget_utc_offset = FixedOffset::east_opt(offset_hours * 3600)
            .ok_or_else(|| "BUDGET_UTC_OFFSET_HOURS must be between -23 and 23".to_string())?;

        let event_queue_capacity = env::var("EVENT_QUEUE_CAPACITY")
            .unwrap_or_else(|_| Self::DEFAULT_EVENT_QUEUE_CAPACITY.to_string())
            .parse::<usize>()
            .ok()
            .filter(|c| *c > 0)
            .ok_or_else(|| "EVENT_QUEUE_CAPACITY must be a positive number".to_string())?;

        Ok(Self {
            store_timeout: Duration::from_secs(store_timeout_secs),
            budget_utc_offset,
            event_queue_capacity,
        })
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(Self::DEFAULT_STORE_TIMEOUT_SECS),
            budget_utc_offset: FixedOffset::east_opt(Self::DEFAULT_BUDGET_UTC_OFFSET_HOURS * 3600)
                .unwrap_or_else(|| Utc.fix()),
            event_queue_capacity: Self::DEFAULT_EVENT_QUEUE_CAPACITY,
        }
    }
}

impl AttachmentConfig {
    const DEFAULT_MAX_BYTES: usize = 2048 * 1024; // 2MB
    const DEFAULT_ALLOWED_TYPES: &'static str = "application/pdf,image/jpeg,image/png";

    pub fn from_env() -> Result<Self, String> {
        let max_bytes = env::var("ATTACHMENT_MAX_BYTES")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_BYTES.to_string())
            .parse::<usize>()
            .map_err(|_| "ATTACHMENT_MAX_BYTES must be a valid number".to_string())?;

        let allowed_types = Self::parse_types(
            &env::var("ATTACHMENT_ALLOWED_TYPES")
                .unwrap_or_else(|_| Self::DEFAULT_ALLOWED_TYPES.to_string()),
        );

        Ok(Self {
            max_bytes,
            allowed_types,
        })
    }

    fn parse_types(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn is_type_allowed(&self, content_type: &str) -> bool {
        let content_type = content_type.to_lowercase();
        self.allowed_types.iter().any(|t| *t == content_type)
    }
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            max_bytes: Self::DEFAULT_MAX_BYTES,
            allowed_types: Self::parse_types(Self::DEFAULT_ALLOWED_TYPES),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_attachment_types() {
        let config = AttachmentConfig::default();
        assert!(config.is_type_allowed("application/pdf"));
        assert!(config.is_type_allowed("IMAGE/PNG"));
        assert!(!config.is_type_allowed("image/gif"));
        assert_eq!(config.max_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn test_default_workflow_uses_wib() {
        let config = WorkflowConfig::default();
        assert_eq!(config.budget_utc_offset.local_minus_utc(), 7 * 3600);
        assert_eq!(config.store_timeout, Duration::from_secs(5));
    }
}
