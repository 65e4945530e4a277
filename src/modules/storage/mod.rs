//! Storage module for reimbursement attachments
//!
//! The workflow only sees the opaque reference returned by [`FileStorage::store`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::error::{AppError, Result};

/// Prefix for every attachment key
const ATTACHMENT_PREFIX: &str = "attachments";

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Persist the bytes and return an opaque reference to them
    async fn store(&self, bytes: &[u8], content_type: &str) -> Result<String>;

    /// Remove a stored file. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type.to_lowercase().as_str() {
        "application/pdf" => "pdf",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        _ => "bin",
    }
}

/// Generate a unique key such as `attachments/0190...-....pdf`
pub fn generate_key(content_type: &str) -> String {
    format!(
        "{}/{}.{}",
        ATTACHMENT_PREFIX,
        Uuid::now_v7(),
        extension_for(content_type)
    )
}

/// Writes attachments under a directory on the local disk
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn store(&self, bytes: &[u8], content_type: &str) -> Result<String> {
        let key = generate_key(content_type);
        let path = self.root.join(&key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::Internal(format!("Failed to create directory {:?}: {}", parent, e))
            })?;
        }

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to upload file '{}': {}", key, e)))?;

        tracing::debug!("Stored attachment {} ({} bytes)", key, bytes.len());
        Ok(key)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.root.join(key)).await {
            Ok(()) => {
                tracing::debug!("Removed attachment {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Internal(format!(
                "Failed to delete file '{}': {}",
                key, e
            ))),
        }
    }
}

/// Keeps attachments in memory; for tests and embedded use
#[derive(Debug, Clone, Default)]
pub struct MemoryFileStorage {
    files: Arc<RwLock<HashMap<String, (String, Vec<u8>)>>>,
}

impl MemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content type and bytes stored under `key`
    pub async fn get(&self, key: &str) -> Option<(String, Vec<u8>)> {
        self.files.read().await.get(key).cloned()
    }

    pub async fn count(&self) -> usize {
        self.files.read().await.len()
    }
}

#[async_trait]
impl FileStorage for MemoryFileStorage {
    async fn store(&self, bytes: &[u8], content_type: &str) -> Result<String> {
        let key = generate_key(content_type);
        self.files
            .write()
            .await
            .insert(key.clone(), (content_type.to_string(), bytes.to_vec()));
        Ok(key)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.files.write().await.remove(key);
        Ok(())
    }
}
