//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mediabox_core::MediaError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Store failed: {0}")]
    StoreFailed(String),

    #[error("Rename failed: {0}")]
    RenameFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Target already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Image conversion failed: {0}")]
    ConversionFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for MediaError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => MediaError::NotFound(format!("Stored file {}", key)),
            StorageError::InvalidKey(msg) => MediaError::InvalidInput(msg),
            StorageError::ConversionFailed(msg) => MediaError::UnreadableImage(msg),
            other => MediaError::Storage(other.to_string()),
        }
    }
}

/// Storage abstraction trait
///
/// Keys are paths relative to the storage root (see the crate documentation). The
/// ingestion pipeline works from local paths because the probing tools need them, so
/// backends also translate between keys and filesystem paths.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Copy `source` into storage as `filename` and return its key.
    ///
    /// With `convert_to_jpeg` the file is decoded as an image and re-encoded as JPEG; the
    /// stored filename then gets a `.jpg` extension.
    async fn store(
        &self,
        source: &Path,
        filename: &str,
        convert_to_jpeg: bool,
    ) -> StorageResult<String>;

    /// Rename a stored file, keeping its directory and extension. Returns the new key.
    async fn rename(&self, storage_key: &str, new_name: &str) -> StorageResult<String>;

    /// Delete a file by its storage key. Missing files are not an error.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Check if a file exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Absolute filesystem path of a key.
    fn path_of(&self, storage_key: &str) -> StorageResult<PathBuf>;

    /// Key of a path inside the storage root (the root prefix stripped).
    fn key_for(&self, path: &Path) -> StorageResult<String>;
}
