//! Error types module
//!
//! All failures of the ingestion and deletion pipeline are unified under `MediaError`.
//! Variants map one-to-one onto the conditions a caller has to handle: unmapped MIME
//! types, unreadable images, probe failures, duplicate uploads, blocked folder deletes
//! and persistence failures.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;
use uuid::Uuid;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues and rejected operations
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be reported to the caller and in logs.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "DUPLICATE_FILE")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// User-facing message (may differ from the internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Unknown media type: {0}")]
    UnknownMediaType(String),

    #[error("Unreadable image: {0}")]
    UnreadableImage(String),

    #[error("Probe failure: {0}")]
    ProbeFailure(String),

    #[error("Duplicate file: a record with hash {hash} already exists")]
    DuplicateFile { hash: String },

    #[error("Folder {folder_id} cannot be deleted: it contains sub-folder {child_id}")]
    NonEmptyFolder { folder_id: Uuid, child_id: Uuid },

    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result alias used across the workspace
pub type MediaResult<T> = Result<T, MediaError>;

#[cfg(feature = "sqlx")]
impl From<SqlxError> for MediaError {
    fn from(err: SqlxError) -> Self {
        MediaError::Database(err)
    }
}

impl MediaError {
    /// True for every repository-level failure (`Database` or `Persistence`).
    pub fn is_persistence(&self) -> bool {
        match self {
            #[cfg(feature = "sqlx")]
            MediaError::Database(_) => true,
            MediaError::Persistence(_) => true,
            _ => false,
        }
    }

    /// Variant name, used as a structured logging field
    pub fn variant_name(&self) -> &'static str {
        match self {
            MediaError::UnknownMediaType(_) => "UnknownMediaType",
            MediaError::UnreadableImage(_) => "UnreadableImage",
            MediaError::ProbeFailure(_) => "ProbeFailure",
            MediaError::DuplicateFile { .. } => "DuplicateFile",
            MediaError::NonEmptyFolder { .. } => "NonEmptyFolder",
            #[cfg(feature = "sqlx")]
            MediaError::Database(_) => "Database",
            MediaError::Persistence(_) => "Persistence",
            MediaError::Storage(_) => "Storage",
            MediaError::NotFound(_) => "NotFound",
            MediaError::InvalidInput(_) => "InvalidInput",
            MediaError::Io(_) => "Io",
        }
    }
}

/// Static metadata for each variant: (error_code, recoverable, log_level).
fn media_error_static_metadata(err: &MediaError) -> (&'static str, bool, LogLevel) {
    match err {
        MediaError::UnknownMediaType(_) => ("UNKNOWN_MEDIA_TYPE", false, LogLevel::Debug),
        MediaError::UnreadableImage(_) => ("UNREADABLE_IMAGE", false, LogLevel::Warn),
        MediaError::ProbeFailure(_) => ("PROBE_FAILURE", false, LogLevel::Warn),
        MediaError::DuplicateFile { .. } => ("DUPLICATE_FILE", false, LogLevel::Debug),
        MediaError::NonEmptyFolder { .. } => ("NON_EMPTY_FOLDER", false, LogLevel::Warn),
        #[cfg(feature = "sqlx")]
        MediaError::Database(_) => ("PERSISTENCE_ERROR", true, LogLevel::Error),
        MediaError::Persistence(_) => ("PERSISTENCE_ERROR", true, LogLevel::Error),
        MediaError::Storage(_) => ("STORAGE_ERROR", true, LogLevel::Error),
        MediaError::NotFound(_) => ("NOT_FOUND", false, LogLevel::Debug),
        MediaError::InvalidInput(_) => ("INVALID_INPUT", false, LogLevel::Debug),
        MediaError::Io(_) => ("IO_ERROR", true, LogLevel::Error),
    }
}

impl ErrorMetadata for MediaError {
    fn error_code(&self) -> &'static str {
        media_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        media_error_static_metadata(self).1
    }

    fn log_level(&self) -> LogLevel {
        media_error_static_metadata(self).2
    }

    fn client_message(&self) -> String {
        match self {
            MediaError::UnknownMediaType(ref mime) => {
                format!("Unsupported media type: {}", mime)
            }
            MediaError::UnreadableImage(_) => "The image could not be read".to_string(),
            MediaError::ProbeFailure(_) => "The media file could not be analysed".to_string(),
            MediaError::DuplicateFile { .. } => "This file has already been uploaded".to_string(),
            MediaError::NonEmptyFolder { .. } => {
                "The folder contains sub-folders and cannot be deleted".to_string()
            }
            #[cfg(feature = "sqlx")]
            MediaError::Database(_) => "Failed to access database".to_string(),
            MediaError::Persistence(_) => "Failed to access database".to_string(),
            MediaError::Storage(_) => "Failed to access storage".to_string(),
            MediaError::NotFound(ref msg) => msg.clone(),
            MediaError::InvalidInput(ref msg) => msg.clone(),
            MediaError::Io(_) => "A local file could not be read or written".to_string(),
        }
    }
}
