//! Mediabox Core Library
//!
//! This crate provides the domain models, error types and configuration shared by
//! every Mediabox component: media kinds and roles, typed additions, content hashes,
//! and the `MediaError` taxonomy.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::MediaConfig;
pub use error::{ErrorMetadata, LogLevel, MediaError, MediaResult};
pub use models::{
    classify, ContentHash, MediaAdditions, MediaFilter, MediaKind, MediaRecord, MediaRole,
    MediaUpdate, NewMediaRecord, UploadedFile,
};
