//! Mediabox Storage Library
//!
//! This crate provides the storage abstraction used by the ingestion pipeline and a
//! local filesystem implementation.
//!
//! # Storage key format
//!
//! Keys are relative to the storage root: `media/{filename}`. A video's preview frame
//! lives beside its source under the same directory. Keys must not contain `..` or a
//! leading `/`. Key helpers live in the `keys` module so every backend stays consistent.

pub mod keys;
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use keys::sanitize_filename;
pub use local::LocalStorage;
pub use traits::{Storage, StorageError, StorageResult};
