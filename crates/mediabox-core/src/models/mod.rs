//! Data models for the application
//!
//! Each sub-module covers one part of the media domain: the record itself and its
//! kind/role classification, the typed per-kind additions, content hashes and the
//! upload descriptor handed to the ingestion pipeline.

mod additions;
mod hash;
mod media;
mod upload;

pub use additions::MediaAdditions;
pub use hash::ContentHash;
pub use media::{
    classify, MediaFilter, MediaKind, MediaRecord, MediaRole, MediaRow, MediaUpdate,
    NewMediaRecord,
};
pub use upload::UploadedFile;
