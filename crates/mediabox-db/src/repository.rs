//! Repository trait abstractions
//!
//! Transactions are explicit handles: callers obtain one from `begin()`, pass it to the
//! steps that must be atomic, then consume it with `commit()` or `rollback()`.

use async_trait::async_trait;
use mediabox_core::{MediaFilter, MediaRecord, MediaResult, MediaUpdate, NewMediaRecord};
use uuid::Uuid;

/// Persistence operations on media records
#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// All records matching every field set on the filter, oldest first.
    async fn find_where(&self, filter: &MediaFilter) -> MediaResult<Vec<MediaRecord>>;

    async fn get(&self, id: Uuid) -> MediaResult<Option<MediaRecord>>;

    /// Insert a record. A hash already present fails with `DuplicateFile`.
    async fn create(&self, record: NewMediaRecord) -> MediaResult<MediaRecord>;

    /// Apply a partial update and return the updated record.
    async fn update(&self, id: Uuid, update: &MediaUpdate) -> MediaResult<MediaRecord>;

    /// Delete a record. Missing records fail with `NotFound`.
    async fn delete(&self, id: Uuid) -> MediaResult<()>;

    /// Open a transaction handle.
    async fn begin(&self) -> MediaResult<Box<dyn MediaTransaction>>;
}

/// An open repository transaction. Nothing it does is visible until `commit()`.
#[async_trait]
pub trait MediaTransaction: Send {
    /// Clear the parent reference of a record.
    async fn detach(&mut self, id: Uuid) -> MediaResult<()>;

    async fn commit(self: Box<Self>) -> MediaResult<()>;

    async fn rollback(self: Box<Self>) -> MediaResult<()>;
}
