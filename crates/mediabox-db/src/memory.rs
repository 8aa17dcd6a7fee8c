//! In-memory repository
//!
//! Used where no database is available, chiefly tests. Mirrors the Postgres schema's
//! constraints: hashes are unique, parents must exist, and deleting a record detaches
//! its children.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use mediabox_core::{
    MediaError, MediaFilter, MediaRecord, MediaResult, MediaUpdate, NewMediaRecord,
};
use uuid::Uuid;

use crate::repository::{MediaRepository, MediaTransaction};

type RecordMap = HashMap<Uuid, MediaRecord>;

fn lock(records: &Mutex<RecordMap>) -> MediaResult<MutexGuard<'_, RecordMap>> {
    records
        .lock()
        .map_err(|_| MediaError::Persistence("In-memory repository lock poisoned".to_string()))
}

/// Media repository backed by a shared `HashMap`
#[derive(Clone, Default)]
pub struct InMemoryMediaRepository {
    records: Arc<Mutex<RecordMap>>,
}

impl InMemoryMediaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MediaRepository for InMemoryMediaRepository {
    async fn find_where(&self, filter: &MediaFilter) -> MediaResult<Vec<MediaRecord>> {
        let records = lock(&self.records)?;
        let mut found: Vec<MediaRecord> = records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn get(&self, id: Uuid) -> MediaResult<Option<MediaRecord>> {
        Ok(lock(&self.records)?.get(&id).cloned())
    }

    async fn create(&self, record: NewMediaRecord) -> MediaResult<MediaRecord> {
        let mut records = lock(&self.records)?;

        if let Some(ref hash) = record.hash {
            if records.values().any(|r| r.hash.as_ref() == Some(hash)) {
                return Err(MediaError::DuplicateFile {
                    hash: hash.to_string(),
                });
            }
        }

        if let Some(parent_id) = record.parent_id {
            if !records.contains_key(&parent_id) {
                return Err(MediaError::Persistence(format!(
                    "Parent {} does not exist",
                    parent_id
                )));
            }
        }

        let created = record.into_record(Uuid::new_v4(), Utc::now());
        records.insert(created.id, created.clone());

        tracing::debug!(media_id = %created.id, role = %created.role, "In-memory record created");

        Ok(created)
    }

    async fn update(&self, id: Uuid, update: &MediaUpdate) -> MediaResult<MediaRecord> {
        let mut records = lock(&self.records)?;

        if let Some(Some(parent_id)) = update.parent_id {
            if parent_id == id || !records.contains_key(&parent_id) {
                return Err(MediaError::Persistence(format!(
                    "Invalid parent {} for {}",
                    parent_id, id
                )));
            }
        }

        let record = records
            .get_mut(&id)
            .ok_or_else(|| MediaError::NotFound(format!("Media {}", id)))?;
        update.apply_to(record, Utc::now());
        Ok(record.clone())
    }

    async fn delete(&self, id: Uuid) -> MediaResult<()> {
        let mut records = lock(&self.records)?;

        if records.remove(&id).is_none() {
            return Err(MediaError::NotFound(format!("Media {}", id)));
        }

        // ON DELETE SET NULL
        let now = Utc::now();
        for record in records.values_mut().filter(|r| r.parent_id == Some(id)) {
            record.parent_id = None;
            record.updated_at = now;
        }

        Ok(())
    }

    async fn begin(&self) -> MediaResult<Box<dyn MediaTransaction>> {
        Ok(Box::new(InMemoryTransaction {
            records: Arc::clone(&self.records),
            pending_detach: Vec::new(),
        }))
    }
}

/// Stages detaches and applies them together on commit.
pub struct InMemoryTransaction {
    records: Arc<Mutex<RecordMap>>,
    pending_detach: Vec<Uuid>,
}

#[async_trait]
impl MediaTransaction for InMemoryTransaction {
    async fn detach(&mut self, id: Uuid) -> MediaResult<()> {
        if !lock(&self.records)?.contains_key(&id) {
            return Err(MediaError::NotFound(format!("Media {}", id)));
        }
        self.pending_detach.push(id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> MediaResult<()> {
        let mut records = lock(&self.records)?;

        if let Some(missing) = self
            .pending_detach
            .iter()
            .find(|id| !records.contains_key(*id))
        {
            return Err(MediaError::Persistence(format!(
                "Media {} disappeared before commit",
                missing
            )));
        }

        let now = Utc::now();
        for id in &self.pending_detach {
            if let Some(record) = records.get_mut(id) {
                record.parent_id = None;
                record.updated_at = now;
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MediaResult<()> {
        Ok(())
    }
}
