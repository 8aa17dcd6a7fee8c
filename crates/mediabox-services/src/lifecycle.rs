//! Media record lifecycle: ingestion, renaming, folders and safe deletion.
//!
//! Keeps the orchestration between repository, storage and extraction in one place so the
//! binaries stay thin and the whole flow can be tested against the in-memory repository.

use std::sync::Arc;
use std::time::Instant;

use mediabox_core::{
    classify, ContentHash, ErrorMetadata, LogLevel, MediaAdditions, MediaConfig, MediaError,
    MediaFilter, MediaKind, MediaRecord, MediaResult, MediaUpdate, NewMediaRecord, UploadedFile,
};
use mediabox_db::{MediaRepository, MediaTransaction};
use mediabox_processing::{identify, MediaProbe, MetadataExtractor};
use mediabox_storage::keys::{key_extension, key_stem};
use mediabox_storage::Storage;
use uuid::Uuid;

const PREVIEW_EXTENSION: &str = "jpg";

pub struct MediaLifecycle {
    repository: Arc<dyn MediaRepository>,
    storage: Arc<dyn Storage>,
    extractor: MetadataExtractor,
    convert_images_to_jpeg: bool,
    purge_files_on_delete: bool,
}

impl MediaLifecycle {
    pub fn new(
        repository: Arc<dyn MediaRepository>,
        storage: Arc<dyn Storage>,
        probe: Arc<dyn MediaProbe>,
    ) -> Self {
        let extractor = MetadataExtractor::new(probe, Arc::clone(&storage));
        Self {
            repository,
            storage,
            extractor,
            convert_images_to_jpeg: false,
            purge_files_on_delete: true,
        }
    }

    /// Build a lifecycle with the conversion, preview and purge settings of `config`.
    pub fn from_config(
        config: &MediaConfig,
        repository: Arc<dyn MediaRepository>,
        storage: Arc<dyn Storage>,
        probe: Arc<dyn MediaProbe>,
    ) -> Self {
        Self::new(repository, storage, probe)
            .with_jpeg_conversion(config.convert_images_to_jpeg)
            .with_preview_offset(config.preview_offset_secs)
            .with_purge_on_delete(config.purge_files_on_delete)
    }

    /// Re-encode uploaded images as JPEG before storing them.
    pub fn with_jpeg_conversion(mut self, enabled: bool) -> Self {
        self.convert_images_to_jpeg = enabled;
        self
    }

    pub fn with_preview_offset(mut self, seconds: f64) -> Self {
        self.extractor = self.extractor.with_preview_offset(seconds);
        self
    }

    pub fn with_purge_on_delete(mut self, enabled: bool) -> Self {
        self.purge_files_on_delete = enabled;
        self
    }

    pub fn repository(&self) -> &Arc<dyn MediaRepository> {
        &self.repository
    }

    /// Load a record, failing with `NotFound` when it does not exist.
    pub async fn get(&self, id: Uuid) -> MediaResult<MediaRecord> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("Media {}", id)))
    }

    /// Ingest an uploaded file: classify, hash, dedup, store, extract and persist.
    ///
    /// Nothing is stored when the type is unknown or the content already exists. Once the
    /// file is stored, a failure in extraction or persistence removes the stored artifacts
    /// before the error is returned.
    #[tracing::instrument(skip(self, upload), fields(file.name = %upload.original_name, file.mime = %upload.mime_type))]
    pub async fn create_from_file(&self, upload: UploadedFile) -> MediaResult<MediaRecord> {
        let start = Instant::now();

        let kind = classify(&upload.mime_type)?;
        let hash = identify(&upload.path).await?;

        let existing = self
            .repository
            .find_where(&MediaFilter::by_hash(hash.clone()))
            .await?;
        if let Some(original) = existing.first() {
            tracing::info!(
                hash = %hash,
                existing_id = %original.id,
                "Rejected duplicate upload"
            );
            return Err(MediaError::DuplicateFile {
                hash: hash.to_string(),
            });
        }

        if let Some(parent_id) = upload.parent_id {
            self.require_folder(parent_id).await?;
        }

        let convert = self.convert_images_to_jpeg && kind == MediaKind::Image;
        let filename = format!("{}.{}", hash, upload.extension());
        let source_key = self.storage.store(&upload.path, &filename, convert).await?;

        let additions = match self.extract_stored(&source_key, kind).await {
            Ok(additions) => additions,
            Err(e) => {
                log_media_error(
                    &e,
                    &source_key,
                    "Metadata extraction failed, removing stored file",
                );
                self.discard(&hash, &[source_key.as_str()]).await;
                return Err(e);
            }
        };

        let preview_key = additions.preview().map(str::to_string);
        let new_record = NewMediaRecord::file(
            upload.original_name,
            hash.clone(),
            source_key.clone(),
            upload.mime_type,
            additions,
            upload.parent_id,
        );

        let record = match self.repository.create(new_record).await {
            Ok(record) => record,
            Err(e) => {
                log_media_error(
                    &e,
                    &source_key,
                    "Failed to persist media record, removing stored files",
                );
                let mut keys = vec![source_key.as_str()];
                keys.extend(preview_key.as_deref());
                self.discard(&hash, &keys).await;
                return Err(e);
            }
        };

        tracing::info!(
            hash = %hash,
            media_id = %record.id,
            kind = %kind,
            key = %source_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Media ingested"
        );

        Ok(record)
    }

    /// Rename a record. Files are renamed in storage (extension preserved) together with
    /// a video's preview; folders only change name. `record` is updated in place.
    #[tracing::instrument(skip(self, record), fields(media_id = %record.id))]
    pub async fn rename_media(&self, record: &mut MediaRecord, new_name: &str) -> MediaResult<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(MediaError::InvalidInput("Name must not be empty".to_string()));
        }

        let mut update = MediaUpdate {
            name: Some(new_name.to_string()),
            ..Default::default()
        };
        // (from, to) pairs, undone if the update cannot be persisted
        let mut moved: Vec<(String, String)> = Vec::new();

        if let Some(source_key) = record.source_path.clone() {
            let new_source = self.storage.rename(&source_key, new_name).await?;
            if new_source != source_key {
                moved.push((source_key, new_source.clone()));
            }

            if let Some(mut additions) = record.additions.clone() {
                if let Some(preview_key) = additions.preview().map(str::to_string) {
                    let renamed = self
                        .storage
                        .rename(&preview_key, &preview_stem(&new_source))
                        .await;
                    let new_preview = match renamed {
                        Ok(key) => key,
                        Err(e) => {
                            self.undo_renames(&moved).await;
                            return Err(e.into());
                        }
                    };
                    if new_preview != preview_key {
                        moved.push((preview_key, new_preview.clone()));
                    }
                    additions.set_preview(new_preview);
                    update.additions = Some(additions);
                }
            }

            update.source_path = Some(new_source);
        }

        let updated = match self.repository.update(record.id, &update).await {
            Ok(updated) => updated,
            Err(e) => {
                self.undo_renames(&moved).await;
                return Err(e);
            }
        };

        tracing::info!(
            media_id = %updated.id,
            name = %updated.name,
            source_path = ?updated.source_path,
            "Media renamed"
        );

        *record = updated;
        Ok(())
    }

    /// Create a folder, optionally inside another folder.
    #[tracing::instrument(skip(self))]
    pub async fn create_folder(
        &self,
        name: &str,
        parent_id: Option<Uuid>,
    ) -> MediaResult<MediaRecord> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MediaError::InvalidInput(
                "Folder name must not be empty".to_string(),
            ));
        }

        if let Some(parent_id) = parent_id {
            self.require_folder(parent_id).await?;
        }

        let folder = self
            .repository
            .create(NewMediaRecord::folder(name.to_string(), parent_id))
            .await?;

        tracing::info!(media_id = %folder.id, parent_id = ?parent_id, "Folder created");

        Ok(folder)
    }

    /// Delete a record after detaching its children.
    ///
    /// Detachment runs in one transaction: a folder child aborts it with `NonEmptyFolder`
    /// and nothing is applied. The record itself is deleted after the commit, and the stored
    /// artifacts of the file as last persisted are then removed best-effort.
    #[tracing::instrument(skip(self, record), fields(media_id = %record.id, role = %record.role))]
    pub async fn safe_delete(&self, record: &MediaRecord) -> MediaResult<()> {
        let children = self
            .repository
            .find_where(&MediaFilter::children_of(record.id))
            .await?;

        let mut tx = self.repository.begin().await?;
        if let Err(e) = detach_children(&mut *tx, record, &children).await {
            tracing::warn!(
                error = %e,
                media_id = %record.id,
                children = children.len(),
                "Failed to detach children, rolling back"
            );
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(
                    error = %rollback_err,
                    media_id = %record.id,
                    "Rollback failed"
                );
            }
            return Err(e);
        }
        tx.commit().await?;

        // Purge from the stored state: `record` may predate a rename.
        let current = self.get(record.id).await?;
        self.repository.delete(current.id).await?;

        if self.purge_files_on_delete && current.is_file() {
            for key in current.storage_keys() {
                if let Err(e) = self.storage.delete(key).await {
                    tracing::warn!(
                        error = %e,
                        storage_key = %key,
                        "Failed to delete stored file"
                    );
                }
            }
        }

        tracing::info!(
            media_id = %record.id,
            detached = children.len(),
            "Media deleted"
        );

        Ok(())
    }

    async fn extract_stored(
        &self,
        source_key: &str,
        kind: MediaKind,
    ) -> MediaResult<MediaAdditions> {
        let path = self.storage.path_of(source_key)?;
        self.extractor.extract(&path, kind).await
    }

    async fn require_folder(&self, id: Uuid) -> MediaResult<MediaRecord> {
        let parent = self
            .repository
            .get(id)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("Parent folder {}", id)))?;

        if !parent.is_folder() {
            return Err(MediaError::InvalidInput(format!(
                "Parent {} is not a folder",
                id
            )));
        }

        Ok(parent)
    }

    /// Best-effort removal of artifacts written for a failed ingestion.
    ///
    /// Keys owned by a record with the same hash (a concurrent upload that won the race)
    /// are left alone. When ownership cannot be checked nothing is removed.
    async fn discard(&self, hash: &ContentHash, keys: &[&str]) {
        let owners = match self
            .repository
            .find_where(&MediaFilter::by_hash(hash.clone()))
            .await
        {
            Ok(owners) => owners,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    hash = %hash,
                    "Could not check artifact ownership, leaving stored files"
                );
                return;
            }
        };

        for key in keys {
            if owners.iter().any(|r| r.storage_keys().contains(key)) {
                continue;
            }
            if let Err(e) = self.storage.delete(key).await {
                tracing::warn!(error = %e, storage_key = %key, "Failed to remove stored file");
            }
        }
    }

    async fn undo_renames(&self, moved: &[(String, String)]) {
        for (from, to) in moved.iter().rev() {
            if let Err(e) = self.storage.rename(to, key_stem(from)).await {
                tracing::error!(
                    error = %e,
                    from_key = %to,
                    to_key = %from,
                    "Failed to revert rename"
                );
            }
        }
    }
}

/// Log an ingestion failure at the level its error type asks for.
fn log_media_error(error: &MediaError, key: &str, message: &str) {
    let error_type = error.variant_name();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type, key = %key, "{}", message);
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type, key = %key, "{}", message);
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type, key = %key, "{}", message);
        }
    }
}

/// Stage detachment of every child, refusing folder children.
async fn detach_children(
    tx: &mut dyn MediaTransaction,
    record: &MediaRecord,
    children: &[MediaRecord],
) -> MediaResult<()> {
    for child in children {
        if child.is_folder() {
            return Err(MediaError::NonEmptyFolder {
                folder_id: record.id,
                child_id: child.id,
            });
        }
        tx.detach(child.id).await?;
    }
    Ok(())
}

/// Stem of the preview belonging to a source key (`media/clip.mp4` -> `clip`).
fn preview_stem(source_key: &str) -> String {
    let stem = key_stem(source_key);
    if key_extension(source_key).as_deref() == Some(PREVIEW_EXTENSION) {
        format!("{}-preview", stem)
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_stem() {
        assert_eq!(preview_stem("media/holiday.mp4"), "holiday");
        assert_eq!(preview_stem("media/holiday.jpg"), "holiday-preview");
    }
}
