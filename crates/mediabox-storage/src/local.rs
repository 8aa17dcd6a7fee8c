use crate::keys::{
    key_extension, renamed_filename, sanitize_filename, sibling_key, storage_key, with_extension,
};
use crate::traits::{Storage, StorageError, StorageResult};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Local filesystem storage implementation
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
    jpeg_quality: u8,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/mediabox")
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        let base_path = fs::canonicalize(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to canonicalize storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        })
    }

    /// Quality used when re-encoding images as JPEG (clamped to 1..=100).
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// Rejects keys with path traversal sequences that could escape the base storage
    /// directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.is_empty() || storage_key.contains("..") || storage_key.starts_with('/') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        let path = self.base_path.join(storage_key);

        if let Ok(canonical) = path.canonicalize() {
            if canonical.strip_prefix(&self.base_path).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        } else if path
            .strip_prefix(&self.base_path)
            .map(|rest| rest.components().any(|c| !matches!(c, Component::Normal(_))))
            .unwrap_or(true)
        {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }

        Ok(path)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn convert_to_jpeg(&self, source: &Path, dest: &Path) -> StorageResult<()> {
        let source = source.to_path_buf();
        let dest = dest.to_path_buf();
        let quality = self.jpeg_quality;

        tokio::task::spawn_blocking(move || encode_jpeg(&source, &dest, quality))
            .await
            .map_err(|e| StorageError::StoreFailed(format!("Conversion task failed: {}", e)))?
    }
}

fn encode_jpeg(source: &Path, dest: &Path, quality: u8) -> StorageResult<()> {
    let img = ImageReader::open(source)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| {
            StorageError::ConversionFailed(format!("Failed to decode {}: {}", source.display(), e))
        })?;

    write_or_remove(dest, |writer| {
        // JPEG has no alpha channel
        let encoder = JpegEncoder::new_with_quality(writer, quality);
        DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(encoder)
            .map_err(|e| {
                StorageError::ConversionFailed(format!(
                    "Failed to encode {}: {}",
                    dest.display(),
                    e
                ))
            })
    })
}

/// Create `dest` and fill it with `write`. A failed write removes the partial file.
fn write_or_remove<F>(dest: &Path, write: F) -> StorageResult<()>
where
    F: FnOnce(&mut BufWriter<std::fs::File>) -> StorageResult<()>,
{
    let file = std::fs::File::create(dest).map_err(|e| {
        StorageError::StoreFailed(format!("Failed to create file {}: {}", dest.display(), e))
    })?;
    let mut writer = BufWriter::new(file);

    let result = write(&mut writer).and_then(|_| writer.flush().map_err(StorageError::from));
    if result.is_err() {
        drop(writer);
        if let Err(e) = std::fs::remove_file(dest) {
            tracing::warn!(error = %e, path = %dest.display(), "Failed to remove partial file");
        }
    }
    result
}

#[async_trait]
impl Storage for LocalStorage {
    async fn store(
        &self,
        source: &Path,
        filename: &str,
        convert_to_jpeg: bool,
    ) -> StorageResult<String> {
        let filename = sanitize_filename(filename)?;
        let filename = if convert_to_jpeg {
            with_extension(&filename, "jpg")
        } else {
            filename
        };

        let key = storage_key(&filename);
        let path = self.key_to_path(&key)?;

        if !fs::try_exists(source).await.unwrap_or(false) {
            return Err(StorageError::NotFound(source.display().to_string()));
        }

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        if convert_to_jpeg {
            self.convert_to_jpeg(source, &path).await?;
        } else {
            fs::copy(source, &path).await.map_err(|e| {
                StorageError::StoreFailed(format!(
                    "Failed to copy {} to {}: {}",
                    source.display(),
                    path.display(),
                    e
                ))
            })?;
        }

        let size = fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            converted = convert_to_jpeg,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage store successful"
        );

        Ok(key)
    }

    async fn rename(&self, storage_key: &str, new_name: &str) -> StorageResult<String> {
        let from_path = self.key_to_path(storage_key)?;

        if !fs::try_exists(&from_path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }

        let extension = key_extension(storage_key).unwrap_or_default();
        let filename = renamed_filename(new_name, &extension)?;
        let new_key = sibling_key(storage_key, &filename);

        if new_key == storage_key {
            return Ok(new_key);
        }

        let to_path = self.key_to_path(&new_key)?;
        if fs::try_exists(&to_path).await.unwrap_or(false) {
            return Err(StorageError::AlreadyExists(new_key));
        }

        fs::rename(&from_path, &to_path).await.map_err(|e| {
            StorageError::RenameFailed(format!(
                "Failed to rename {} to {}: {}",
                from_path.display(),
                to_path.display(),
                e
            ))
        })?;

        tracing::info!(
            from_key = %storage_key,
            to_key = %new_key,
            "Local storage rename successful"
        );

        Ok(new_key)
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    fn path_of(&self, storage_key: &str) -> StorageResult<PathBuf> {
        self.key_to_path(storage_key)
    }

    fn key_for(&self, path: &Path) -> StorageResult<String> {
        let relative = match path.strip_prefix(&self.base_path) {
            Ok(rest) => rest.to_path_buf(),
            Err(_) => {
                let canonical = path.canonicalize()?;
                canonical
                    .strip_prefix(&self.base_path)
                    .map(Path::to_path_buf)
                    .map_err(|_| {
                        StorageError::InvalidKey(format!(
                            "{} is outside storage directory",
                            path.display()
                        ))
                    })?
            }
        };

        let parts: Vec<&str> = relative
            .components()
            .map(|c| match c {
                Component::Normal(part) => part.to_str().ok_or_else(|| {
                    StorageError::InvalidKey(format!("{} is not valid UTF-8", path.display()))
                }),
                _ => Err(StorageError::InvalidKey(format!(
                    "{} is not a plain storage path",
                    path.display()
                ))),
            })
            .collect::<StorageResult<_>>()?;

        if parts.is_empty() {
            return Err(StorageError::InvalidKey(
                "Storage root is not a file".to_string(),
            ));
        }

        Ok(parts.join("/"))
    }
}
