//! Shared key helpers for storage backends.
//!
//! Key format: `media/{filename}`.

use std::path::Path;

use crate::traits::{StorageError, StorageResult};

const KEY_PREFIX: &str = "media";
const MAX_FILENAME_LENGTH: usize = 255;

/// Generate the storage key for a filename.
pub fn storage_key(filename: &str) -> String {
    format!("{}/{}", KEY_PREFIX, filename)
}

/// Key of a file named `filename` in the same directory as `key`.
pub fn sibling_key(key: &str, filename: &str) -> String {
    match key.rsplit_once('/') {
        Some((dir, _)) => format!("{}/{}", dir, filename),
        None => filename.to_string(),
    }
}

/// File stem of a key (`media/abc.mp4` -> `abc`).
pub fn key_stem(key: &str) -> &str {
    Path::new(key)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(key)
}

/// Lowercased extension of a key, if any.
pub fn key_extension(key: &str) -> Option<String> {
    Path::new(key)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Replace (or add) the extension of a filename.
pub fn with_extension(filename: &str, extension: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, extension)
    }
}

/// Filename for renaming a stored file to `new_name`, keeping the stored `extension`.
///
/// A suffix of `new_name` is dropped only when it is a media extension (`clip.mov`), so
/// dots elsewhere survive (`mix v1.2` -> `mix_v1.2.mp3`).
pub fn renamed_filename(new_name: &str, extension: &str) -> StorageResult<String> {
    let sanitized = sanitize_filename(new_name)?;
    let base = if has_media_extension(&sanitized) {
        Path::new(&sanitized)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&sanitized)
            .to_string()
    } else {
        sanitized.clone()
    };

    if extension.is_empty() {
        Ok(base)
    } else {
        Ok(format!("{}.{}", base, extension))
    }
}

fn has_media_extension(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(|e| mime_guess::from_ext(e).first())
        .map(|mime| matches!(mime.type_().as_str(), "image" | "video" | "audio"))
        .unwrap_or(false)
}

/// Sanitize a filename to prevent path traversal and invalid characters.
///
/// Only the final path component is kept, characters outside `[A-Za-z0-9._-]` become
/// `_`, and names shorter than three characters fall back to `file`.
pub fn sanitize_filename(filename: &str) -> StorageResult<String> {
    let filename_only = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    if filename_only.contains("..") {
        return Err(StorageError::InvalidKey(
            "Filename contains invalid path traversal".to_string(),
        ));
    }

    let sanitized: String = filename_only
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim().is_empty() || sanitized.len() < 3 {
        return Ok("file".to_string());
    }

    Ok(sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_and_siblings() {
        let key = storage_key("abc.mp4");
        assert_eq!(key, "media/abc.mp4");
        assert_eq!(key_stem(&key), "abc");
        assert_eq!(key_extension(&key).as_deref(), Some("mp4"));
        assert_eq!(sibling_key(&key, "abc.jpg"), "media/abc.jpg");
        assert_eq!(sibling_key("loose.png", "other.png"), "other.png");
    }

    #[test]
    fn test_with_extension() {
        assert_eq!(with_extension("holiday.png", "jpg"), "holiday.jpg");
        assert_eq!(with_extension("holiday", "jpg"), "holiday.jpg");
        assert_eq!(with_extension("holiday.tar", ""), "holiday");
    }

    #[test]
    fn test_renamed_filename() {
        assert_eq!(renamed_filename("holiday", "mp4").unwrap(), "holiday.mp4");
        assert_eq!(renamed_filename("My Holiday.mov", "mp4").unwrap(), "My_Holiday.mp4");
        assert_eq!(renamed_filename("cover.PNG", "jpg").unwrap(), "cover.jpg");
        assert_eq!(renamed_filename("mix v1.2", "mp3").unwrap(), "mix_v1.2.mp3");
        assert_eq!(renamed_filename("notes.final", "wav").unwrap(), "notes.final.wav");
        assert_eq!(renamed_filename("plain.mp3", "").unwrap(), "plain");
    }

    #[test]
    fn sanitize_filename_rejects_path_traversal() {
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename("....").is_err());
    }

    #[test]
    fn sanitize_filename_accepts_valid_names() {
        assert_eq!(sanitize_filename("image.png").unwrap(), "image.png");
        assert_eq!(sanitize_filename("my-file_1.jpg").unwrap(), "my-file_1.jpg");
        assert_eq!(sanitize_filename("my holiday!.jpg").unwrap(), "my_holiday_.jpg");
        assert_eq!(sanitize_filename("dir/inner.png").unwrap(), "inner.png");
        assert_eq!(sanitize_filename("a").unwrap(), "file");
    }
}
