use std::path::{Path, PathBuf};

use uuid::Uuid;

/// A file handed to the ingestion pipeline, already written to local disk.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub path: PathBuf,
    /// Client-supplied filename, used as the record name
    pub original_name: String,
    pub mime_type: String,
    pub parent_id: Option<Uuid>,
}

impl UploadedFile {
    pub fn new(
        path: impl Into<PathBuf>,
        original_name: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        UploadedFile {
            path: path.into(),
            original_name: original_name.into(),
            mime_type: mime_type.into(),
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: Option<Uuid>) -> Self {
        self.parent_id = parent_id;
        self
    }

    /// Lowercased file extension: taken from the original name, then the on-disk path,
    /// then the MIME subtype.
    pub fn extension(&self) -> String {
        extension_of(Path::new(&self.original_name))
            .or_else(|| extension_of(&self.path))
            .or_else(|| extension_from_mime(&self.mime_type))
            .unwrap_or_else(|| "bin".to_string())
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_lowercase())
}

fn extension_from_mime(mime: &str) -> Option<String> {
    let (_, subtype) = mime.split_once('/')?;
    // "svg+xml" -> "svg", "x-wav" -> "wav"
    let subtype = subtype.split(['+', ';']).next()?.trim();
    let subtype = subtype.strip_prefix("x-").unwrap_or(subtype);
    let ext = match subtype.to_lowercase().as_str() {
        "jpeg" => "jpg".to_string(),
        "quicktime" => "mov".to_string(),
        "mpeg" if mime.starts_with("audio") => "mp3".to_string(),
        other => other.to_string(),
    };
    (!ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())).then_some(ext)
}
