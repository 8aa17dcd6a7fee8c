use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

use super::additions::MediaAdditions;
use super::hash::ContentHash;
use crate::error::{MediaError, MediaResult};

/// Media kind enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "media_kind", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    /// Map a MIME string onto a kind using its top-level type.
    ///
    /// `image/*`, `video/*` and `audio/*` are recognised; anything else, including a
    /// string without a `/`, is `UnknownMediaType`.
    pub fn from_mime(mime: &str) -> MediaResult<MediaKind> {
        let (prefix, _subtype) = mime
            .split_once('/')
            .ok_or_else(|| MediaError::UnknownMediaType(mime.to_string()))?;

        match prefix.trim().to_ascii_lowercase().as_str() {
            "audio" => Ok(MediaKind::Audio),
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            _ => Err(MediaError::UnknownMediaType(mime.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

/// Classify a MIME string (see [`MediaKind::from_mime`]).
pub fn classify(mime: &str) -> MediaResult<MediaKind> {
    MediaKind::from_mime(mime)
}

impl FromStr for MediaKind {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            "audio" => Ok(MediaKind::Audio),
            _ => Err(MediaError::UnknownMediaType(s.to_string())),
        }
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Whether a record is a leaf file or a container folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "media_role", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum MediaRole {
    File,
    Folder,
}

impl Display for MediaRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaRole::File => write!(f, "file"),
            MediaRole::Folder => write!(f, "folder"),
        }
    }
}

/// A media record: either a stored file with its derived additions, or a folder.
///
/// Folders carry no hash, kind, source path, MIME type or additions. `parent_id` is a
/// weak reference: deleting the parent detaches children rather than deleting them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: Uuid,
    pub name: String,
    pub hash: Option<ContentHash>,
    pub kind: Option<MediaKind>,
    pub role: MediaRole,
    pub source_path: Option<String>,
    pub mime_type: Option<String>,
    pub additions: Option<MediaAdditions>,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaRecord {
    pub fn is_folder(&self) -> bool {
        self.role == MediaRole::Folder
    }

    pub fn is_file(&self) -> bool {
        self.role == MediaRole::File
    }

    /// Storage keys owned by this record (source file and, for videos, the preview).
    pub fn storage_keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        if let Some(source) = self.source_path.as_deref() {
            keys.push(source);
        }
        if let Some(preview) = self.additions.as_ref().and_then(|a| a.preview()) {
            keys.push(preview);
        }
        keys
    }
}

/// Database row for the media table (additions stored as flat JSONB).
#[derive(Debug)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct MediaRow {
    pub id: Uuid,
    pub name: String,
    pub hash: Option<String>,
    pub kind: Option<MediaKind>,
    pub role: MediaRole,
    pub source_path: Option<String>,
    pub mime_type: Option<String>,
    pub additions: Option<JsonValue>,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaRow {
    /// Convert into a domain record, parsing the hash and the kind-specific additions.
    pub fn into_record(self) -> MediaResult<MediaRecord> {
        let hash = self
            .hash
            .map(|h| h.parse::<ContentHash>())
            .transpose()
            .map_err(|e| MediaError::Persistence(format!("Row {}: {}", self.id, e)))?;

        let additions = match (self.kind, self.additions.as_ref()) {
            (Some(kind), Some(value)) => {
                Some(MediaAdditions::from_json_value(value, kind).ok_or_else(|| {
                    MediaError::Persistence(format!(
                        "Row {}: additions do not match kind {}",
                        self.id, kind
                    ))
                })?)
            }
            _ => None,
        };

        Ok(MediaRecord {
            id: self.id,
            name: self.name,
            hash,
            kind: self.kind,
            role: self.role,
            source_path: self.source_path,
            mime_type: self.mime_type,
            additions,
            parent_id: self.parent_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Fields for a record about to be created (the repository assigns id and timestamps).
#[derive(Debug, Clone, PartialEq)]
pub struct NewMediaRecord {
    pub name: String,
    pub hash: Option<ContentHash>,
    pub kind: Option<MediaKind>,
    pub role: MediaRole,
    pub source_path: Option<String>,
    pub mime_type: Option<String>,
    pub additions: Option<MediaAdditions>,
    pub parent_id: Option<Uuid>,
}

impl NewMediaRecord {
    /// A stored file with its derived additions.
    pub fn file(
        name: String,
        hash: ContentHash,
        source_path: String,
        mime_type: String,
        additions: MediaAdditions,
        parent_id: Option<Uuid>,
    ) -> Self {
        NewMediaRecord {
            name,
            hash: Some(hash),
            kind: Some(additions.kind()),
            role: MediaRole::File,
            source_path: Some(source_path),
            mime_type: Some(mime_type),
            additions: Some(additions),
            parent_id,
        }
    }

    /// An empty folder.
    pub fn folder(name: String, parent_id: Option<Uuid>) -> Self {
        NewMediaRecord {
            name,
            hash: None,
            kind: None,
            role: MediaRole::Folder,
            source_path: None,
            mime_type: None,
            additions: None,
            parent_id,
        }
    }

    /// Materialise a record with the given identity and timestamp.
    pub fn into_record(self, id: Uuid, now: DateTime<Utc>) -> MediaRecord {
        MediaRecord {
            id,
            name: self.name,
            hash: self.hash,
            kind: self.kind,
            role: self.role,
            source_path: self.source_path,
            mime_type: self.mime_type,
            additions: self.additions,
            parent_id: self.parent_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a record. `None` leaves a field untouched.
///
/// `parent_id` is `Option<Option<Uuid>>` to distinguish "leave as is" from "set to null".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaUpdate {
    pub name: Option<String>,
    pub source_path: Option<String>,
    pub additions: Option<MediaAdditions>,
    pub parent_id: Option<Option<Uuid>>,
}

impl MediaUpdate {
    /// Clear the parent reference.
    pub fn detach() -> Self {
        MediaUpdate {
            parent_id: Some(None),
            ..Default::default()
        }
    }

    /// Apply the update to a record in place.
    pub fn apply_to(&self, record: &mut MediaRecord, now: DateTime<Utc>) {
        if let Some(ref name) = self.name {
            record.name = name.clone();
        }
        if let Some(ref source_path) = self.source_path {
            record.source_path = Some(source_path.clone());
        }
        if let Some(ref additions) = self.additions {
            record.additions = Some(additions.clone());
        }
        if let Some(parent_id) = self.parent_id {
            record.parent_id = parent_id;
        }
        record.updated_at = now;
    }
}

/// Filter for repository lookups. All set fields must match; an empty filter matches
/// every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaFilter {
    pub hash: Option<ContentHash>,
    pub parent_id: Option<Uuid>,
    pub role: Option<MediaRole>,
}

impl MediaFilter {
    pub fn by_hash(hash: ContentHash) -> Self {
        MediaFilter {
            hash: Some(hash),
            ..Default::default()
        }
    }

    pub fn children_of(parent_id: Uuid) -> Self {
        MediaFilter {
            parent_id: Some(parent_id),
            ..Default::default()
        }
    }

    pub fn with_role(mut self, role: MediaRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn matches(&self, record: &MediaRecord) -> bool {
        if let Some(ref hash) = self.hash {
            if record.hash.as_ref() != Some(hash) {
                return false;
            }
        }
        if let Some(parent_id) = self.parent_id {
            if record.parent_id != Some(parent_id) {
                return false;
            }
        }
        if let Some(role) = self.role {
            if record.role != role {
                return false;
            }
        }
        true
    }
}
