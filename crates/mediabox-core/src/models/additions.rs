use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::media::MediaKind;

/// Type-specific derived attributes attached to a file record.
///
/// For API responses this uses internal tagging with a "kind" field. For database
/// storage use `to_json_value()` / `from_json_value()`, which handle flat JSON and
/// select the variant from the record's `MediaKind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MediaAdditions {
    Image {
        width: u32,
        height: u32,
        alt: String,
        title: String,
    },
    Video {
        duration: f64,
        width: u32,
        height: u32,
        /// Preview frame location, relative to the storage root
        preview: String,
    },
    Audio {
        duration: f64,
    },
}

/// Flat structs for JSONB serialization (no discriminator tag).
mod flat_additions {
    use super::*;

    #[derive(Serialize, Deserialize)]
    pub struct ImageAdditions {
        pub width: u32,
        pub height: u32,
        #[serde(default)]
        pub alt: String,
        #[serde(default)]
        pub title: String,
    }

    #[derive(Serialize, Deserialize)]
    pub struct VideoAdditions {
        pub duration: f64,
        pub width: u32,
        pub height: u32,
        pub preview: String,
    }

    #[derive(Serialize, Deserialize)]
    pub struct AudioAdditions {
        pub duration: f64,
    }
}

impl MediaAdditions {
    /// Image additions with empty `alt` and `title`.
    pub fn image(width: u32, height: u32) -> Self {
        MediaAdditions::Image {
            width,
            height,
            alt: String::new(),
            title: String::new(),
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            MediaAdditions::Image { .. } => MediaKind::Image,
            MediaAdditions::Video { .. } => MediaKind::Video,
            MediaAdditions::Audio { .. } => MediaKind::Audio,
        }
    }

    pub fn duration(&self) -> Option<f64> {
        match self {
            MediaAdditions::Video { duration, .. } | MediaAdditions::Audio { duration } => {
                Some(*duration)
            }
            MediaAdditions::Image { .. } => None,
        }
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            MediaAdditions::Image { width, height, .. }
            | MediaAdditions::Video { width, height, .. } => Some((*width, *height)),
            MediaAdditions::Audio { .. } => None,
        }
    }

    /// Preview frame path (videos only)
    pub fn preview(&self) -> Option<&str> {
        match self {
            MediaAdditions::Video { preview, .. } => Some(preview.as_str()),
            _ => None,
        }
    }

    /// Replace the preview path. Returns false when these are not video additions.
    pub fn set_preview(&mut self, new_preview: String) -> bool {
        match self {
            MediaAdditions::Video { preview, .. } => {
                *preview = new_preview;
                true
            }
            _ => false,
        }
    }

    /// Parse flat JSONB using `kind` to select the variant.
    pub fn from_json_value(v: &JsonValue, kind: MediaKind) -> Option<MediaAdditions> {
        match kind {
            MediaKind::Image => {
                let flat: flat_additions::ImageAdditions = serde_json::from_value(v.clone()).ok()?;
                Some(MediaAdditions::Image {
                    width: flat.width,
                    height: flat.height,
                    alt: flat.alt,
                    title: flat.title,
                })
            }
            MediaKind::Video => {
                let flat: flat_additions::VideoAdditions = serde_json::from_value(v.clone()).ok()?;
                Some(MediaAdditions::Video {
                    duration: flat.duration,
                    width: flat.width,
                    height: flat.height,
                    preview: flat.preview,
                })
            }
            MediaKind::Audio => {
                let flat: flat_additions::AudioAdditions = serde_json::from_value(v.clone()).ok()?;
                Some(MediaAdditions::Audio {
                    duration: flat.duration,
                })
            }
        }
    }

    /// Serialize to flat JSON for insert/update.
    pub fn to_json_value(&self) -> JsonValue {
        match self {
            MediaAdditions::Image {
                width,
                height,
                alt,
                title,
            } => {
                let flat = flat_additions::ImageAdditions {
                    width: *width,
                    height: *height,
                    alt: alt.clone(),
                    title: title.clone(),
                };
                serde_json::to_value(flat).unwrap_or_default()
            }
            MediaAdditions::Video {
                duration,
                width,
                height,
                preview,
            } => {
                let flat = flat_additions::VideoAdditions {
                    duration: *duration,
                    width: *width,
                    height: *height,
                    preview: preview.clone(),
                };
                serde_json::to_value(flat).unwrap_or_default()
            }
            MediaAdditions::Audio { duration } => {
                let flat = flat_additions::AudioAdditions {
                    duration: *duration,
                };
                serde_json::to_value(flat).unwrap_or_default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_image_additions_defaults() {
        let additions = MediaAdditions::image(800, 600);
        assert_eq!(
            additions.to_json_value(),
            json!({"width": 800, "height": 600, "alt": "", "title": ""})
        );
        assert_eq!(additions.kind(), MediaKind::Image);
        assert_eq!(additions.preview(), None);
    }

    #[test]
    fn test_flat_json_has_no_discriminator() {
        let additions = MediaAdditions::Audio { duration: 3.5 };
        let value = additions.to_json_value();
        assert!(value.get("kind").is_none());
        assert_eq!(
            MediaAdditions::from_json_value(&value, MediaKind::Audio),
            Some(additions)
        );
    }

    #[test]
    fn test_from_json_value_uses_kind() {
        let value = json!({"duration": 10.0, "width": 1280, "height": 720, "preview": "media/a.jpg"});
        let video = MediaAdditions::from_json_value(&value, MediaKind::Video).unwrap();
        assert_eq!(video.preview(), Some("media/a.jpg"));
        assert_eq!(video.dimensions(), Some((1280, 720)));

        // Missing width/height cannot be read as an image
        assert!(MediaAdditions::from_json_value(&json!({"duration": 1.0}), MediaKind::Image).is_none());
    }

    #[test]
    fn test_image_alt_and_title_default_when_absent() {
        let value = json!({"width": 1, "height": 2});
        let image = MediaAdditions::from_json_value(&value, MediaKind::Image).unwrap();
        assert_eq!(image, MediaAdditions::image(1, 2));
    }

    #[test]
    fn test_set_preview_only_on_video() {
        let mut video = MediaAdditions::Video {
            duration: 1.0,
            width: 2,
            height: 2,
            preview: "old.jpg".to_string(),
        };
        assert!(video.set_preview("new.jpg".to_string()));
        assert_eq!(video.preview(), Some("new.jpg"));

        let mut audio = MediaAdditions::Audio { duration: 1.0 };
        assert!(!audio.set_preview("x.jpg".to_string()));
    }

    #[test]
    fn test_tagged_serialization_for_responses() {
        let json = serde_json::to_value(MediaAdditions::Audio { duration: 2.0 }).unwrap();
        assert_eq!(json, json!({"kind": "audio", "duration": 2.0}));
    }
}
