//! Type-dispatched metadata extraction.
//!
//! Images are measured from their header. Video and audio go through a [`MediaProbe`];
//! for video a preview frame is written beside the source and its location is recorded
//! relative to the storage root.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageReader;
use mediabox_core::{MediaAdditions, MediaError, MediaKind, MediaResult};
use mediabox_storage::Storage;

use crate::probe::{MediaProbe, ProbeReport};

/// Default seek position of the preview frame
pub const DEFAULT_PREVIEW_OFFSET_SECS: f64 = 2.0;

const PREVIEW_EXTENSION: &str = "jpg";

pub struct MetadataExtractor {
    probe: Arc<dyn MediaProbe>,
    storage: Arc<dyn Storage>,
    preview_offset_secs: f64,
}

impl MetadataExtractor {
    pub fn new(probe: Arc<dyn MediaProbe>, storage: Arc<dyn Storage>) -> Self {
        Self {
            probe,
            storage,
            preview_offset_secs: DEFAULT_PREVIEW_OFFSET_SECS,
        }
    }

    pub fn with_preview_offset(mut self, seconds: f64) -> Self {
        if seconds.is_finite() && seconds >= 0.0 {
            self.preview_offset_secs = seconds;
        }
        self
    }

    /// Derive the additions for a stored file of the given kind.
    pub async fn extract(&self, path: &Path, kind: MediaKind) -> MediaResult<MediaAdditions> {
        match kind {
            MediaKind::Image => self.extract_image(path).await,
            MediaKind::Video => self.extract_video(path).await,
            MediaKind::Audio => self.extract_audio(path).await,
        }
    }

    async fn extract_image(&self, path: &Path) -> MediaResult<MediaAdditions> {
        let owned = path.to_path_buf();
        let (width, height) = tokio::task::spawn_blocking(move || read_image_dimensions(&owned))
            .await
            .map_err(|e| MediaError::UnreadableImage(format!("Header read task failed: {}", e)))??;

        tracing::debug!(path = %path.display(), width, height, "Extracted image dimensions");

        Ok(MediaAdditions::image(width, height))
    }

    async fn extract_video(&self, path: &Path) -> MediaResult<MediaAdditions> {
        let report = self.probe_file(path).await?;

        let stream = report.primary_stream().ok_or_else(|| {
            MediaError::ProbeFailure(format!("{}: no readable stream", path.display()))
        })?;

        let (width, height) = match (stream.width, stream.height) {
            (Some(w), Some(h)) => (w, h),
            _ => {
                return Err(MediaError::ProbeFailure(format!(
                    "{}: stream {} has no dimensions",
                    path.display(),
                    stream.index
                )))
            }
        };

        let duration = stream.duration.or(report.format.duration).ok_or_else(|| {
            MediaError::ProbeFailure(format!("{}: no duration reported", path.display()))
        })?;

        let preview_path = preview_path_for(path);
        let offset = self.frame_offset(duration);

        self.probe
            .extract_frame(path, offset, &preview_path)
            .await
            .map_err(|e| MediaError::ProbeFailure(format!("{}: {:#}", path.display(), e)))?;

        if !tokio::fs::try_exists(&preview_path).await.unwrap_or(false) {
            return Err(MediaError::ProbeFailure(format!(
                "{}: no frame at {:.3}s",
                path.display(),
                offset
            )));
        }

        let preview = self.storage.key_for(&preview_path)?;

        tracing::info!(
            path = %path.display(),
            preview = %preview,
            duration,
            width,
            height,
            offset_secs = offset,
            "Extracted video metadata"
        );

        Ok(MediaAdditions::Video {
            duration,
            width,
            height,
            preview,
        })
    }

    async fn extract_audio(&self, path: &Path) -> MediaResult<MediaAdditions> {
        let report = self.probe_file(path).await?;

        if report.streams.is_empty() {
            return Err(MediaError::ProbeFailure(format!(
                "{}: no readable stream",
                path.display()
            )));
        }

        let duration = report
            .format
            .duration
            .or_else(|| report.primary_stream().and_then(|s| s.duration))
            .ok_or_else(|| {
                MediaError::ProbeFailure(format!("{}: no duration reported", path.display()))
            })?;

        tracing::debug!(path = %path.display(), duration, "Extracted audio metadata");

        Ok(MediaAdditions::Audio { duration })
    }

    async fn probe_file(&self, path: &Path) -> MediaResult<ProbeReport> {
        self.probe
            .probe(path)
            .await
            .map_err(|e| MediaError::ProbeFailure(format!("{}: {:#}", path.display(), e)))
    }

    /// Seek position for the preview frame. Clips shorter than the configured offset use
    /// their midpoint.
    fn frame_offset(&self, duration: f64) -> f64 {
        if duration >= self.preview_offset_secs {
            self.preview_offset_secs
        } else if duration > 0.0 {
            duration / 2.0
        } else {
            0.0
        }
    }
}

fn unreadable(path: &Path, err: impl std::fmt::Display) -> MediaError {
    MediaError::UnreadableImage(format!("{}: {}", path.display(), err))
}

fn read_image_dimensions(path: &Path) -> MediaResult<(u32, u32)> {
    ImageReader::open(path)
        .map_err(|e| unreadable(path, e))?
        .with_guessed_format()
        .map_err(|e| unreadable(path, e))?
        .into_dimensions()
        .map_err(|e| unreadable(path, e))
}

/// `<dir>/<stem>.jpg` beside the source; `<stem>-preview.jpg` if the source is itself a JPEG.
fn preview_path_for(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("preview");
    let candidate = source.with_file_name(format!("{}.{}", stem, PREVIEW_EXTENSION));
    if candidate == source {
        source.with_file_name(format!("{}-preview.{}", stem, PREVIEW_EXTENSION))
    } else {
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{FormatInfo, StreamInfo};
    use async_trait::async_trait;
    use image::{ImageFormat, RgbImage};
    use mediabox_storage::LocalStorage;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    /// Probe returning a fixed report and writing a small JPEG as the frame.
    struct FakeProbe {
        report: ProbeReport,
        write_frame: bool,
        frame_requests: Mutex<Vec<f64>>,
    }

    impl FakeProbe {
        fn new(report: ProbeReport) -> Self {
            Self {
                report,
                write_frame: true,
                frame_requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MediaProbe for FakeProbe {
        async fn probe(&self, _path: &Path) -> anyhow::Result<ProbeReport> {
            Ok(self.report.clone())
        }

        async fn extract_frame(
            &self,
            _path: &Path,
            at_seconds: f64,
            output: &Path,
        ) -> anyhow::Result<()> {
            self.frame_requests.lock().unwrap().push(at_seconds);
            if self.write_frame {
                RgbImage::new(4, 4).save_with_format(output, ImageFormat::Jpeg)?;
            }
            Ok(())
        }
    }

    fn video_report(duration: Option<f64>, container: Option<f64>) -> ProbeReport {
        ProbeReport {
            format: FormatInfo {
                format_name: Some("mp4".to_string()),
                duration: container,
            },
            streams: vec![StreamInfo {
                index: 0,
                codec_type: Some("video".to_string()),
                codec_name: Some("h264".to_string()),
                width: Some(1280),
                height: Some(720),
                duration,
            }],
        }
    }

    async fn setup(probe: Arc<FakeProbe>) -> (TempDir, Arc<LocalStorage>, MetadataExtractor) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path().join("root")).await.unwrap());
        let extractor = MetadataExtractor::new(probe, storage.clone());
        (dir, storage, extractor)
    }

    async fn stored_file(dir: &TempDir, storage: &LocalStorage, name: &str) -> PathBuf {
        let source = dir.path().join("upload");
        std::fs::write(&source, b"media bytes").unwrap();
        let key = storage.store(&source, name, false).await.unwrap();
        storage.path_of(&key).unwrap()
    }

    #[tokio::test]
    async fn test_image_dimensions() {
        let (dir, _storage, extractor) = setup(Arc::new(FakeProbe::new(ProbeReport::default()))).await;
        let path = dir.path().join("photo.png");
        RgbImage::new(800, 600)
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();

        let additions = extractor.extract(&path, MediaKind::Image).await.unwrap();
        assert_eq!(additions, MediaAdditions::image(800, 600));
    }

    #[tokio::test]
    async fn test_unreadable_image() {
        let (dir, _storage, extractor) = setup(Arc::new(FakeProbe::new(ProbeReport::default()))).await;
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        let result = extractor.extract(&path, MediaKind::Image).await;
        assert!(matches!(result, Err(MediaError::UnreadableImage(_))));

        let result = extractor
            .extract(&dir.path().join("missing.png"), MediaKind::Image)
            .await;
        assert!(matches!(result, Err(MediaError::UnreadableImage(_))));
    }

    #[tokio::test]
    async fn test_video_writes_preview_beside_source() {
        let probe = Arc::new(FakeProbe::new(video_report(Some(10.0), Some(10.02))));
        let (dir, storage, extractor) = setup(probe.clone()).await;
        let path = stored_file(&dir, &storage, "abc.mp4").await;

        let additions = extractor.extract(&path, MediaKind::Video).await.unwrap();
        match additions {
            MediaAdditions::Video {
                duration,
                width,
                height,
                ref preview,
            } => {
                assert!((duration - 10.0).abs() < f64::EPSILON);
                assert_eq!((width, height), (1280, 720));
                assert_eq!(preview, "media/abc.jpg");
                assert!(storage.exists(preview).await.unwrap());
            }
            other => panic!("expected video additions, got {:?}", other),
        }
        assert_eq!(*probe.frame_requests.lock().unwrap(), vec![2.0]);
    }

    #[tokio::test]
    async fn test_video_duration_falls_back_to_container() {
        let probe = Arc::new(FakeProbe::new(video_report(None, Some(7.5))));
        let (dir, storage, extractor) = setup(probe).await;
        let path = stored_file(&dir, &storage, "abc.webm").await;

        let additions = extractor.extract(&path, MediaKind::Video).await.unwrap();
        assert_eq!(additions.duration(), Some(7.5));
    }

    #[tokio::test]
    async fn test_short_clip_uses_midpoint() {
        let probe = Arc::new(FakeProbe::new(video_report(Some(1.0), None)));
        let (dir, storage, extractor) = setup(probe.clone()).await;
        let path = stored_file(&dir, &storage, "short.mp4").await;

        extractor.extract(&path, MediaKind::Video).await.unwrap();
        assert_eq!(*probe.frame_requests.lock().unwrap(), vec![0.5]);
    }

    #[tokio::test]
    async fn test_video_without_stream_or_frame_fails() {
        let probe = Arc::new(FakeProbe::new(ProbeReport::default()));
        let (dir, storage, extractor) = setup(probe).await;
        let path = stored_file(&dir, &storage, "empty.mp4").await;
        let result = extractor.extract(&path, MediaKind::Video).await;
        assert!(matches!(result, Err(MediaError::ProbeFailure(_))));

        let mut silent = FakeProbe::new(video_report(Some(10.0), None));
        silent.write_frame = false;
        let (dir, storage, extractor) = setup(Arc::new(silent)).await;
        let path = stored_file(&dir, &storage, "noframe.mp4").await;
        let result = extractor.extract(&path, MediaKind::Video).await;
        assert!(matches!(result, Err(MediaError::ProbeFailure(ref m)) if m.contains("no frame")));
    }

    #[tokio::test]
    async fn test_audio_duration() {
        let report = ProbeReport {
            format: FormatInfo {
                format_name: Some("mp3".to_string()),
                duration: Some(183.2),
            },
            streams: vec![StreamInfo {
                codec_type: Some("audio".to_string()),
                ..Default::default()
            }],
        };
        let probe = Arc::new(FakeProbe::new(report));
        let (dir, storage, extractor) = setup(probe.clone()).await;
        let path = stored_file(&dir, &storage, "song.mp3").await;

        let additions = extractor.extract(&path, MediaKind::Audio).await.unwrap();
        assert_eq!(additions, MediaAdditions::Audio { duration: 183.2 });
        // Audio never writes a frame
        assert!(probe.frame_requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_audio_without_duration_fails() {
        let report = ProbeReport {
            format: FormatInfo::default(),
            streams: vec![StreamInfo::default()],
        };
        let (dir, storage, extractor) = setup(Arc::new(FakeProbe::new(report))).await;
        let path = stored_file(&dir, &storage, "song.mp3").await;

        let result = extractor.extract(&path, MediaKind::Audio).await;
        assert!(matches!(result, Err(MediaError::ProbeFailure(_))));
    }

    #[test]
    fn test_preview_path_for() {
        assert_eq!(
            preview_path_for(Path::new("/srv/media/abc.mp4")),
            PathBuf::from("/srv/media/abc.jpg")
        );
        assert_eq!(
            preview_path_for(Path::new("/srv/media/abc.jpg")),
            PathBuf::from("/srv/media/abc-preview.jpg")
        );
    }
}
