//! Probing capability for audio/video files.
//!
//! `MediaProbe` is the narrow interface the extractor depends on: report container and
//! stream attributes, and grab a single frame at a timestamp. `FfmpegProbe` implements it
//! by shelling out to `ffprobe` and `ffmpeg`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

/// Container-level attributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatInfo {
    pub format_name: Option<String>,
    pub duration: Option<f64>,
}

/// Per-stream attributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamInfo {
    pub index: u32,
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration: Option<f64>,
}

impl StreamInfo {
    pub fn is_video(&self) -> bool {
        self.codec_type.as_deref() == Some("video")
    }
}

/// Result of probing a media file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeReport {
    pub format: FormatInfo,
    pub streams: Vec<StreamInfo>,
}

impl ProbeReport {
    /// The stream that describes the file: the first video stream, otherwise the first
    /// stream of any type.
    pub fn primary_stream(&self) -> Option<&StreamInfo> {
        self.streams
            .iter()
            .find(|s| s.is_video())
            .or_else(|| self.streams.first())
    }
}

/// Black-box audio/video probing engine
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Report format and stream attributes of a file.
    async fn probe(&self, path: &Path) -> Result<ProbeReport>;

    /// Write a single frame taken at `at_seconds` to `output` as JPEG.
    async fn extract_frame(&self, path: &Path, at_seconds: f64, output: &Path) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct FFprobeOutput {
    format: Option<FFprobeFormat>,
    streams: Option<Vec<FFprobeStream>>,
}

#[derive(Debug, Deserialize)]
struct FFprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FFprobeStream {
    index: Option<u32>,
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

fn parse_seconds(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_ffprobe_output(stdout: &[u8]) -> Result<ProbeReport> {
    let output: FFprobeOutput =
        serde_json::from_slice(stdout).context("Failed to parse ffprobe output")?;

    let format = output
        .format
        .map(|f| FormatInfo {
            duration: parse_seconds(f.duration.as_deref()),
            format_name: f.format_name,
        })
        .unwrap_or_default();

    let streams = output
        .streams
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, s)| StreamInfo {
            index: s.index.unwrap_or(i as u32),
            duration: parse_seconds(s.duration.as_deref()),
            codec_type: s.codec_type,
            codec_name: s.codec_name,
            width: s.width.filter(|w| *w > 0),
            height: s.height.filter(|h| *h > 0),
        })
        .collect();

    Ok(ProbeReport { format, streams })
}

/// Validate that a path doesn't contain shell metacharacters or dangerous sequences
fn validate_path(path: &str) -> Result<()> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(anyhow!("Path contains dangerous characters: {}", path));
    }

    if path.contains("..") {
        return Err(anyhow!("Path contains directory traversal: {}", path));
    }

    Ok(())
}

fn validate_executable(name: &str, path: &str) -> Result<()> {
    validate_path(path).with_context(|| format!("Invalid {} path", name))?;

    if path.is_empty()
        || !path.chars().all(|c| {
            c.is_alphanumeric() || c == '/' || c == '-' || c == '_' || c == '.' || c == '\\'
        })
    {
        return Err(anyhow!("Invalid {} path: contains unsafe characters", name));
    }

    Ok(())
}

/// Validate and canonicalize a media file path
fn validate_input_path(path: &Path) -> Result<PathBuf> {
    validate_path(&path.to_string_lossy())?;
    path.canonicalize()
        .map_err(|e| anyhow!("Failed to canonicalize path {}: {}", path.display(), e))
}

/// `MediaProbe` backed by the ffprobe and ffmpeg binaries
#[derive(Debug, Clone)]
pub struct FfmpegProbe {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegProbe {
    pub fn new(ffmpeg_path: String, ffprobe_path: String) -> Result<Self> {
        validate_executable("ffmpeg", &ffmpeg_path)?;
        validate_executable("ffprobe", &ffprobe_path)?;

        Ok(Self {
            ffmpeg_path,
            ffprobe_path,
        })
    }
}

#[async_trait]
impl MediaProbe for FfmpegProbe {
    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffprobe",
        process.executable.path = %self.ffprobe_path,
        ffmpeg.operation = "probe"
    ))]
    async fn probe(&self, path: &Path) -> Result<ProbeReport> {
        let start = std::time::Instant::now();
        let validated_path = validate_input_path(path).context("Invalid media path")?;

        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(&validated_path)
            .stdin(Stdio::null())
            .output()
            .await
            .context("Failed to execute ffprobe")?;

        if !output.status.success() {
            return Err(anyhow!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        let report = parse_ffprobe_output(&output.stdout)?;

        tracing::info!(
            duration_ms = start.elapsed().as_millis(),
            media_duration = ?report.format.duration,
            stream_count = report.streams.len(),
            "Media probe completed"
        );

        Ok(report)
    }

    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffmpeg",
        process.executable.path = %self.ffmpeg_path,
        ffmpeg.operation = "extract_frame"
    ))]
    async fn extract_frame(&self, path: &Path, at_seconds: f64, output: &Path) -> Result<()> {
        let validated_path = validate_input_path(path).context("Invalid media path")?;
        validate_path(&output.to_string_lossy()).context("Invalid frame output path")?;

        let args = vec![
            "-ss".to_string(),
            format!("{:.3}", at_seconds.max(0.0)),
            "-i".to_string(),
            validated_path.to_string_lossy().to_string(),
            "-vframes".to_string(),
            "1".to_string(),
            "-q:v".to_string(),
            "2".to_string(),
            "-y".to_string(),
            output.to_string_lossy().to_string(),
        ];

        let result = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to execute ffmpeg")?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(anyhow!("FFmpeg frame extraction failed: {}", stderr));
        }

        Ok(())
    }
}
