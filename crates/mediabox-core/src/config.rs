//! Configuration module
//!
//! Runtime settings for the ingestion pipeline: database pool, storage root, image
//! conversion, ffmpeg binaries and preview extraction. Values come from the process
//! environment (and a `.env` file when present) with typed defaults.

use std::env;
use std::path::PathBuf;

// Common constants
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const JPEG_QUALITY: u8 = 90;
const PREVIEW_OFFSET_SECS: f64 = 2.0;

/// Application configuration
#[derive(Clone, Debug)]
pub struct MediaConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub storage_path: PathBuf,
    /// Re-encode uploaded images as JPEG before storing them
    pub convert_images_to_jpeg: bool,
    pub jpeg_quality: u8,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// Seek position (seconds) of the video preview frame
    pub preview_offset_secs: f64,
    /// Remove stored files once their record is deleted
    pub purge_files_on_delete: bool,
    pub environment: String,
    pub log_format: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        MediaConfig {
            database_url: "postgresql://localhost/mediabox".to_string(),
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            storage_path: PathBuf::from("./media"),
            convert_images_to_jpeg: false,
            jpeg_quality: JPEG_QUALITY,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            preview_offset_secs: PREVIEW_OFFSET_SECS,
            purge_files_on_delete: true,
            environment: "development".to_string(),
            log_format: "text".to_string(),
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .to_lowercase()
        .parse()
        .unwrap_or(default)
}

impl MediaConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let defaults = MediaConfig::default();

        let config = MediaConfig {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            storage_path: env::var("STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_path),
            convert_images_to_jpeg: env_flag("CONVERT_IMAGES_TO_JPEG", false),
            jpeg_quality: env::var("JPEG_QUALITY")
                .unwrap_or_else(|_| JPEG_QUALITY.to_string())
                .parse()
                .unwrap_or(JPEG_QUALITY),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or(defaults.ffprobe_path),
            preview_offset_secs: env::var("PREVIEW_OFFSET_SECS")
                .unwrap_or_else(|_| PREVIEW_OFFSET_SECS.to_string())
                .parse()
                .unwrap_or(PREVIEW_OFFSET_SECS),
            purge_files_on_delete: env_flag("PURGE_FILES_ON_DELETE", true),
            environment: env::var("ENVIRONMENT")
                .or_else(|_| env::var("APP_ENV"))
                .unwrap_or(defaults.environment),
            log_format: env::var("LOG_FORMAT")
                .unwrap_or(defaults.log_format)
                .to_lowercase(),
        };

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.db_max_connections == 0 {
            return Err(anyhow::anyhow!("DB_MAX_CONNECTIONS must be at least 1"));
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(anyhow::anyhow!("JPEG_QUALITY must be between 1 and 100"));
        }

        if !self.preview_offset_secs.is_finite() || self.preview_offset_secs < 0.0 {
            return Err(anyhow::anyhow!(
                "PREVIEW_OFFSET_SECS must be a non-negative number"
            ));
        }

        if self.storage_path.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("STORAGE_PATH must not be empty"));
        }

        Ok(())
    }

    pub fn json_logs(&self) -> bool {
        self.log_format == "json"
    }
}
