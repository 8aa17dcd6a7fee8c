//! Mediabox CLI: ingest files and manage media records from the command line.
//!
//! Reads its configuration from the environment (see `MediaConfig::from_env`); DATABASE_URL
//! is required. Records are printed as JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mediabox_core::{ErrorMetadata, MediaConfig, MediaError, UploadedFile};
use mediabox_db::{setup_database, PgMediaRepository};
use mediabox_processing::FfmpegProbe;
use mediabox_services::{init_tracing, MediaLifecycle};
use mediabox_storage::LocalStorage;
use serde::Serialize;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "mediabox", about = "Media ingest and library management")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a local file (image, video or audio)
    Ingest {
        /// Path to the file to ingest
        file: PathBuf,
        /// MIME type; guessed from the file extension when omitted
        #[arg(long)]
        mime: Option<String>,
        /// Folder to place the file in
        #[arg(long, value_name = "UUID")]
        parent: Option<Uuid>,
    },
    /// Create a folder
    Mkdir {
        name: String,
        /// Parent folder
        #[arg(long, value_name = "UUID")]
        parent: Option<Uuid>,
    },
    /// Rename a file or folder
    Rename { id: Uuid, name: String },
    /// Delete a record, detaching its children
    Delete { id: Uuid },
    /// Show a single record
    Show { id: Uuid },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize record")?;
    println!("{}", out);
    Ok(())
}

fn guess_mime(path: &Path) -> anyhow::Result<String> {
    mime_guess::from_path(path)
        .first()
        .map(|mime| mime.essence_str().to_string())
        .with_context(|| {
            format!(
                "Cannot guess the MIME type of {}; pass --mime",
                path.display()
            )
        })
}

async fn build_lifecycle(config: &MediaConfig) -> anyhow::Result<MediaLifecycle> {
    let pool = setup_database(config)
        .await
        .context("Failed to set up database")?;

    let storage = LocalStorage::new(&config.storage_path)
        .await
        .with_context(|| {
            format!(
                "Failed to open storage at {}",
                config.storage_path.display()
            )
        })?
        .with_jpeg_quality(config.jpeg_quality);

    let probe = FfmpegProbe::new(config.ffmpeg_path.clone(), config.ffprobe_path.clone())
        .context("Invalid ffmpeg/ffprobe configuration")?;

    Ok(MediaLifecycle::from_config(
        config,
        Arc::new(PgMediaRepository::new(pool)),
        Arc::new(storage),
        Arc::new(probe),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = MediaConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    init_tracing(config.json_logs())?;

    tracing::debug!(
        environment = %config.environment,
        storage_path = %config.storage_path.display(),
        "Configuration loaded"
    );

    let lifecycle = build_lifecycle(&config).await?;

    if let Err(err) = run(&lifecycle, cli.command).await {
        let Some(media_err) = err.downcast_ref::<MediaError>() else {
            return Err(err);
        };
        tracing::debug!(error = %format!("{:#}", err), "Command failed");
        eprintln!("{}", serde_json::to_string_pretty(&error_report(media_err))?);
        std::process::exit(1);
    }

    Ok(())
}

/// JSON body printed for a failed command.
fn error_report(err: &MediaError) -> serde_json::Value {
    serde_json::json!({
        "error": err.error_code(),
        "message": err.client_message(),
        "recoverable": err.is_recoverable(),
    })
}

async fn run(lifecycle: &MediaLifecycle, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Ingest { file, mime, parent } => {
            let mime = match mime {
                Some(mime) => mime,
                None => guess_mime(&file)?,
            };
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("{} has no usable file name", file.display()))?
                .to_string();

            let upload = UploadedFile::new(&file, name, mime).with_parent(parent);
            let record = lifecycle
                .create_from_file(upload)
                .await
                .with_context(|| format!("Failed to ingest {}", file.display()))?;
            print_json(&record)?;
        }
        Commands::Mkdir { name, parent } => {
            let folder = lifecycle
                .create_folder(&name, parent)
                .await
                .context("Failed to create folder")?;
            print_json(&folder)?;
        }
        Commands::Rename { id, name } => {
            let mut record = lifecycle.get(id).await?;
            lifecycle
                .rename_media(&mut record, &name)
                .await
                .with_context(|| format!("Failed to rename {}", id))?;
            print_json(&record)?;
        }
        Commands::Delete { id } => {
            let record = lifecycle.get(id).await?;
            lifecycle
                .safe_delete(&record)
                .await
                .with_context(|| format!("Failed to delete {}", id))?;
            print_json(&serde_json::json!({ "deleted": id, "role": record.role }))?;
        }
        Commands::Show { id } => {
            let record = lifecycle.get(id).await?;
            print_json(&record)?;
        }
    }

    Ok(())
}
