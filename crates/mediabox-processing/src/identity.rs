//! Content identity: SHA-256 over the full file contents.

use std::path::Path;

use mediabox_core::{ContentHash, MediaResult};
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Hash a file's bytes, reading it in fixed-size chunks.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub async fn identify(path: &Path) -> MediaResult<ContentHash> {
    let start = std::time::Instant::now();
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_CHUNK_SIZE];
    let mut size_bytes: u64 = 0;

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        size_bytes += read as u64;
    }

    let hash = ContentHash::from_digest(&hasher.finalize());

    tracing::debug!(
        hash = %hash,
        size_bytes = size_bytes,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Computed content hash"
    );

    Ok(hash)
}
