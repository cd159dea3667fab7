//! Merge engine - concatenates part files into the final file

use crate::error::ParfetchError;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufReader};
use tracing::{info, warn};

/// Merge `parts` into `final_path` in the given order, deleting each part
/// once it has been copied. Returns the number of bytes written.
///
/// Callers must only merge once every part has been fetched.
pub async fn merge(
    parts: &[PathBuf],
    final_path: &Path,
    buffer_size: usize,
) -> Result<u64, ParfetchError> {
    info!("Merging {} parts into {:?}", parts.len(), final_path);

    // Create or truncate final file
    let mut output = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(final_path)
        .await
        .map_err(ParfetchError::merge(final_path))?;

    let mut total: u64 = 0;
    for part in parts {
        let input = File::open(part).await.map_err(ParfetchError::merge(part))?;
        let mut reader = BufReader::with_capacity(buffer_size, input);

        let copied = tokio::io::copy_buf(&mut reader, &mut output)
            .await
            .map_err(ParfetchError::merge(final_path))?;
        total += copied;
        drop(reader);

        // Delete part file
        if let Err(e) = tokio::fs::remove_file(part).await {
            warn!("Failed to remove part file {:?}: {}", part, e);
        }
    }

    output.flush().await.map_err(ParfetchError::merge(final_path))?;
    output.sync_all().await.map_err(ParfetchError::merge(final_path))?;

    info!("Merge complete: {:?} ({} bytes)", final_path, total);
    Ok(total)
}
