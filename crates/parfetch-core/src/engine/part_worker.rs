//! Part worker - downloads a single byte range to its own part file
//!
//! Each part worker is independent and writes only to its own file.
//! Once every worker has finished, the part files are merged into the
//! final file.

use crate::error::ParfetchError;
use futures::StreamExt;
use parfetch_types::ByteRange;
use reqwest::header::RANGE;
use reqwest::{Client, Response, StatusCode};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};
use uuid::Uuid;

/// Result of a part download
#[derive(Debug, Clone)]
pub struct PartResult {
    pub index: u32,
    /// Path to the downloaded part file
    pub path: PathBuf,
    pub bytes: u64,
}

/// A part worker that downloads one byte range to a part file
pub struct PartWorker {
    download_id: Uuid,
    range: ByteRange,
    url: String,
    part_path: PathBuf,
    client: Client,
    buffer_size: usize,
}

impl PartWorker {
    pub fn new(
        download_id: Uuid,
        range: ByteRange,
        url: String,
        part_path: PathBuf,
        client: Client,
        buffer_size: usize,
    ) -> Self {
        Self {
            download_id,
            range,
            url,
            part_path,
            client,
            buffer_size,
        }
    }

    /// Run the part download
    pub async fn run(self) -> Result<PartResult, ParfetchError> {
        info!(
            "Starting {} for download {}",
            self.range, self.download_id
        );

        let range_header = self.range.header_value();
        debug!("Part {} requesting range: {}", self.range.index, range_header);
        let response = self
            .client
            .get(&self.url)
            .header(RANGE, range_header)
            .send()
            .await?;

        // Anything but 206 means the server did not honour the range
        let status = response.status();
        if status != StatusCode::PARTIAL_CONTENT {
            return Err(ParfetchError::HttpStatus {
                status: status.as_u16(),
                url: self.url,
            });
        }

        let bytes = write_body(
            response,
            &self.part_path,
            self.buffer_size,
            self.range.index,
            Some(self.range.len()),
        )
        .await?;

        info!("Part {} complete ({} bytes)", self.range.index, bytes);

        Ok(PartResult {
            index: self.range.index,
            path: self.part_path,
            bytes,
        })
    }
}

/// Stream a response body into a freshly truncated file at `path`.
///
/// Memory use is bounded by `buffer_size` plus one network chunk. When
/// `expected` is known the byte count must match it exactly.
pub(crate) async fn write_body(
    response: Response,
    path: &Path,
    buffer_size: usize,
    index: u32,
    expected: Option<u64>,
) -> Result<u64, ParfetchError> {
    let file = File::create(path).await.map_err(ParfetchError::fs(path))?;
    let mut writer = BufWriter::with_capacity(buffer_size, file);

    let mut received: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result?;
        received += chunk.len() as u64;

        if let Some(expected) = expected {
            if received > expected {
                return Err(ParfetchError::IncompletePart {
                    index,
                    expected,
                    received,
                });
            }
        }

        writer
            .write_all(&chunk)
            .await
            .map_err(ParfetchError::fs(path))?;
    }

    // Flush and sync to disk
    writer.flush().await.map_err(ParfetchError::fs(path))?;
    writer
        .get_ref()
        .sync_all()
        .await
        .map_err(ParfetchError::fs(path))?;

    if let Some(expected) = expected {
        if received != expected {
            return Err(ParfetchError::IncompletePart {
                index,
                expected,
                received,
            });
        }
    }

    Ok(received)
}
