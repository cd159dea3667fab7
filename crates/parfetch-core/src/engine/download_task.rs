//! Download task - coordinates the part workers of one download
//!
//! This is the orchestrator for a single download. It probes the URL,
//! then either streams the whole body straight to the destination or
//! spawns one part worker per range, joins them all and merges the
//! part files.

use crate::engine::{merge, planner, prober, PartWorker, StagingDir};
use crate::engine::part_worker::write_body;
use crate::error::ParfetchError;
use parfetch_types::{
    ByteRange, CoreEvent, DownloadReport, DownloadRequest, DownloadStatus, DownloadStrategy,
    Settings,
};
use reqwest::Client;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A download task that drives one request from probe to final file
pub struct DownloadTask {
    id: Uuid,
    request: DownloadRequest,
    client: Client,
    settings: Settings,
    event_tx: broadcast::Sender<CoreEvent>,
    status: DownloadStatus,
}

impl DownloadTask {
    /// Create a new download task
    pub fn new(
        request: DownloadRequest,
        client: Client,
        settings: Settings,
        event_tx: broadcast::Sender<CoreEvent>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            client,
            settings,
            event_tx,
            status: DownloadStatus::Probing,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> DownloadStatus {
        self.status
    }

    /// Run the download task.
    ///
    /// On failure or cancellation every staging directory, partial
    /// destination file and newly created parent directory is removed
    /// before the error is returned.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<DownloadReport, ParfetchError> {
        let destination = self.request.destination_path();
        info!(
            "Starting download {}: {} -> {:?}",
            self.id,
            self.request.url(),
            destination
        );

        self.set_status(DownloadStatus::Probing, None);

        let mut created_dirs = Vec::new();
        match self.execute(&destination, &cancel, &mut created_dirs).await {
            Ok(report) => {
                self.set_status(DownloadStatus::Done, None);
                info!("Download completed: {:?} ({} bytes)", report.path, report.bytes);
                Ok(report)
            }
            Err(e) => {
                error!("Download {} aborted: {}", self.id, e);
                remove_created_dirs(&created_dirs).await;
                self.set_status(DownloadStatus::Aborted, Some(e.to_string()));
                Err(e)
            }
        }
    }

    async fn execute(
        &mut self,
        destination: &Path,
        cancel: &CancellationToken,
        created_dirs: &mut Vec<PathBuf>,
    ) -> Result<DownloadReport, ParfetchError> {
        let probe = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ParfetchError::Cancelled),
            result = prober::probe(&self.client, self.request.url()) => result?,
        };
        let url = probe.effective_url().to_string();

        // Ensure destination directory exists
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            *created_dirs = missing_dirs(parent).await;
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ParfetchError::fs(parent))?;
        }

        let (bytes, strategy) = match probe.content_length {
            Some(length) if probe.is_partitionable() => {
                self.set_status(DownloadStatus::Partitioned, None);
                let parts = self
                    .download_partitioned(&url, length, destination, cancel)
                    .await?;
                (length, DownloadStrategy::Partitioned { parts })
            }
            length => {
                self.set_status(DownloadStatus::SingleShot, None);
                let expected = length.filter(|&l| l > 0);
                let bytes = self
                    .download_single_shot(&url, expected, destination, cancel)
                    .await?;
                (bytes, DownloadStrategy::SingleShot)
            }
        };

        Ok(DownloadReport {
            id: self.id,
            url: self.request.url().to_string(),
            path: destination.to_path_buf(),
            bytes,
            strategy,
        })
    }

    /// Fetch the whole body with one request, straight to the destination
    async fn download_single_shot(
        &self,
        url: &str,
        expected: Option<u64>,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, ParfetchError> {
        info!("Download {}: using single request", self.id);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ParfetchError::Cancelled),
            result = self.client.get(url).send() => result?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ParfetchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let write = write_body(response, destination, self.settings.buffer_size, 0, expected);
        write_destination(destination, cancel, write).await
    }

    /// Fetch all ranges concurrently into a staging directory, then merge.
    /// Returns the number of parts.
    async fn download_partitioned(
        &mut self,
        url: &str,
        length: u64,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<u32, ParfetchError> {
        let ranges = planner::plan(length, self.settings.concurrency)?;
        info!(
            "Download {}: splitting {} bytes into {} parts",
            self.id,
            length,
            ranges.len()
        );

        let staging = StagingDir::create(destination).await?;
        let result = self
            .fetch_and_merge(url, &ranges, &staging, length, destination, cancel)
            .await;

        let staging_path = staging.path().to_path_buf();
        if let Err(e) = staging.remove().await {
            warn!("Failed to remove staging directory {:?}: {}", staging_path, e);
        }

        result.map(|()| ranges.len() as u32)
    }

    async fn fetch_and_merge(
        &mut self,
        url: &str,
        ranges: &[ByteRange],
        staging: &StagingDir,
        length: u64,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), ParfetchError> {
        let parts = self.fetch_parts(url, ranges, staging, cancel).await?;

        // All parts complete - merge into final file
        self.set_status(DownloadStatus::Merging, None);
        let buffer_size = self.settings.buffer_size;
        let merged = async {
            merge(&parts, destination, buffer_size)
                .await
                .and_then(|actual| match actual {
                    actual if actual == length => Ok(actual),
                    actual => Err(ParfetchError::MergeLength {
                        expected: length,
                        actual,
                    }),
                })
        };

        write_destination(destination, cancel, merged).await.map(|_| ())
    }

    /// Spawn one worker per range and wait for all of them. The first
    /// failure aborts the workers still in flight.
    async fn fetch_parts(
        &self,
        url: &str,
        ranges: &[ByteRange],
        staging: &StagingDir,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>, ParfetchError> {
        let mut join_set = JoinSet::new();

        for range in ranges {
            let worker = PartWorker::new(
                self.id,
                *range,
                url.to_string(),
                staging.part_path(range),
                self.client.clone(),
                self.settings.buffer_size,
            );
            join_set.spawn(worker.run());
        }

        let mut completed: Vec<Option<PathBuf>> = vec![None; ranges.len()];

        let outcome = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(ParfetchError::Cancelled),
                next = join_set.join_next() => next,
            };

            match next {
                None => break Ok(()),
                Some(Ok(Ok(part))) => {
                    debug!("Part {} completed", part.index);
                    let _ = self.event_tx.send(CoreEvent::PartCompleted {
                        id: self.id,
                        index: part.index,
                        bytes: part.bytes,
                    });
                    if let Some(slot) = completed.get_mut(part.index as usize) {
                        *slot = Some(part.path);
                    }
                }
                Some(Ok(Err(e))) => {
                    error!("Part failed for download {}: {}", self.id, e);
                    break Err(e);
                }
                Some(Err(e)) => {
                    error!("Part task panicked: {}", e);
                    break Err(ParfetchError::TaskFailed(e.to_string()));
                }
            }
        };

        if let Err(e) = outcome {
            // Stop the remaining workers before anyone touches their files
            join_set.abort_all();
            while join_set.join_next().await.is_some() {}
            return Err(e);
        }

        completed
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ParfetchError::TaskFailed("a part finished without a file".to_string()))
    }

    /// Emit status change event
    fn set_status(&mut self, status: DownloadStatus, error: Option<String>) {
        debug!("Download {}: {} -> {}", self.id, self.status, status);
        self.status = status;
        let _ = self.event_tx.send(CoreEvent::StatusChanged {
            id: self.id,
            status,
            error,
        });
    }
}

/// Run `write` into `destination` unless `cancel` has already fired.
///
/// Once writing has started, a failure or cancellation removes the partial
/// destination. A destination that was never opened is left untouched.
async fn write_destination<F>(
    destination: &Path,
    cancel: &CancellationToken,
    write: F,
) -> Result<u64, ParfetchError>
where
    F: Future<Output = Result<u64, ParfetchError>>,
{
    if cancel.is_cancelled() {
        return Err(ParfetchError::Cancelled);
    }

    // Write goes first: cancellation only wins once writing has begun
    let written = tokio::select! {
        biased;
        result = write => result,
        _ = cancel.cancelled() => Err(ParfetchError::Cancelled),
    };

    if written.is_err() {
        remove_partial_file(destination).await;
    }
    written
}

/// Ancestors of `dir` that do not exist yet, deepest first
async fn missing_dirs(dir: &Path) -> Vec<PathBuf> {
    let mut missing = Vec::new();
    let mut current = Some(dir);
    while let Some(path) = current.filter(|p| !p.as_os_str().is_empty()) {
        if tokio::fs::try_exists(path).await.unwrap_or(true) {
            break;
        }
        missing.push(path.to_path_buf());
        current = path.parent();
    }
    missing
}

/// Remove directories created for an aborted download, deepest first.
/// Directories that are no longer empty are kept.
async fn remove_created_dirs(dirs: &[PathBuf]) {
    for dir in dirs {
        match tokio::fs::remove_dir(dir).await {
            Ok(()) => debug!("Removed directory {:?}", dir),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!("Failed to remove directory {:?}: {}", dir, e);
                break;
            }
        }
    }
}

async fn remove_partial_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial file {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial file {:?}: {}", path, e),
    }
}
