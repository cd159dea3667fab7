//! Downloader - the entry point for running downloads
//!
//! Owns the shared HTTP client and the event channel, and hands out one
//! `DownloadTask` per request.

use crate::config::validate_settings;
use crate::engine::{prober, DownloadTask};
use crate::error::ParfetchError;
use parfetch_types::{CoreEvent, DownloadReport, DownloadRequest, ProbeResult, Settings};
use reqwest::Client;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Downloader that shares one connection pool across downloads
pub struct Downloader {
    /// HTTP client
    client: Client,
    settings: Settings,
    /// Event broadcaster
    event_tx: broadcast::Sender<CoreEvent>,
}

impl Downloader {
    /// Create a new downloader
    pub fn new(settings: Settings) -> Result<Self, ParfetchError> {
        validate_settings(&settings)?;
        let client = build_client(&settings)?;
        let (event_tx, _) = broadcast::channel(256);

        info!(
            "Downloader ready: concurrency={} buffer_size={}",
            settings.concurrency, settings.buffer_size
        );

        Ok(Self {
            client,
            settings,
            event_tx,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.event_tx.subscribe()
    }

    /// Probe a URL for length and range support
    pub async fn probe(&self, url: &str) -> Result<ProbeResult, ParfetchError> {
        prober::probe(&self.client, url).await
    }

    /// Create a task for `request` without starting it
    pub fn task(&self, request: DownloadRequest) -> DownloadTask {
        DownloadTask::new(
            request,
            self.client.clone(),
            self.settings.clone(),
            self.event_tx.clone(),
        )
    }

    /// Run `request` to completion
    pub async fn download(&self, request: DownloadRequest) -> Result<DownloadReport, ParfetchError> {
        self.task(request).run(CancellationToken::new()).await
    }

    /// Run `request`, aborting with cleanup once `cancel` fires
    pub async fn download_with_cancel(
        &self,
        request: DownloadRequest,
        cancel: CancellationToken,
    ) -> Result<DownloadReport, ParfetchError> {
        self.task(request).run(cancel).await
    }
}

/// Build the shared HTTP client from settings
fn build_client(settings: &Settings) -> Result<Client, ParfetchError> {
    let mut builder = Client::builder()
        .user_agent(settings.user_agent.as_str())
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs));

    if let Some(secs) = settings.request_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    Ok(builder.build()?)
}
