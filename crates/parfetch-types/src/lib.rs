//! Shared types for parfetch
//!
//! This crate contains the plain data structures shared by the
//! download engine and the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

// ============================================================================
// Request Types
// ============================================================================

/// File name used when the URL has no usable final path segment
pub const DEFAULT_FILENAME: &str = "download";

/// A request to fetch one remote resource into one local file.
///
/// Fields are private: a request does not change once it has been built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    url: String,
    destination: Option<PathBuf>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            destination: None,
        }
    }

    /// Set an explicit destination instead of the URL-derived file name
    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    /// The destination path, defaulting to the URL's final path segment
    pub fn destination_path(&self) -> PathBuf {
        match &self.destination {
            Some(path) => path.clone(),
            None => PathBuf::from(filename_from_url(&self.url)),
        }
    }
}

/// Derive a file name from the final path segment of a URL.
///
/// The segment is percent-decoded and any path separators it decodes to are
/// replaced, so the result is always a single path component.
pub fn filename_from_url(url: &str) -> String {
    let segment = match url::Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.last())
            .unwrap_or("")
            .to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .unwrap_or("")
            .to_string(),
    };

    let decoded = urlencoding::decode(&segment)
        .map(|s| s.into_owned())
        .unwrap_or(segment);
    let name = decoded.replace(['/', '\\'], "_");

    match name.trim() {
        "" | "." | ".." => DEFAULT_FILENAME.to_string(),
        _ => name,
    }
}

// ============================================================================
// Range Types
// ============================================================================

/// A contiguous slice of the remote resource, half-open: `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    /// Position of this range in the plan, starting at 0
    pub index: u32,
    /// First byte, inclusive
    pub start: u64,
    /// One past the last byte
    pub end: u64,
}

impl ByteRange {
    pub fn new(index: u32, start: u64, end: u64) -> Self {
        Self { index, start, end }
    }

    /// Number of bytes covered by this range
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value for the HTTP `Range` header. HTTP ranges are inclusive on both ends.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end.saturating_sub(1))
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "part {} [{}, {})", self.index, self.start, self.end)
    }
}

// ============================================================================
// Download State Types
// ============================================================================

/// State of a single download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Probing,
    SingleShot,
    Partitioned,
    Merging,
    Done,
    Aborted,
}

impl DownloadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadStatus::Done | DownloadStatus::Aborted)
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DownloadStatus::Probing => "probing",
            DownloadStatus::SingleShot => "single-shot",
            DownloadStatus::Partitioned => "partitioned",
            DownloadStatus::Merging => "merging",
            DownloadStatus::Done => "done",
            DownloadStatus::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// How the resource was fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DownloadStrategy {
    /// One whole-body request straight to the destination
    SingleShot,
    /// Concurrent ranged requests merged afterwards
    Partitioned { parts: u32 },
}

// ============================================================================
// API Types
// ============================================================================

/// What a metadata request revealed about a URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub url: String,
    /// URL after redirects, when it differs from `url`
    pub final_url: Option<String>,
    pub content_length: Option<u64>,
    pub supports_ranges: bool,
    pub content_type: Option<String>,
}

impl ProbeResult {
    /// URL to use for the actual transfer
    pub fn effective_url(&self) -> &str {
        self.final_url.as_deref().unwrap_or(&self.url)
    }

    /// Whether the resource can be split into ranged requests
    pub fn is_partitionable(&self) -> bool {
        self.supports_ranges && self.content_length.unwrap_or(0) > 0
    }
}

/// Summary of a completed download
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadReport {
    pub id: Uuid,
    pub url: String,
    pub path: PathBuf,
    pub bytes: u64,
    pub strategy: DownloadStrategy,
}

// ============================================================================
// Event Types
// ============================================================================

/// Lifecycle events emitted by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    StatusChanged {
        id: Uuid,
        status: DownloadStatus,
        error: Option<String>,
    },
    PartCompleted {
        id: Uuid,
        index: u32,
        bytes: u64,
    },
}

// ============================================================================
// Settings Types
// ============================================================================

pub const DEFAULT_CONCURRENCY: u32 = 4;
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Engine settings. Fields missing from a settings file take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Number of ranged requests per download
    pub concurrency: u32,
    /// Size of the write and copy buffers in bytes
    pub buffer_size: usize,
    pub connect_timeout_secs: u64,
    /// Whole-request timeout; `None` lets large parts run as long as needed
    pub request_timeout_secs: Option<u64>,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            buffer_size: DEFAULT_BUFFER_SIZE,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: None,
            user_agent: format!("parfetch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
