//! Error types for parfetch core

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while downloading
#[derive(Debug, Error)]
pub enum ParfetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server returned {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Part {index} incomplete: received {received} of {expected} bytes")]
    IncompletePart {
        index: u32,
        expected: u64,
        received: u64,
    },

    #[error("Invalid range plan: {0}")]
    InvalidPlan(String),

    #[error("Filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Merge into {} failed: {source}", .path.display())]
    Merge {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Merged {actual} bytes but expected {expected}")]
    MergeLength { expected: u64, actual: u64 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Download was cancelled")]
    Cancelled,

    #[error("Fetch task failed: {0}")]
    TaskFailed(String),
}

impl ParfetchError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ParfetchError::Network(_) | ParfetchError::IncompletePart { .. } => true,
            ParfetchError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub(crate) fn fs(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| ParfetchError::Filesystem { path, source }
    }

    pub(crate) fn merge(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| ParfetchError::Merge { path, source }
    }
}

// Allow converting to String for display layers
impl From<ParfetchError> for String {
    fn from(error: ParfetchError) -> Self {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let server = ParfetchError::HttpStatus { status: 503, url: "http://h/f".into() };
        let missing = ParfetchError::HttpStatus { status: 404, url: "http://h/f".into() };
        let short = ParfetchError::IncompletePart { index: 2, expected: 10, received: 4 };

        assert!(server.is_retryable());
        assert!(!missing.is_retryable());
        assert!(short.is_retryable());
        assert!(!ParfetchError::Cancelled.is_retryable());
        assert!(!ParfetchError::InvalidPlan("zero".into()).is_retryable());
    }

    #[test]
    fn test_filesystem_error_message() {
        let err = ParfetchError::fs("/tmp/x")(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(err.to_string().starts_with("Filesystem error at /tmp/x"));
    }
}
