//! Settings loading and validation

use crate::error::ParfetchError;
use parfetch_types::Settings;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default settings file: `<config dir>/parfetch/settings.json`
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("parfetch").join("settings.json"))
}

/// Load settings from `path`, or from the default location.
///
/// An explicit path must exist. A missing default file yields the defaults.
pub async fn load_settings(path: Option<&Path>) -> Result<Settings, ParfetchError> {
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => match default_settings_path() {
            Some(path) => (path, false),
            None => return Ok(Settings::default()),
        },
    };

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
            debug!("No settings file at {:?}, using defaults", path);
            return Ok(Settings::default());
        }
        Err(e) => {
            return Err(ParfetchError::Config(format!(
                "cannot read {}: {}",
                path.display(),
                e
            )))
        }
    };

    let settings: Settings = serde_json::from_str(&content)
        .map_err(|e| ParfetchError::Config(format!("invalid {}: {}", path.display(), e)))?;
    validate_settings(&settings)?;

    debug!("Loaded settings from {:?}", path);
    Ok(settings)
}

pub fn validate_settings(settings: &Settings) -> Result<(), ParfetchError> {
    if settings.concurrency == 0 {
        return Err(ParfetchError::Config("concurrency must be at least 1".to_string()));
    }
    if settings.buffer_size == 0 {
        return Err(ParfetchError::Config("buffer_size must be at least 1".to_string()));
    }
    if settings.connect_timeout_secs == 0 {
        return Err(ParfetchError::Config(
            "connect_timeout_secs must be positive".to_string(),
        ));
    }
    if settings.request_timeout_secs == Some(0) {
        return Err(ParfetchError::Config(
            "request_timeout_secs must be positive".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_partial_settings_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        tokio::fs::write(&path, r#"{ "concurrency": 12, "request_timeout_secs": 90 }"#)
            .await
            .unwrap();

        let settings = load_settings(Some(&path)).await.unwrap();
        assert_eq!(settings.concurrency, 12);
        assert_eq!(settings.request_timeout_secs, Some(90));
        assert_eq!(settings.buffer_size, Settings::default().buffer_size);
    }

    #[tokio::test]
    async fn test_missing_explicit_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_settings(Some(&tmp.path().join("nope.json"))).await.unwrap_err();
        assert!(matches!(err, ParfetchError::Config(_)));
    }

    #[tokio::test]
    async fn test_invalid_values_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        tokio::fs::write(&path, r#"{ "concurrency": 0 }"#).await.unwrap();

        let err = load_settings(Some(&path)).await.unwrap_err();
        assert!(err.to_string().contains("concurrency"));

        tokio::fs::write(&path, r#"{ "connect_timeout_secs": 0 }"#).await.unwrap();
        let err = load_settings(Some(&path)).await.unwrap_err();
        assert!(err.to_string().contains("connect_timeout_secs"));

        tokio::fs::write(&path, r#"{ "request_timeout_secs": 0 }"#).await.unwrap();
        let err = load_settings(Some(&path)).await.unwrap_err();
        assert!(err.to_string().contains("request_timeout_secs"));

        tokio::fs::write(&path, "not json").await.unwrap();
        assert!(matches!(
            load_settings(Some(&path)).await,
            Err(ParfetchError::Config(_))
        ));
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_settings(&Settings::default()).is_ok());
    }
}
