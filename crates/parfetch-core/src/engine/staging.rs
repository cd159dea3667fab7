//! Staging directory - scratch space for the part files of one download

use crate::error::ParfetchError;
use parfetch_types::ByteRange;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// A per-download directory holding the part files.
///
/// The name combines the destination file name with a fresh uuid, so two
/// downloads never share a directory. Call [`StagingDir::remove`] on every
/// exit path; dropping an unremoved directory deletes it synchronously as a
/// last resort.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
    file_name: OsString,
    removed: bool,
}

impl StagingDir {
    /// Create the staging directory next to `destination`
    pub async fn create(destination: &Path) -> Result<Self, ParfetchError> {
        let file_name = destination
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| OsString::from(parfetch_types::DEFAULT_FILENAME));

        let mut dir_name = OsString::from(".");
        dir_name.push(&file_name);
        dir_name.push(format!(".{}.parts", Uuid::new_v4().simple()));

        let parent = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let path = parent.join(dir_name);

        tokio::fs::create_dir_all(&path)
            .await
            .map_err(ParfetchError::fs(&path))?;
        debug!("Created staging directory {:?}", path);

        Ok(Self {
            path,
            file_name,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the part file for `range`: `<destination>-<index>`
    pub fn part_path(&self, range: &ByteRange) -> PathBuf {
        let mut name = self.file_name.clone();
        name.push(format!("-{}", range.index));
        self.path.join(name)
    }

    /// Remove the directory and anything left inside it
    pub async fn remove(mut self) -> Result<(), ParfetchError> {
        self.removed = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                debug!("Removed staging directory {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ParfetchError::Filesystem {
                path: self.path.clone(),
                source: e,
            }),
        }
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove staging directory {:?}: {}", self.path, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_staging_dir_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let destination = tmp.path().join("movie,final.mkv");

        let staging = StagingDir::create(&destination).await.unwrap();
        assert!(staging.path().is_dir());
        assert_eq!(staging.path().parent(), Some(tmp.path()));

        let dir_name = staging.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(dir_name.starts_with(".movie,final.mkv."));
        assert!(dir_name.ends_with(".parts"));

        let part = staging.part_path(&ByteRange::new(3, 0, 10));
        assert_eq!(part, staging.path().join("movie,final.mkv-3"));

        let path = staging.path().to_path_buf();
        staging.remove().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_two_downloads_get_distinct_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let destination = tmp.path().join("same.bin");

        let a = StagingDir::create(&destination).await.unwrap();
        let b = StagingDir::create(&destination).await.unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[tokio::test]
    async fn test_drop_removes_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = StagingDir::create(&tmp.path().join("f.bin")).await.unwrap();
        let path = staging.path().to_path_buf();
        tokio::fs::write(staging.part_path(&ByteRange::new(0, 0, 1)), b"x").await.unwrap();

        drop(staging);
        assert!(!path.exists());
    }
}
