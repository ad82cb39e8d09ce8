//! File-backed SnapshotStore implementation

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::SnapshotStore;
use crate::error::StoreError;

/// Extension of snapshot files
const SNAPSHOT_EXTENSION: &str = "json";

/// One file per key inside a directory
///
/// Keys are percent-encoded into file names, so any key round-trips through
/// [`SnapshotStore::scan`]. Writes go to a temporary file first and are then
/// renamed over the target.
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", urlencoding::encode(key), SNAPSHOT_EXTENSION))
    }

    fn key_for(file_name: &str) -> Option<String> {
        let stem = file_name.strip_suffix(&format!(".{SNAPSHOT_EXTENSION}"))?;
        urlencoding::decode(stem).ok().map(|k| k.into_owned())
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let target = self.path_for(key);
        let tmp = target.with_extension(format!("{SNAPSHOT_EXTENSION}.tmp"));

        fs::write(&tmp, value).await?;
        fs::rename(&tmp, &target).await?;
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(key) = file_name.to_str().and_then(Self::key_for) else {
                continue;
            };
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }

        Ok(keys)
    }

    async fn delete(&self, keys: &[String]) -> Result<usize, StoreError> {
        let mut removed = 0;
        for key in keys {
            match fs::remove_file(self.path_for(key)).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }
}
