//! File-backed state persistence using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::StateStore,
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// File extension used for persisted blobs
const BLOB_EXTENSION: &str = "json";

/// Directory-backed blob store
///
/// Each key maps to `<dir>/<key>.json`. Writes go through a temporary file
/// and a rename so a crash never leaves a half-written blob behind.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(BridgeError::OperationFailed(format!(
                "Invalid state key: {:?}",
                key
            )));
        }
        Ok(self.dir.join(format!("{}.{}", key, BLOB_EXTENSION)))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn save(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.blob_path(key)?;
        fs::create_dir_all(&self.dir).await?;

        let tmp_path = path.with_extension(format!("{}.tmp", BLOB_EXTENSION));
        fs::write(&tmp_path, value).await?;
        fs::rename(&tmp_path, &path).await?;

        debug!(key = key, size = value.len(), "Saved state blob");
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.blob_path(key)?;
        match fs::read(&path).await {
            Ok(data) => {
                debug!(key = key, size = data.len(), "Loaded state blob");
                Ok(Some(data))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(key = key, "State blob not found");
                Ok(None)
            }
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.blob_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = key, "Deleted state blob");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }
}
