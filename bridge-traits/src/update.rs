//! Update Engine Contracts
//!
//! The surface a generic update engine consumes: a source that resolves a
//! root path and the items it hands back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::remote::ProgressSink;

/// A remote file or directory as seen by the update engine.
#[async_trait]
pub trait UpdateItem: Send + Sync {
    fn name(&self) -> &str;

    fn size(&self) -> u64;

    fn modified_at(&self) -> DateTime<Utc>;

    fn is_directory(&self) -> bool;

    fn is_file(&self) -> bool;

    /// Slash-joined path relative to the traversal root.
    ///
    /// `None` for items used only as traversal entry points.
    fn relative_path(&self) -> Option<&str>;

    /// List the direct children of a directory item.
    async fn list_children(&self) -> Result<Vec<Arc<dyn UpdateItem>>>;

    /// Download the item to `destination`.
    ///
    /// Returns `Ok(None)` when no file was produced; the failure has already
    /// been logged. Cancellation is reported as an error.
    async fn download(
        &self,
        destination: &Path,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<Option<PathBuf>>;
}

/// Entry point resolving the root item of an update cycle.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Resolve `relative_path` against a freshly fetched remote tree.
    ///
    /// Returns `Ok(None)` if no node matches the path.
    async fn get_update_root(
        &self,
        relative_path: &str,
        cancel: CancellationToken,
    ) -> Result<Option<Arc<dyn UpdateItem>>>;
}
