//! Remote item adapter
//!
//! Wraps one resolved node together with the item it was reached through.
//! The owner chain is a plain parent link: each item holds its directory
//! ancestor, never its children.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{ProgressSink, RemoteNode, UpdateItem};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::download::DownloadOrchestrator;
use crate::error::Result;
use crate::tree::RemoteTreeCache;

/// A node of the shared folder as seen by the update engine.
#[derive(Clone)]
pub struct RemoteItem {
    node: RemoteNode,
    owner: Option<Arc<RemoteItem>>,
    relative_path: Option<String>,
    tree: Arc<RemoteTreeCache>,
    downloader: Arc<DownloadOrchestrator>,
}

impl RemoteItem {
    /// An item used only as a traversal entry point; it has no relative path.
    pub fn root_bound(
        node: RemoteNode,
        tree: Arc<RemoteTreeCache>,
        downloader: Arc<DownloadOrchestrator>,
    ) -> Self {
        Self {
            node,
            owner: None,
            relative_path: None,
            tree,
            downloader,
        }
    }

    /// An item reached through `owner`.
    pub fn owned_by(node: RemoteNode, owner: Arc<RemoteItem>) -> Self {
        let relative_path = Some(match owner.relative_path() {
            Some(parent) => format!("{}/{}", parent, node.name),
            None => node.name.clone(),
        });

        Self {
            tree: owner.tree.clone(),
            downloader: owner.downloader.clone(),
            node,
            owner: Some(owner),
            relative_path,
        }
    }

    pub fn node(&self) -> &RemoteNode {
        &self.node
    }

    pub fn owner(&self) -> Option<&Arc<RemoteItem>> {
        self.owner.as_ref()
    }

    pub fn relative_path(&self) -> Option<&str> {
        self.relative_path.as_deref()
    }

    /// Direct children from the current snapshot, each owned by this item.
    ///
    /// Fails with `TreeNotLoaded` unless the tree was refreshed beforehand.
    pub async fn children(self: &Arc<Self>) -> Result<Vec<Arc<RemoteItem>>> {
        let snapshot = self.tree.snapshot().await?;

        let children: Vec<Arc<RemoteItem>> = snapshot
            .children_of(&self.node.id)
            .into_iter()
            .map(|child| Arc::new(RemoteItem::owned_by(child.clone(), self.clone())))
            .collect();

        debug!(node = %self.node.id, count = children.len(), "Listed children");
        Ok(children)
    }

    pub async fn download_to(
        &self,
        destination: &Path,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<Option<PathBuf>> {
        self.downloader
            .download(&self.node, destination, progress, cancel)
            .await
    }
}

impl std::fmt::Debug for RemoteItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteItem")
            .field("node", &self.node)
            .field("relative_path", &self.relative_path)
            .finish()
    }
}

#[async_trait]
impl UpdateItem for RemoteItem {
    fn name(&self) -> &str {
        &self.node.name
    }

    fn size(&self) -> u64 {
        self.node.size
    }

    fn modified_at(&self) -> DateTime<Utc> {
        self.node.effective_modified_at()
    }

    fn is_directory(&self) -> bool {
        self.node.is_directory()
    }

    fn is_file(&self) -> bool {
        self.node.is_file()
    }

    fn relative_path(&self) -> Option<&str> {
        RemoteItem::relative_path(self)
    }

    async fn list_children(&self) -> BridgeResult<Vec<Arc<dyn UpdateItem>>> {
        let this = Arc::new(self.clone());
        let children = this.children().await?;
        Ok(children
            .into_iter()
            .map(|child| child as Arc<dyn UpdateItem>)
            .collect())
    }

    async fn download(
        &self,
        destination: &Path,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> BridgeResult<Option<PathBuf>> {
        Ok(self.download_to(destination, progress, cancel).await?)
    }
}
