//! Update source entry point
//!
//! Ties the session manager, tree cache and downloader together and exposes
//! them to the update engine through [`UpdateSource`].

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{RemoteBackend, UpdateItem, UpdateSource};
use core_auth::SessionManager;
use core_runtime::config::{ClientConfig, FolderLink};
use core_runtime::RetryPolicy;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::download::DownloadOrchestrator;
use crate::error::Result;
use crate::item::RemoteItem;
use crate::resolver;
use crate::tree::{RemoteTreeCache, TreeSnapshot};

/// Update source backed by a MEGA shared folder.
///
/// # Example
///
/// ```ignore
/// use provider_mega::MegaUpdateSource;
/// use bridge_traits::UpdateSource;
///
/// let source = MegaUpdateSource::from_config(&config).await;
/// if let Some(root) = source.get_update_root("mods", cancel.clone()).await? {
///     for child in root.list_children().await? {
///         println!("{:?}", child.relative_path());
///     }
/// }
/// ```
pub struct MegaUpdateSource {
    sessions: Arc<SessionManager>,
    tree: Arc<RemoteTreeCache>,
    downloader: Arc<DownloadOrchestrator>,
}

impl MegaUpdateSource {
    pub fn new(
        backend: Arc<dyn RemoteBackend>,
        sessions: Arc<SessionManager>,
        folder_link: FolderLink,
        retry: RetryPolicy,
    ) -> Self {
        let tree = Arc::new(RemoteTreeCache::new(
            backend.clone(),
            sessions.clone(),
            folder_link,
            retry,
        ));
        let downloader = Arc::new(DownloadOrchestrator::new(backend, sessions.clone()));

        Self {
            sessions,
            tree,
            downloader,
        }
    }

    /// Build the source from configuration, loading persisted auth state.
    pub async fn from_config(config: &ClientConfig) -> Self {
        let sessions = Arc::new(SessionManager::from_config(config).await);
        Self::new(
            config.backend.clone(),
            sessions,
            config.folder_link.clone(),
            config.retry,
        )
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn tree(&self) -> &Arc<RemoteTreeCache> {
        &self.tree
    }

    pub async fn refresh(&self, cancel: CancellationToken) -> Result<Arc<TreeSnapshot>> {
        self.tree.refresh(cancel).await
    }

    /// Refresh the tree and resolve `relative_path` to a root-bound item.
    #[instrument(skip(self, cancel))]
    pub async fn root_item(
        &self,
        relative_path: &str,
        cancel: CancellationToken,
    ) -> Result<Option<Arc<RemoteItem>>> {
        let snapshot = self.tree.refresh(cancel).await?;

        match resolver::resolve(&snapshot, relative_path) {
            Some(node) => {
                info!(node = %node.id, "Update root resolved");
                Ok(Some(Arc::new(RemoteItem::root_bound(
                    node.clone(),
                    self.tree.clone(),
                    self.downloader.clone(),
                ))))
            }
            None => {
                info!("Update root not found");
                Ok(None)
            }
        }
    }

    /// Resolve `relative_path` in the current snapshot, keeping the full owner
    /// chain so the item's relative path reproduces the resolved path.
    pub async fn resolve_item(&self, relative_path: &str) -> Result<Option<Arc<RemoteItem>>> {
        let snapshot = self.tree.snapshot().await?;

        let Some(chain) = resolver::resolve_chain(&snapshot, relative_path) else {
            debug!(relative_path, "Path not found");
            return Ok(None);
        };

        let mut item = Arc::new(RemoteItem::root_bound(
            snapshot.root().clone(),
            self.tree.clone(),
            self.downloader.clone(),
        ));
        for node in chain {
            item = Arc::new(RemoteItem::owned_by(node.clone(), item));
        }

        Ok(Some(item))
    }
}

#[async_trait]
impl UpdateSource for MegaUpdateSource {
    async fn get_update_root(
        &self,
        relative_path: &str,
        cancel: CancellationToken,
    ) -> BridgeResult<Option<Arc<dyn UpdateItem>>> {
        let item = self.root_item(relative_path, cancel).await?;
        Ok(item.map(|item| item as Arc<dyn UpdateItem>))
    }
}
