//! Remote tree snapshot and cache
//!
//! The backend hands back the whole shared folder as one flat, ordered
//! listing. [`TreeSnapshot`] indexes it by parent so the hierarchy can be
//! walked on demand; [`RemoteTreeCache`] replaces the snapshot wholesale on
//! every refresh.

use bridge_traits::{NodeHandle, NodeKind, RemoteBackend, RemoteNode};
use core_auth::SessionManager;
use core_runtime::config::FolderLink;
use core_runtime::{retry_with_policy, RetryPolicy};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{MegaError, Result};

/// Immutable, indexed listing of one shared folder.
#[derive(Debug)]
pub struct TreeSnapshot {
    nodes: Vec<RemoteNode>,
    by_id: HashMap<NodeHandle, usize>,
    children: HashMap<NodeHandle, Vec<usize>>,
    root: usize,
}

impl TreeSnapshot {
    /// Index a listing, rejecting it unless it has exactly one root and
    /// every other node's parent is part of the listing.
    pub fn new(nodes: Vec<RemoteNode>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(nodes.len());
        let mut root = None;

        for (position, node) in nodes.iter().enumerate() {
            if by_id.insert(node.id.clone(), position).is_some() {
                return Err(MegaError::InvalidSnapshot(format!(
                    "duplicate node id {}",
                    node.id
                )));
            }

            if node.kind == NodeKind::Root {
                if root.is_some() {
                    return Err(MegaError::InvalidSnapshot(
                        "more than one root node".to_string(),
                    ));
                }
                root = Some(position);
            }
        }

        let root = root
            .ok_or_else(|| MegaError::InvalidSnapshot("no root node".to_string()))?;

        let mut children: HashMap<NodeHandle, Vec<usize>> = HashMap::new();
        for (position, node) in nodes.iter().enumerate() {
            if position == root {
                continue;
            }

            let parent = node.parent_id.as_ref().ok_or_else(|| {
                MegaError::InvalidSnapshot(format!("node {} has no parent", node.id))
            })?;

            if !by_id.contains_key(parent) {
                return Err(MegaError::InvalidSnapshot(format!(
                    "node {} references unknown parent {}",
                    node.id, parent
                )));
            }

            children.entry(parent.clone()).or_default().push(position);
        }

        Ok(Self {
            nodes,
            by_id,
            children,
            root,
        })
    }

    pub fn root(&self) -> &RemoteNode {
        &self.nodes[self.root]
    }

    pub fn get(&self, id: &NodeHandle) -> Option<&RemoteNode> {
        self.by_id.get(id).map(|&position| &self.nodes[position])
    }

    /// Nodes whose parent is `id`, in listing order.
    pub fn children_of(&self, id: &NodeHandle) -> Vec<&RemoteNode> {
        self.children
            .get(id)
            .map(|positions| positions.iter().map(|&p| &self.nodes[p]).collect())
            .unwrap_or_default()
    }

    pub fn nodes(&self) -> &[RemoteNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Holds the latest snapshot of the shared folder.
pub struct RemoteTreeCache {
    backend: Arc<dyn RemoteBackend>,
    sessions: Arc<SessionManager>,
    folder_link: FolderLink,
    retry: RetryPolicy,
    snapshot: RwLock<Option<Arc<TreeSnapshot>>>,
}

impl RemoteTreeCache {
    pub fn new(
        backend: Arc<dyn RemoteBackend>,
        sessions: Arc<SessionManager>,
        folder_link: FolderLink,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            sessions,
            folder_link,
            retry,
            snapshot: RwLock::new(None),
        }
    }

    pub fn folder_link(&self) -> &FolderLink {
        &self.folder_link
    }

    /// Fetch a fresh listing and replace the snapshot.
    ///
    /// Establishes a non-interactive session first. On failure the previous
    /// snapshot is discarded as well.
    #[instrument(skip(self, cancel), fields(folder = %self.folder_link))]
    pub async fn refresh(&self, cancel: CancellationToken) -> Result<Arc<TreeSnapshot>> {
        let result = self.fetch(&cancel).await;

        let mut slot = self.snapshot.write().await;
        match result {
            Ok(snapshot) => {
                info!(nodes = snapshot.len(), "Remote tree refreshed");
                *slot = Some(snapshot.clone());
                Ok(snapshot)
            }
            Err(e) => {
                if e.is_cancelled() {
                    debug!("Remote tree refresh cancelled");
                } else {
                    warn!(error = %e, "Remote tree refresh failed");
                }
                *slot = None;
                Err(e)
            }
        }
    }

    /// Every attempt re-checks the session, so a session the backend dropped
    /// mid-listing is re-established by the next attempt.
    async fn fetch(&self, cancel: &CancellationToken) -> Result<Arc<TreeSnapshot>> {
        let backend = &self.backend;
        let sessions = &self.sessions;
        let link = self.folder_link.as_str();
        retry_with_policy(&self.retry, cancel, "list remote tree", move || async move {
            sessions.ensure_session(false, cancel.clone()).await?;

            match backend.list_nodes(link, cancel.clone()).await {
                Ok(nodes) => TreeSnapshot::new(nodes).map(Arc::new),
                Err(e) if e.is_rejected() => {
                    sessions.mark_disconnected().await;
                    Err(e.into())
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    /// The current snapshot, or `TreeNotLoaded` before a successful refresh.
    pub async fn snapshot(&self) -> Result<Arc<TreeSnapshot>> {
        self.snapshot
            .read()
            .await
            .clone()
            .ok_or(MegaError::TreeNotLoaded)
    }

    pub async fn invalidate(&self) {
        *self.snapshot.write().await = None;
    }
}
