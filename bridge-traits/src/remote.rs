//! Remote Storage Backend Abstractions
//!
//! The node model of a shared remote folder and the opaque backend API used
//! to log in, enumerate and download. The wire protocol lives behind
//! [`RemoteBackend`]; the core only sequences calls to it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::auth::{Credentials, SessionToken};
use crate::error::Result;

/// Opaque identity of a remote node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeHandle(String);

impl NodeHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeHandle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Kind of a remote node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Root,
    Directory,
    File,
}

/// One entry of a backend-provided flat listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNode {
    pub id: NodeHandle,
    /// `None` only for the root node
    pub parent_id: Option<NodeHandle>,
    pub kind: NodeKind,
    pub name: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl RemoteNode {
    /// Modification time if the backend reported one, creation time otherwise.
    pub fn effective_modified_at(&self) -> DateTime<Utc> {
        self.modified_at.unwrap_or(self.created_at)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory | NodeKind::Root)
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }
}

/// Receives download progress as a fraction in `0.0..=1.0`.
pub type ProgressSink = Arc<dyn Fn(f64) + Send + Sync>;

/// Remote storage backend API
///
/// Every call is a suspension point and must honour the cancellation token by
/// returning [`BridgeError::Cancelled`](crate::error::BridgeError::Cancelled).
/// A refused login must be reported as
/// [`BridgeError::Rejected`](crate::error::BridgeError::Rejected).
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Log in with long-lived credentials, yielding a fresh session token.
    async fn login_with_credentials(
        &self,
        credentials: &Credentials,
        cancel: CancellationToken,
    ) -> Result<SessionToken>;

    /// Resume a session from a previously issued token.
    async fn login_with_token(&self, token: &SessionToken, cancel: CancellationToken)
        -> Result<()>;

    /// Open a session without any identity.
    async fn login_anonymous(&self, cancel: CancellationToken) -> Result<()>;

    async fn logout(&self) -> Result<()>;

    /// Fetch the complete ordered node listing behind a folder link.
    async fn list_nodes(&self, folder_link: &str, cancel: CancellationToken)
        -> Result<Vec<RemoteNode>>;

    /// Stream a file node's content to `destination`.
    async fn download(
        &self,
        node: &RemoteNode,
        destination: &Path,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn node(kind: NodeKind, modified_at: Option<DateTime<Utc>>) -> RemoteNode {
        RemoteNode {
            id: NodeHandle::new("n1"),
            parent_id: Some(NodeHandle::new("root")),
            kind,
            name: "a.zip".to_string(),
            size: 10,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            modified_at,
        }
    }

    #[test]
    fn test_effective_modified_falls_back_to_created() {
        let created_only = node(NodeKind::File, None);
        assert_eq!(
            created_only.effective_modified_at(),
            created_only.created_at
        );

        let modified = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(
            node(NodeKind::File, Some(modified)).effective_modified_at(),
            modified
        );
    }

    #[test]
    fn test_kind_classification() {
        assert!(node(NodeKind::File, None).is_file());
        assert!(!node(NodeKind::File, None).is_directory());
        assert!(node(NodeKind::Directory, None).is_directory());
        assert!(node(NodeKind::Root, None).is_directory());
    }
}
