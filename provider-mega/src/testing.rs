//! Shared fixtures for unit tests

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{
    Credentials, ProgressSink, RemoteBackend, RemoteNode, SessionToken, StateStore,
};
use core_auth::SessionManager;
use core_runtime::config::FolderLink;
use core_runtime::events::EventBus;
use core_runtime::RetryPolicy;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::source::MegaUpdateSource;
use crate::tree::tests::mods_listing;

pub(crate) const TEST_LINK: &str = "https://mega.nz/folder/TestFolder#secretkey";

/// Backend serving a fixed listing and counting calls per operation
pub(crate) struct FakeBackend {
    listing: Vec<RemoteNode>,
    listing_error: Mutex<Option<String>>,
    rejected_listings: Mutex<usize>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl FakeBackend {
    pub(crate) fn new(listing: Vec<RemoteNode>) -> Self {
        Self {
            listing,
            listing_error: Mutex::new(None),
            rejected_listings: Mutex::new(0),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn with_mods_listing() -> Self {
        Self::new(mods_listing())
    }

    pub(crate) fn fail_listing(&self, message: &str) {
        *self.listing_error.lock().unwrap() = Some(message.to_string());
    }

    /// Refuse the next `count` listings as if the session had expired.
    pub(crate) fn reject_listings(&self, count: usize) {
        *self.rejected_listings.lock().unwrap() = count;
    }

    pub(crate) fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    fn record(&self, operation: &'static str) {
        *self.calls.lock().unwrap().entry(operation).or_insert(0) += 1;
    }
}

#[async_trait]
impl RemoteBackend for FakeBackend {
    async fn login_with_credentials(
        &self,
        _credentials: &Credentials,
        _cancel: CancellationToken,
    ) -> BridgeResult<SessionToken> {
        self.record("login_with_credentials");
        Ok(SessionToken::new("tok"))
    }

    async fn login_with_token(
        &self,
        _token: &SessionToken,
        _cancel: CancellationToken,
    ) -> BridgeResult<()> {
        self.record("login_with_token");
        Ok(())
    }

    async fn login_anonymous(&self, cancel: CancellationToken) -> BridgeResult<()> {
        self.record("login_anonymous");
        if cancel.is_cancelled() {
            return Err(BridgeError::Cancelled);
        }
        Ok(())
    }

    async fn logout(&self) -> BridgeResult<()> {
        self.record("logout");
        Ok(())
    }

    async fn list_nodes(
        &self,
        folder_link: &str,
        _cancel: CancellationToken,
    ) -> BridgeResult<Vec<RemoteNode>> {
        self.record("list_nodes");
        assert_eq!(folder_link, TEST_LINK);
        if let Some(message) = self.listing_error.lock().unwrap().clone() {
            return Err(BridgeError::Network(message));
        }
        {
            let mut rejected = self.rejected_listings.lock().unwrap();
            if *rejected > 0 {
                *rejected -= 1;
                return Err(BridgeError::Rejected("session expired".to_string()));
            }
        }
        Ok(self.listing.clone())
    }

    async fn download(
        &self,
        _node: &RemoteNode,
        _destination: &Path,
        progress: ProgressSink,
        _cancel: CancellationToken,
    ) -> BridgeResult<()> {
        self.record("download");
        progress(0.5);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn save(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        self.blobs
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn load(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        Ok(self.blobs.lock().unwrap().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> BridgeResult<()> {
        self.blobs.lock().unwrap().remove(key);
        Ok(())
    }
}

pub(crate) fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(2, Duration::from_millis(1))
}

/// Source over `backend` with in-memory state and no login prompt
pub(crate) fn source_with(backend: FakeBackend) -> (MegaUpdateSource, Arc<FakeBackend>) {
    let backend = Arc::new(backend);
    let sessions = Arc::new(SessionManager::new(
        backend.clone(),
        Arc::new(MemoryStore::default()),
        None,
        fast_retry(),
        EventBus::default(),
    ));
    let link = FolderLink::parse(TEST_LINK, "mega.nz").unwrap();
    let source = MegaUpdateSource::new(backend.clone(), sessions, link, fast_retry());
    (source, backend)
}
