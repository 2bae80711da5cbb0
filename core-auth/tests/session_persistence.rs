//! Session manager against a file-backed state store

use async_trait::async_trait;
use bridge_desktop::FileStateStore;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{
    Credentials, LoginPrompt, ProgressSink, PromptOutcome, RemoteBackend, RemoteNode,
    SessionToken, StateStore,
};
use core_auth::{SessionManager, SessionOrigin};
use core_runtime::events::EventBus;
use core_runtime::RetryPolicy;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Backend accepting exactly one token and one set of credentials
struct FakeBackend {
    valid_token: Mutex<String>,
    valid_credentials: Credentials,
    token_logins: AtomicUsize,
    credential_logins: AtomicUsize,
}

impl FakeBackend {
    fn new(valid_token: &str, valid_credentials: Credentials) -> Self {
        Self {
            valid_token: Mutex::new(valid_token.to_string()),
            valid_credentials,
            token_logins: AtomicUsize::new(0),
            credential_logins: AtomicUsize::new(0),
        }
    }

    fn expire_tokens(&self, next: &str) {
        *self.valid_token.lock().unwrap() = next.to_string();
    }
}

#[async_trait]
impl RemoteBackend for FakeBackend {
    async fn login_with_credentials(
        &self,
        credentials: &Credentials,
        _cancel: CancellationToken,
    ) -> BridgeResult<SessionToken> {
        self.credential_logins.fetch_add(1, Ordering::SeqCst);
        if *credentials == self.valid_credentials {
            Ok(SessionToken::new(self.valid_token.lock().unwrap().clone()))
        } else {
            Err(BridgeError::Rejected("bad password".to_string()))
        }
    }

    async fn login_with_token(
        &self,
        token: &SessionToken,
        _cancel: CancellationToken,
    ) -> BridgeResult<()> {
        self.token_logins.fetch_add(1, Ordering::SeqCst);
        if token.as_str() == self.valid_token.lock().unwrap().as_str() {
            Ok(())
        } else {
            Err(BridgeError::Rejected("expired".to_string()))
        }
    }

    async fn login_anonymous(&self, _cancel: CancellationToken) -> BridgeResult<()> {
        Ok(())
    }

    async fn logout(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn list_nodes(
        &self,
        _folder_link: &str,
        _cancel: CancellationToken,
    ) -> BridgeResult<Vec<RemoteNode>> {
        Ok(Vec::new())
    }

    async fn download(
        &self,
        _node: &RemoteNode,
        _destination: &Path,
        _progress: ProgressSink,
        _cancel: CancellationToken,
    ) -> BridgeResult<()> {
        Ok(())
    }
}

struct FixedPrompt(Credentials);

#[async_trait]
impl LoginPrompt for FixedPrompt {
    async fn prompt(
        &self,
        _email_hint: Option<&str>,
        _cancel: CancellationToken,
    ) -> BridgeResult<PromptOutcome> {
        Ok(PromptOutcome::Authenticated {
            credentials: self.0.clone(),
            token: None,
        })
    }
}

fn policy() -> RetryPolicy {
    RetryPolicy::new(2, Duration::from_millis(1))
}

async fn load(
    backend: Arc<FakeBackend>,
    store: Arc<dyn StateStore>,
    prompt: Option<Arc<dyn LoginPrompt>>,
) -> SessionManager {
    SessionManager::load(backend, store, prompt, policy(), EventBus::default()).await
}

#[tokio::test]
async fn test_token_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let credentials = Credentials::derive("user@example.com", "pw");
    let backend = Arc::new(FakeBackend::new("tok-1", credentials.clone()));
    let store: Arc<dyn StateStore> = Arc::new(FileStateStore::new(dir.path()));

    let first = load(backend.clone(), store.clone(), None).await;
    first.with_credentials(credentials).await;
    let origin = first
        .ensure_session(false, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(origin, SessionOrigin::Credentials);

    // A new process resumes from the persisted token
    let second = load(backend.clone(), store, None).await;
    let origin = second
        .ensure_session(false, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(origin, SessionOrigin::Token);
    assert_eq!(backend.credential_logins.load(Ordering::SeqCst), 1);
    assert_eq!(backend.token_logins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_expired_token_is_replaced_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let credentials = Credentials::derive("user@example.com", "pw");
    let backend = Arc::new(FakeBackend::new("tok-1", credentials.clone()));
    let store: Arc<dyn StateStore> = Arc::new(FileStateStore::new(dir.path()));

    let first = load(backend.clone(), store.clone(), None).await;
    first.with_credentials(credentials).await;
    first
        .ensure_session(false, CancellationToken::new())
        .await
        .unwrap();

    backend.expire_tokens("tok-2");

    let second = load(backend.clone(), store.clone(), None).await;
    let origin = second
        .ensure_session(false, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(origin, SessionOrigin::Credentials);

    let third = load(backend.clone(), store, None).await;
    assert_eq!(
        third
            .ensure_session(false, CancellationToken::new())
            .await
            .unwrap(),
        SessionOrigin::Token
    );
    // tok-1 refused once, then tok-2 accepted once
    assert_eq!(backend.token_logins.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_prompt_credentials_are_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let credentials = Credentials::derive("user@example.com", "pw");
    let backend = Arc::new(FakeBackend::new("tok-1", credentials.clone()));
    let store: Arc<dyn StateStore> = Arc::new(FileStateStore::new(dir.path()));
    let prompt: Arc<dyn LoginPrompt> = Arc::new(FixedPrompt(credentials));

    let manager = load(backend.clone(), store.clone(), Some(prompt)).await;
    let origin = manager
        .ensure_session(true, CancellationToken::new())
        .await
        .unwrap();

    // No token from the prompt means the user chose anonymous access
    assert_eq!(origin, SessionOrigin::Anonymous);
    assert!(store.contains("auth_info").await.unwrap());
    assert!(!store.contains("session_token").await.unwrap());

    let reloaded = load(backend, store, None).await;
    assert!(reloaded.has_credentials().await);
    assert!(!reloaded.is_anonymous().await);
}
