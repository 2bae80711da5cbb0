//! # Session Manager
//!
//! Owns the connection state machine for the remote backend: decides whether a
//! cached token is still good, whether stored credentials should be used,
//! whether to fall back to anonymous access, and when to bring up the
//! interactive login prompt.
//!
//! ## Concurrency
//!
//! The credentials, session token and anonymous flag are shared by every
//! caller of one manager. [`SessionManager::ensure_session`] runs behind a
//! single-flight lock so concurrent listings and downloads never race token
//! writes or open two login prompts.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::SessionManager;
//! use core_runtime::config::ClientConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(config: ClientConfig) -> core_auth::Result<()> {
//! let sessions = SessionManager::from_config(&config).await;
//!
//! // Passive operations never prompt
//! sessions.ensure_session(false, CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

use crate::credential_store::CredentialStore;
use crate::error::{AuthError, Result};
use crate::types::{AuthState, ConnectState, SessionOrigin};
use bridge_traits::{Credentials, LoginPrompt, PromptOutcome, RemoteBackend, StateStore};
use core_runtime::config::ClientConfig;
use core_runtime::events::{EventBus, SessionEvent};
use core_runtime::{retry_with_policy, RetryPolicy};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Connection state machine and owner of the authentication material
pub struct SessionManager {
    backend: Arc<dyn RemoteBackend>,
    store: CredentialStore,
    prompt: Option<Arc<dyn LoginPrompt>>,
    retry: RetryPolicy,
    events: EventBus,
    email_hint: Option<String>,
    state: RwLock<AuthState>,
    /// Serializes connect attempts
    connect_lock: Mutex<()>,
}

impl SessionManager {
    /// Creates a manager with no authentication material.
    pub fn new(
        backend: Arc<dyn RemoteBackend>,
        state_store: Arc<dyn StateStore>,
        prompt: Option<Arc<dyn LoginPrompt>>,
        retry: RetryPolicy,
        events: EventBus,
    ) -> Self {
        Self {
            backend,
            store: CredentialStore::new(state_store),
            prompt,
            retry,
            events,
            email_hint: None,
            state: RwLock::new(AuthState::default()),
            connect_lock: Mutex::new(()),
        }
    }

    /// Creates a manager seeded from the persisted auth-info and token blobs.
    ///
    /// Missing or unreadable blobs leave the corresponding value absent.
    pub async fn load(
        backend: Arc<dyn RemoteBackend>,
        state_store: Arc<dyn StateStore>,
        prompt: Option<Arc<dyn LoginPrompt>>,
        retry: RetryPolicy,
        events: EventBus,
    ) -> Self {
        let manager = Self::new(backend, state_store, prompt, retry, events);

        let credentials = manager.store.load_credentials().await;
        let token = manager.store.load_token().await;
        info!(
            has_credentials = credentials.is_some(),
            has_token = token.is_some(),
            "Loaded persisted authentication state"
        );

        {
            let mut state = manager.state.write().await;
            state.credentials = credentials;
            state.token = token;
        }

        manager
    }

    /// Creates a manager from the client configuration, loading persisted state.
    ///
    /// Session events go to a new bus sized by `config.event_buffer_size`;
    /// subscribe through [`SessionManager::events`].
    pub async fn from_config(config: &ClientConfig) -> Self {
        let manager = Self::load(
            config.backend.clone(),
            config.state_store.clone(),
            config.login_prompt.clone(),
            config.retry,
            EventBus::new(config.event_buffer_size),
        )
        .await;

        match &config.email_hint {
            Some(hint) => manager.with_email_hint(hint.clone()),
            None => manager,
        }
    }

    /// Email suggested to the login prompt when no stored credentials carry one.
    pub fn with_email_hint(mut self, email: impl Into<String>) -> Self {
        self.email_hint = Some(email.into());
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Replace the stored credentials with explicitly supplied ones.
    ///
    /// Clears the anonymous flag so the next connect attempt uses them.
    pub async fn with_credentials(&self, credentials: Credentials) {
        let _guard = self.connect_lock.lock().await;

        self.store.persist_credentials(Some(&credentials)).await;

        let mut state = self.state.write().await;
        state.credentials = Some(credentials);
        state.anonymous = false;
        info!("Credentials replaced");
    }

    /// Establish a usable session, retrying transient failures.
    ///
    /// With `interactive` set, the login prompt may be shown and a session
    /// that is not backed by verified credentials is re-established.
    ///
    /// # Errors
    ///
    /// - `AuthError::Cancelled` - the token fired or the user dismissed the prompt
    /// - `AuthError::PromptUnavailable` - interactive login needed but no prompt configured
    /// - The last backend error when every attempt failed
    #[instrument(skip(self, cancel))]
    pub async fn ensure_session(
        &self,
        interactive: bool,
        cancel: CancellationToken,
    ) -> Result<SessionOrigin> {
        let _guard = tokio::select! {
            guard = self.connect_lock.lock() => guard,
            _ = cancel.cancelled() => {
                debug!("Cancelled while waiting for connect lock");
                return Err(AuthError::Cancelled);
            }
        };

        let token = &cancel;
        retry_with_policy(&self.retry, &cancel, "ensure session", move || {
            self.connect(interactive, token)
        })
        .await
    }

    /// One pass of the connect state machine.
    async fn connect(
        &self,
        interactive: bool,
        cancel: &CancellationToken,
    ) -> Result<SessionOrigin> {
        let mut state = ConnectState::NotConnected;
        let mut last_error: Option<AuthError> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(AuthError::Cancelled);
            }

            debug!(?state, "Connect step");
            state = match state {
                ConnectState::NotConnected => self.check_current(interactive).await,
                ConnectState::TokenLogin => self.token_login(cancel, &mut last_error).await?,
                ConnectState::CredentialLogin => {
                    self.credential_login(cancel, &mut last_error).await?
                }
                ConnectState::AnonymousLogin => {
                    match self
                        .anonymous_login(interactive, cancel, &mut last_error)
                        .await?
                    {
                        Some(next) => next,
                        None => {
                            let error = last_error.take().unwrap_or(AuthError::NotAuthenticated);
                            self.events.emit(SessionEvent::Unavailable {
                                reason: error.to_string(),
                            });
                            return Err(error);
                        }
                    }
                }
                ConnectState::InteractiveLogin => self.interactive_login(cancel).await?,
                ConnectState::Connected(origin) => return Ok(origin),
            };
        }
    }

    async fn check_current(&self, interactive: bool) -> ConnectState {
        let origin = self.state.read().await.origin;

        match origin {
            Some(origin) if interactive && !origin.is_verified() => {
                info!(%origin, "Interactive caller needs a verified session, reconnecting");
                if let Err(e) = self.backend.logout().await {
                    warn!(error = %e, "Logout before reconnect failed");
                }
                self.state.write().await.origin = None;
                ConnectState::CredentialLogin
            }
            Some(origin) => {
                debug!(%origin, "Session already established");
                ConnectState::Connected(origin)
            }
            None => ConnectState::TokenLogin,
        }
    }

    async fn token_login(
        &self,
        cancel: &CancellationToken,
        last_error: &mut Option<AuthError>,
    ) -> Result<ConnectState> {
        let (token, verified) = {
            let state = self.state.read().await;
            (state.token.clone(), state.token_verified)
        };
        let Some(token) = token else {
            return Ok(ConnectState::CredentialLogin);
        };

        match self.backend.login_with_token(&token, cancel.clone()).await {
            Ok(()) => {
                let origin = if verified {
                    SessionOrigin::Credentials
                } else {
                    SessionOrigin::Token
                };
                Ok(self.connected(origin).await)
            }
            Err(e) if e.is_cancelled() => Err(AuthError::Cancelled),
            Err(e) => {
                warn!(error = %e, "Session token refused, discarding it");
                {
                    let mut state = self.state.write().await;
                    state.token = None;
                    state.token_verified = false;
                }
                self.store.persist_token(None).await;
                self.events.emit(SessionEvent::TokenInvalidated);
                *last_error = Some(e.into());
                Ok(ConnectState::CredentialLogin)
            }
        }
    }

    async fn credential_login(
        &self,
        cancel: &CancellationToken,
        last_error: &mut Option<AuthError>,
    ) -> Result<ConnectState> {
        let (credentials, anonymous) = {
            let state = self.state.read().await;
            (state.credentials.clone(), state.anonymous)
        };

        let credentials = match credentials {
            Some(credentials) if !anonymous => credentials,
            _ => return Ok(ConnectState::AnonymousLogin),
        };

        match self
            .backend
            .login_with_credentials(&credentials, cancel.clone())
            .await
        {
            Ok(token) => {
                {
                    let mut state = self.state.write().await;
                    state.token = Some(token.clone());
                    state.token_verified = true;
                }
                self.store.persist_token(Some(&token)).await;
                Ok(self.connected(SessionOrigin::Credentials).await)
            }
            Err(e) if e.is_cancelled() => Err(AuthError::Cancelled),
            Err(e) => {
                warn!(error = %e, "Credential login failed");
                *last_error = Some(e.into());
                Ok(ConnectState::AnonymousLogin)
            }
        }
    }

    /// Returns `None` when no session can be had without the prompt.
    async fn anonymous_login(
        &self,
        interactive: bool,
        cancel: &CancellationToken,
        last_error: &mut Option<AuthError>,
    ) -> Result<Option<ConnectState>> {
        let anonymous = self.state.read().await.anonymous;

        // Passive callers always get the low-privilege anonymous fallback
        if anonymous || !interactive {
            match self.backend.login_anonymous(cancel.clone()).await {
                Ok(()) => return Ok(Some(self.connected(SessionOrigin::Anonymous).await)),
                Err(e) if e.is_cancelled() => return Err(AuthError::Cancelled),
                Err(e) => {
                    warn!(error = %e, "Anonymous login failed");
                    *last_error = Some(e.into());
                }
            }
        }

        if interactive {
            Ok(Some(ConnectState::InteractiveLogin))
        } else {
            Ok(None)
        }
    }

    async fn interactive_login(&self, cancel: &CancellationToken) -> Result<ConnectState> {
        let prompt = self.prompt.as_ref().ok_or(AuthError::PromptUnavailable)?;

        let hint = {
            let state = self.state.read().await;
            state
                .credentials
                .as_ref()
                .map(|c| c.email().to_string())
                .or_else(|| self.email_hint.clone())
        };

        info!("Requesting interactive login");
        let outcome = prompt
            .prompt(hint.as_deref(), cancel.clone())
            .await
            .map_err(|e| {
                if e.is_cancelled() {
                    AuthError::Cancelled
                } else {
                    AuthError::PromptFailed(e.to_string())
                }
            })?;

        match outcome {
            PromptOutcome::Cancelled => {
                info!("Login prompt dismissed");
                self.events.emit(SessionEvent::PromptCancelled);
                Err(AuthError::Cancelled)
            }
            PromptOutcome::Authenticated { credentials, token } => {
                let anonymous = token.is_none();

                self.store.persist_credentials(Some(&credentials)).await;
                self.store.persist_token(token.as_ref()).await;

                {
                    let mut state = self.state.write().await;
                    state.credentials = Some(credentials);
                    state.token_verified = token.is_some();
                    state.token = token;
                    state.anonymous = anonymous;
                }

                info!(anonymous, "New credentials accepted");
                self.events
                    .emit(SessionEvent::CredentialsStored { anonymous });
                Ok(ConnectState::TokenLogin)
            }
        }
    }

    async fn connected(&self, origin: SessionOrigin) -> ConnectState {
        self.state.write().await.origin = Some(origin);
        info!(%origin, "Session established");
        self.events.emit(SessionEvent::Connected {
            origin: origin.as_str().to_string(),
        });
        ConnectState::Connected(origin)
    }

    /// End the backend session, keeping stored credentials and token.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        let _guard = self.connect_lock.lock().await;

        if !self.state.read().await.is_connected() {
            debug!("Logout requested while not connected");
            return Ok(());
        }

        self.backend.logout().await?;
        self.state.write().await.origin = None;
        self.events.emit(SessionEvent::LoggedOut);
        info!("Logged out");
        Ok(())
    }

    /// Forget the established session after the backend refused it.
    ///
    /// Stored credentials and token are kept, so the next
    /// [`ensure_session`](Self::ensure_session) runs the full connect sequence.
    #[instrument(skip(self))]
    pub async fn mark_disconnected(&self) {
        let _guard = self.connect_lock.lock().await;

        let lost = self.state.write().await.origin.take();
        if let Some(origin) = lost {
            warn!(%origin, "Backend dropped the session");
            self.events.emit(SessionEvent::SessionLost);
        }
    }

    /// Disconnect and erase all authentication material, in memory and on disk.
    #[instrument(skip(self))]
    pub async fn forget(&self) {
        let _guard = self.connect_lock.lock().await;

        let was_connected = self.state.read().await.is_connected();
        if was_connected {
            if let Err(e) = self.backend.logout().await {
                warn!(error = %e, "Logout failed while forgetting session");
            }
        }

        *self.state.write().await = AuthState::default();
        self.store.persist_credentials(None).await;
        self.store.persist_token(None).await;

        if was_connected {
            self.events.emit(SessionEvent::LoggedOut);
        }
        info!("Authentication state cleared");
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.is_connected()
    }

    pub async fn session_origin(&self) -> Option<SessionOrigin> {
        self.state.read().await.origin
    }

    pub async fn is_anonymous(&self) -> bool {
        self.state.read().await.anonymous
    }

    pub async fn has_credentials(&self) -> bool {
        self.state.read().await.credentials.is_some()
    }

    pub async fn has_token(&self) -> bool {
        self.state.read().await.token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::{ProgressSink, RemoteNode, SessionToken};
    use mockall::mock;
    use std::collections::{HashMap, VecDeque};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex as TokioMutex;

    mock! {
        Backend {}

        #[async_trait]
        impl RemoteBackend for Backend {
            async fn login_with_credentials(&self, credentials: &Credentials, cancel: CancellationToken) -> BridgeResult<SessionToken>;
            async fn login_with_token(&self, token: &SessionToken, cancel: CancellationToken) -> BridgeResult<()>;
            async fn login_anonymous(&self, cancel: CancellationToken) -> BridgeResult<()>;
            async fn logout(&self) -> BridgeResult<()>;
            async fn list_nodes(&self, folder_link: &str, cancel: CancellationToken) -> BridgeResult<Vec<RemoteNode>>;
            async fn download(&self, node: &RemoteNode, destination: &Path, progress: ProgressSink, cancel: CancellationToken) -> BridgeResult<()>;
        }
    }

    struct MockStateStore {
        storage: Arc<TokioMutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStateStore {
        fn new() -> Self {
            Self {
                storage: Arc::new(TokioMutex::new(HashMap::new())),
            }
        }
    }

    #[async_trait]
    impl StateStore for MockStateStore {
        async fn save(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
            self.storage
                .lock()
                .await
                .insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn load(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
            Ok(self.storage.lock().await.get(key).cloned())
        }

        async fn delete(&self, key: &str) -> BridgeResult<()> {
            self.storage.lock().await.remove(key);
            Ok(())
        }
    }

    /// Prompt replaying scripted outcomes and recording the hints it saw
    struct ScriptedPrompt {
        outcomes: std::sync::Mutex<VecDeque<PromptOutcome>>,
        hints: std::sync::Mutex<Vec<Option<String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedPrompt {
        fn new(outcomes: Vec<PromptOutcome>) -> Self {
            Self {
                outcomes: std::sync::Mutex::new(outcomes.into()),
                hints: std::sync::Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LoginPrompt for ScriptedPrompt {
        async fn prompt(
            &self,
            email_hint: Option<&str>,
            _cancel: CancellationToken,
        ) -> BridgeResult<PromptOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.hints
                .lock()
                .unwrap()
                .push(email_hint.map(str::to_string));
            tokio::task::yield_now().await;
            Ok(self
                .outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(PromptOutcome::Cancelled))
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(2, Duration::from_millis(1))
    }

    fn rejected() -> BridgeError {
        BridgeError::Rejected("expired".to_string())
    }

    fn manager(backend: MockBackend, prompt: Option<Arc<ScriptedPrompt>>) -> SessionManager {
        SessionManager::new(
            Arc::new(backend),
            Arc::new(MockStateStore::new()),
            prompt.map(|p| p as Arc<dyn LoginPrompt>),
            fast_retry(),
            EventBus::default(),
        )
    }

    async fn seed(manager: &SessionManager, credentials: Option<Credentials>, token: Option<&str>) {
        let mut state = manager.state.write().await;
        state.credentials = credentials;
        state.token = token.map(SessionToken::new);
    }

    #[tokio::test]
    async fn test_valid_token_is_reused_without_network_calls() {
        let mut backend = MockBackend::new();
        backend
            .expect_login_with_token()
            .times(1)
            .returning(|_, _| Ok(()));
        backend.expect_login_with_credentials().times(0);
        backend.expect_login_anonymous().times(0);

        let manager = manager(backend, None);
        seed(&manager, None, Some("tok-1")).await;

        let first = manager.ensure_session(false, CancellationToken::new()).await;
        let second = manager.ensure_session(false, CancellationToken::new()).await;

        assert_eq!(first.unwrap(), SessionOrigin::Token);
        assert_eq!(second.unwrap(), SessionOrigin::Token);
    }

    #[tokio::test]
    async fn test_refused_token_falls_through_to_credentials() {
        let mut backend = MockBackend::new();
        backend
            .expect_login_with_token()
            .times(1)
            .returning(|_, _| Err(rejected()));
        backend
            .expect_login_with_credentials()
            .times(1)
            .returning(|_, _| Ok(SessionToken::new("tok-2")));

        let manager = manager(backend, None);
        let mut events = manager.events().subscribe();
        seed(
            &manager,
            Some(Credentials::derive("user@example.com", "pw")),
            Some("tok-1"),
        )
        .await;

        let origin = manager
            .ensure_session(false, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(origin, SessionOrigin::Credentials);
        assert_eq!(
            manager.state.read().await.token,
            Some(SessionToken::new("tok-2"))
        );
        assert_eq!(events.recv().await.unwrap(), SessionEvent::TokenInvalidated);
        assert_eq!(
            manager.store.load_token().await,
            Some(SessionToken::new("tok-2"))
        );
    }

    #[tokio::test]
    async fn test_refused_token_is_not_retried() {
        let mut backend = MockBackend::new();
        backend
            .expect_login_with_token()
            .times(1)
            .returning(|_, _| Err(rejected()));
        backend
            .expect_login_anonymous()
            .times(3)
            .returning(|_| Err(BridgeError::Network("offline".to_string())));

        let manager = manager(backend, None);
        seed(&manager, None, Some("tok-1")).await;

        let result = manager.ensure_session(false, CancellationToken::new()).await;

        assert!(matches!(
            result,
            Err(AuthError::Backend(BridgeError::Network(_)))
        ));
        assert!(!manager.has_token().await);
    }

    #[tokio::test]
    async fn test_passive_caller_falls_back_to_anonymous() {
        let mut backend = MockBackend::new();
        backend
            .expect_login_anonymous()
            .times(1)
            .returning(|_| Ok(()));

        let prompt = Arc::new(ScriptedPrompt::new(vec![]));
        let manager = manager(backend, Some(prompt.clone()));

        let origin = manager
            .ensure_session(false, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(origin, SessionOrigin::Anonymous);
        assert_eq!(prompt.calls(), 0);
        assert!(!manager.is_anonymous().await);
    }

    #[tokio::test]
    async fn test_anonymous_flag_skips_credential_login() {
        let mut backend = MockBackend::new();
        backend.expect_login_with_credentials().times(0);
        backend
            .expect_login_anonymous()
            .times(1)
            .returning(|_| Ok(()));

        let manager = manager(backend, None);
        seed(&manager, Some(Credentials::derive("a@b.c", "pw")), None).await;
        manager.state.write().await.anonymous = true;

        let origin = manager
            .ensure_session(false, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(origin, SessionOrigin::Anonymous);
    }

    #[tokio::test]
    async fn test_interactive_without_prompt_fails_once() {
        let mut backend = MockBackend::new();
        backend.expect_login_anonymous().times(0);

        let manager = manager(backend, None);

        let result = manager.ensure_session(true, CancellationToken::new()).await;
        assert!(matches!(result, Err(AuthError::PromptUnavailable)));
    }

    #[tokio::test]
    async fn test_interactive_login_persists_and_reconnects() {
        let mut backend = MockBackend::new();
        backend
            .expect_login_with_token()
            .times(1)
            .returning(|token, _| {
                assert_eq!(token.as_str(), "tok-new");
                Ok(())
            });

        let prompt = Arc::new(ScriptedPrompt::new(vec![PromptOutcome::Authenticated {
            credentials: Credentials::derive("user@example.com", "pw"),
            token: Some(SessionToken::new("tok-new")),
        }]));
        let manager = manager(backend, Some(prompt.clone())).with_email_hint("hint@example.com");
        let mut events = manager.events().subscribe();

        let origin = manager
            .ensure_session(true, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(origin, SessionOrigin::Credentials);
        assert_eq!(prompt.calls(), 1);
        assert_eq!(
            prompt.hints.lock().unwrap().clone(),
            vec![Some("hint@example.com".to_string())]
        );
        assert!(!manager.is_anonymous().await);
        assert!(manager.store.load_credentials().await.is_some());
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::CredentialsStored { anonymous: false }
        );

        // A verified session satisfies later interactive callers as-is
        let again = manager.ensure_session(true, CancellationToken::new()).await;
        assert_eq!(again.unwrap(), SessionOrigin::Credentials);
    }

    #[tokio::test]
    async fn test_prompt_without_token_sets_anonymous_flag() {
        let mut backend = MockBackend::new();
        backend.expect_login_with_credentials().times(0);
        backend
            .expect_login_anonymous()
            .times(1)
            .returning(|_| Ok(()));

        let prompt = Arc::new(ScriptedPrompt::new(vec![PromptOutcome::Authenticated {
            credentials: Credentials::derive("user@example.com", "pw"),
            token: None,
        }]));
        let manager = manager(backend, Some(prompt.clone()));

        let origin = manager
            .ensure_session(true, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(origin, SessionOrigin::Anonymous);
        assert!(manager.is_anonymous().await);
        assert!(!manager.has_token().await);
    }

    #[tokio::test]
    async fn test_cancelled_prompt_aborts_without_retry() {
        let backend = MockBackend::new();
        let prompt = Arc::new(ScriptedPrompt::new(vec![PromptOutcome::Cancelled]));
        let manager = manager(backend, Some(prompt.clone()));
        let mut events = manager.events().subscribe();

        let result = manager.ensure_session(true, CancellationToken::new()).await;

        assert!(matches!(result, Err(AuthError::Cancelled)));
        assert_eq!(prompt.calls(), 1);
        assert_eq!(events.recv().await.unwrap(), SessionEvent::PromptCancelled);
    }

    #[tokio::test]
    async fn test_cancelled_token_makes_no_calls() {
        let mut backend = MockBackend::new();
        backend.expect_login_with_token().times(0);
        backend.expect_login_anonymous().times(0);

        let manager = manager(backend, None);
        seed(&manager, None, Some("tok-1")).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = manager.ensure_session(false, cancel).await;
        assert!(matches!(result, Err(AuthError::Cancelled)));
        assert!(manager.has_token().await);
    }

    #[tokio::test]
    async fn test_backend_cancellation_is_not_retried() {
        let mut backend = MockBackend::new();
        backend
            .expect_login_anonymous()
            .times(1)
            .returning(|_| Err(BridgeError::Cancelled));

        let manager = manager(backend, None);

        let result = manager.ensure_session(false, CancellationToken::new()).await;
        assert!(matches!(result, Err(AuthError::Cancelled)));
    }

    #[tokio::test]
    async fn test_interactive_caller_reconnects_anonymous_session() {
        let mut backend = MockBackend::new();
        backend
            .expect_login_anonymous()
            .times(1)
            .returning(|_| Ok(()));
        backend.expect_logout().times(1).returning(|| Ok(()));
        backend
            .expect_login_with_credentials()
            .times(1)
            .returning(|_, _| Ok(SessionToken::new("tok-1")));

        let manager = manager(backend, None);

        let passive = manager.ensure_session(false, CancellationToken::new()).await;
        assert_eq!(passive.unwrap(), SessionOrigin::Anonymous);

        manager
            .with_credentials(Credentials::derive("user@example.com", "pw"))
            .await;
        let interactive = manager.ensure_session(true, CancellationToken::new()).await;
        assert_eq!(interactive.unwrap(), SessionOrigin::Credentials);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_prompt() {
        let mut backend = MockBackend::new();
        backend
            .expect_login_with_token()
            .times(1)
            .returning(|_, _| Ok(()));

        let prompt = Arc::new(ScriptedPrompt::new(vec![PromptOutcome::Authenticated {
            credentials: Credentials::derive("user@example.com", "pw"),
            token: Some(SessionToken::new("tok-1")),
        }]));
        let manager = manager(backend, Some(prompt.clone()));

        let (first, second) = tokio::join!(
            manager.ensure_session(true, CancellationToken::new()),
            manager.ensure_session(true, CancellationToken::new()),
        );

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(prompt.calls(), 1);
    }

    #[tokio::test]
    async fn test_logout_keeps_material_and_forget_clears_it() {
        let mut backend = MockBackend::new();
        backend
            .expect_login_with_credentials()
            .times(1)
            .returning(|_, _| Ok(SessionToken::new("tok-1")));
        backend
            .expect_login_with_token()
            .times(1)
            .returning(|_, _| Ok(()));
        backend.expect_logout().times(2).returning(|| Ok(()));

        let manager = manager(backend, None);
        manager
            .with_credentials(Credentials::derive("user@example.com", "pw"))
            .await;

        manager
            .ensure_session(false, CancellationToken::new())
            .await
            .unwrap();
        manager.logout().await.unwrap();

        assert!(!manager.is_connected().await);
        assert!(manager.has_credentials().await);
        assert!(manager.has_token().await);

        manager
            .ensure_session(false, CancellationToken::new())
            .await
            .unwrap();
        manager.forget().await;

        assert!(!manager.is_connected().await);
        assert!(!manager.has_credentials().await);
        assert!(!manager.has_token().await);
        assert!(manager.store.load_credentials().await.is_none());
        assert!(manager.store.load_token().await.is_none());
    }

    #[tokio::test]
    async fn test_load_reads_persisted_state() {
        let store: Arc<dyn StateStore> = Arc::new(MockStateStore::new());
        let credential_store = CredentialStore::new(store.clone());
        credential_store
            .persist_credentials(Some(&Credentials::derive("user@example.com", "pw")))
            .await;
        credential_store
            .persist_token(Some(&SessionToken::new("tok-1")))
            .await;

        let manager = SessionManager::load(
            Arc::new(MockBackend::new()),
            store,
            None,
            fast_retry(),
            EventBus::default(),
        )
        .await;

        assert!(manager.has_credentials().await);
        assert!(manager.has_token().await);
        assert!(!manager.is_connected().await);
        assert_eq!(manager.session_origin().await, None);
    }

    #[tokio::test]
    async fn test_interactive_caller_reverifies_restored_token_session() {
        let mut backend = MockBackend::new();
        backend
            .expect_login_with_token()
            .times(1)
            .returning(|_, _| Ok(()));
        backend.expect_logout().times(1).returning(|| Ok(()));
        backend
            .expect_login_with_credentials()
            .times(1)
            .returning(|_, _| Ok(SessionToken::new("tok-2")));
        backend.expect_login_anonymous().times(0);

        let manager = manager(backend, None);
        seed(
            &manager,
            Some(Credentials::derive("user@example.com", "pw")),
            Some("tok-1"),
        )
        .await;

        let passive = manager.ensure_session(false, CancellationToken::new()).await;
        assert_eq!(passive.unwrap(), SessionOrigin::Token);

        let interactive = manager.ensure_session(true, CancellationToken::new()).await;
        assert_eq!(interactive.unwrap(), SessionOrigin::Credentials);
        assert_eq!(
            manager.state.read().await.token,
            Some(SessionToken::new("tok-2"))
        );
    }

    #[tokio::test]
    async fn test_lost_session_reconnects_on_next_call() {
        let mut backend = MockBackend::new();
        backend
            .expect_login_with_credentials()
            .times(1)
            .returning(|_, _| Ok(SessionToken::new("tok-1")));
        backend
            .expect_login_with_token()
            .times(1)
            .returning(|_, _| Ok(()));
        backend.expect_logout().times(0);

        let manager = manager(backend, None);
        manager
            .with_credentials(Credentials::derive("user@example.com", "pw"))
            .await;
        let mut events = manager.events().subscribe();

        manager
            .ensure_session(true, CancellationToken::new())
            .await
            .unwrap();
        manager.mark_disconnected().await;

        assert!(!manager.is_connected().await);
        assert!(manager.has_credentials().await);
        assert!(manager.has_token().await);

        // The token from this run still counts as verified
        let origin = manager
            .ensure_session(true, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(origin, SessionOrigin::Credentials);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(seen.contains(&SessionEvent::SessionLost));
    }

    #[tokio::test]
    async fn test_mark_disconnected_without_session_is_quiet() {
        let manager = manager(MockBackend::new(), None);
        let mut events = manager.events().subscribe();

        manager.mark_disconnected().await;

        assert!(!manager.is_connected().await);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_from_config_sizes_event_bus() {
        let config = ClientConfig::builder()
            .folder_link("https://mega.nz/folder/AbCd#key")
            .backend(Arc::new(MockBackend::new()))
            .state_store(Arc::new(MockStateStore::new()))
            .event_buffer_size(1)
            .email_hint("user@example.com")
            .build()
            .unwrap();

        let manager = SessionManager::from_config(&config).await;
        let mut events = manager.events().subscribe();
        manager.events().emit(SessionEvent::TokenInvalidated);
        manager.events().emit(SessionEvent::LoggedOut);

        assert!(matches!(
            events.recv().await,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(manager.email_hint.as_deref(), Some("user@example.com"));
    }
}
