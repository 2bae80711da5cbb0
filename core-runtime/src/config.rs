//! # Client Configuration
//!
//! Builder-based configuration for the update-source client.
//!
//! ## Overview
//!
//! [`ClientConfig`] holds the collaborators (remote backend, state store,
//! login prompt) and settings (folder link, retry policy, state directory)
//! the core needs. The builder fails fast: a folder link that does not point
//! at the expected backend host, or a missing required bridge, is reported
//! at construction and never retried.
//!
//! When the `desktop-shims` feature is enabled and no `StateStore` is
//! injected, a `FileStateStore` rooted at the state directory is used.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::ClientConfig;
//!
//! let config = ClientConfig::builder()
//!     .folder_link("https://mega.nz/folder/AbCdEfGh#key")
//!     .state_dir(ClientConfig::default_state_dir()?)
//!     .backend(backend)
//!     .login_prompt(prompt)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use bridge_traits::{LoginPrompt, RemoteBackend, StateStore};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Backend host folder links must belong to unless overridden
pub const DEFAULT_BACKEND_HOST: &str = "mega.nz";

/// Name of the state directory created next to the executable
pub const STATE_DIR_NAME: &str = "update-state";

const MAX_EXTRA_ATTEMPTS: u32 = 10;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// A validated shared-folder link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderLink {
    link: String,
    folder_id: String,
}

impl FolderLink {
    /// Parse `link` and check that it belongs to `expected_host`.
    ///
    /// Accepts `https://<host>/folder/<id>#<key>` and the legacy
    /// `https://<host>/#F!<id>!<key>` form.
    ///
    /// ```
    /// use core_runtime::config::FolderLink;
    ///
    /// let link = FolderLink::parse("https://mega.nz/folder/AbCd#key", "mega.nz").unwrap();
    /// assert_eq!(link.folder_id(), "AbCd");
    /// assert!(FolderLink::parse("https://example.com/folder/AbCd#key", "mega.nz").is_err());
    /// ```
    pub fn parse(link: &str, expected_host: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidFolderLink {
            link: link.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(link.trim()).map_err(|e| invalid(&e.to_string()))?;

        if url.scheme() != "https" {
            return Err(invalid("scheme must be https"));
        }

        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let expected_host = expected_host.to_ascii_lowercase();
        let host_matches = host == expected_host || host.ends_with(&format!(".{}", expected_host));
        if !host_matches {
            return Err(invalid(&format!("host must be {}", expected_host)));
        }

        let fragment = url.fragment().unwrap_or_default();
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|segment| !segment.is_empty()).collect())
            .unwrap_or_default();

        let folder_id = match segments.as_slice() {
            ["folder", id] if !fragment.is_empty() => id.to_string(),
            [] => match fragment.strip_prefix("F!").and_then(|rest| rest.split_once('!')) {
                Some((id, key)) if !id.is_empty() && !key.is_empty() => id.to_string(),
                _ => return Err(invalid("not a folder link")),
            },
            _ => return Err(invalid("not a folder link")),
        };

        if folder_id.is_empty() {
            return Err(invalid("missing folder id"));
        }

        Ok(Self {
            link: link.trim().to_string(),
            folder_id,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.link
    }

    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }
}

impl fmt::Display for FolderLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The fragment carries the decryption key
        write!(f, "folder:{}", self.folder_id)
    }
}

/// Configuration for the update-source client.
///
/// Use [`ClientConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct ClientConfig {
    pub folder_link: FolderLink,

    /// Directory holding the persisted auth-info and session-token blobs
    pub state_dir: Option<PathBuf>,

    /// Retry policy for session establishment and tree refreshes
    pub retry: RetryPolicy,

    /// Email suggested to the login prompt when no stored credentials exist
    pub email_hint: Option<String>,

    /// Remote storage backend (required)
    pub backend: Arc<dyn RemoteBackend>,

    /// Persistence for credential and token blobs (required)
    pub state_store: Arc<dyn StateStore>,

    /// Interactive login UI (optional; downloads cannot prompt without it)
    pub login_prompt: Option<Arc<dyn LoginPrompt>>,

    /// Capacity of the session event bus created alongside the session manager
    pub event_buffer_size: usize,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("folder_link", &self.folder_link.to_string())
            .field("state_dir", &self.state_dir)
            .field("retry", &self.retry)
            .field("email_hint", &self.email_hint.as_ref().map(|_| "[REDACTED]"))
            .field("backend", &"RemoteBackend { ... }")
            .field("state_store", &"StateStore { ... }")
            .field(
                "login_prompt",
                &self.login_prompt.as_ref().map(|_| "LoginPrompt { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// State directory next to the running executable.
    pub fn default_state_dir() -> Result<PathBuf> {
        let exe = std::env::current_exe()
            .map_err(|e| Error::Config(format!("Cannot locate running executable: {}", e)))?;
        let install_dir = exe.parent().ok_or_else(|| {
            Error::Config("Running executable has no parent directory".to_string())
        })?;
        Ok(install_dir.join(STATE_DIR_NAME))
    }

    /// Validates settings that can be checked without I/O.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_extra_attempts > MAX_EXTRA_ATTEMPTS {
            return Err(Error::Config(format!(
                "Retry attempts exceed maximum of {}",
                MAX_EXTRA_ATTEMPTS
            )));
        }

        if self.retry.delay > MAX_RETRY_DELAY {
            return Err(Error::Config(format!(
                "Retry delay exceeds maximum of {}s",
                MAX_RETRY_DELAY.as_secs()
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config("Event buffer size must be greater than 0".to_string()));
        }

        if let Some(dir) = &self.state_dir {
            if dir.as_os_str().is_empty() {
                return Err(Error::Config("State directory cannot be empty".to_string()));
            }
        }

        Ok(())
    }
}

/// Builder for [`ClientConfig`].
pub struct ClientConfigBuilder {
    folder_link: Option<String>,
    expected_host: String,
    state_dir: Option<PathBuf>,
    retry: RetryPolicy,
    email_hint: Option<String>,
    backend: Option<Arc<dyn RemoteBackend>>,
    state_store: Option<Arc<dyn StateStore>>,
    login_prompt: Option<Arc<dyn LoginPrompt>>,
    event_buffer_size: usize,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self {
            folder_link: None,
            expected_host: DEFAULT_BACKEND_HOST.to_string(),
            state_dir: None,
            retry: RetryPolicy::default(),
            email_hint: None,
            backend: None,
            state_store: None,
            login_prompt: None,
            event_buffer_size: crate::events::DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl ClientConfigBuilder {
    pub fn folder_link(mut self, link: impl Into<String>) -> Self {
        self.folder_link = Some(link.into());
        self
    }

    /// Override the host folder links must belong to.
    pub fn expected_host(mut self, host: impl Into<String>) -> Self {
        self.expected_host = host.into();
        self
    }

    pub fn state_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.state_dir = Some(path.into());
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn email_hint(mut self, email: impl Into<String>) -> Self {
        self.email_hint = Some(email.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn RemoteBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    pub fn login_prompt(mut self, prompt: Arc<dyn LoginPrompt>) -> Self {
        self.login_prompt = Some(prompt);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidFolderLink` - link missing host match or folder id
    /// - `Error::CapabilityMissing` - no backend, or no state store available
    /// - `Error::Config` - missing folder link or out-of-range settings
    pub fn build(self) -> Result<ClientConfig> {
        let raw_link = self.folder_link.ok_or_else(|| {
            Error::Config("Folder link is required. Use .folder_link() to set it.".to_string())
        })?;
        let folder_link = FolderLink::parse(&raw_link, &self.expected_host)?;

        let backend = self.backend.ok_or_else(|| Error::CapabilityMissing {
            capability: "RemoteBackend".to_string(),
            message: "A RemoteBackend implementation is required to talk to the storage service."
                .to_string(),
        })?;

        let state_store = match self.state_store {
            Some(store) => store,
            None => provide_default_state_store(self.state_dir.as_ref())?,
        };

        let config = ClientConfig {
            folder_link,
            state_dir: self.state_dir,
            retry: self.retry,
            email_hint: self.email_hint,
            backend,
            state_store,
            login_prompt: self.login_prompt,
            event_buffer_size: self.event_buffer_size,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_state_store(state_dir: Option<&PathBuf>) -> Result<Arc<dyn StateStore>> {
    use bridge_desktop::FileStateStore;

    let dir = match state_dir {
        Some(dir) => dir.clone(),
        None => ClientConfig::default_state_dir()?,
    };
    let store: Arc<dyn StateStore> = Arc::new(FileStateStore::new(dir));
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_state_store(_state_dir: Option<&PathBuf>) -> Result<Arc<dyn StateStore>> {
    Err(Error::CapabilityMissing {
        capability: "StateStore".to_string(),
        message: "A StateStore implementation is required to persist credentials. \
                  Desktop: enable the 'desktop-shims' feature to use FileStateStore."
            .to_string(),
    })
}
