//! Credential and Session Token Persistence
//!
//! Persists the two independent auth blobs through the host [`StateStore`]:
//!
//! - `auth_info`: long-lived credential material
//! - `session_token`: the short-lived session token
//!
//! ## Failure policy
//!
//! Persistence is best effort. The `persist_*` and `load_*` methods log
//! failures and never return them, so a broken disk cannot abort a connect
//! attempt or roll back in-memory state. A blob that cannot be decoded, or
//! that carries an unknown version, is treated as absent and deleted.
//!
//! ## Example
//!
//! ```no_run
//! use bridge_traits::Credentials;
//! use core_auth::CredentialStore;
//! # use bridge_traits::StateStore;
//! # use std::sync::Arc;
//! # async fn example(state_store: Arc<dyn StateStore>) {
//! let store = CredentialStore::new(state_store);
//!
//! let credentials = Credentials::derive("user@example.com", "secret");
//! store.persist_credentials(Some(&credentials)).await;
//!
//! assert_eq!(store.load_credentials().await, Some(credentials));
//! # }
//! ```

use crate::error::{AuthError, Result};
use bridge_traits::{Credentials, SessionToken, StateStore};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Storage key of the credential blob
pub const AUTH_INFO_KEY: &str = "auth_info";

/// Storage key of the session token blob
pub const SESSION_TOKEN_KEY: &str = "session_token";

const BLOB_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoredAuthInfo {
    version: u32,
    email: String,
    password_key: String,
}

#[derive(Serialize, Deserialize)]
struct StoredSessionToken {
    version: u32,
    token: String,
}

trait Versioned {
    fn version(&self) -> u32;
}

impl Versioned for StoredAuthInfo {
    fn version(&self) -> u32 {
        self.version
    }
}

impl Versioned for StoredSessionToken {
    fn version(&self) -> u32 {
        self.version
    }
}

/// Best-effort persistence of credentials and session tokens
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn StateStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Load stored credentials, or `None` if absent or unreadable.
    pub async fn load_credentials(&self) -> Option<Credentials> {
        let stored: StoredAuthInfo = self.load_blob(AUTH_INFO_KEY).await?;
        Some(Credentials::from_parts(stored.email, stored.password_key))
    }

    /// Load the stored session token, or `None` if absent or unreadable.
    pub async fn load_token(&self) -> Option<SessionToken> {
        let stored: StoredSessionToken = self.load_blob(SESSION_TOKEN_KEY).await?;
        Some(SessionToken::new(stored.token))
    }

    /// Replace the persisted credentials; `None` only deletes.
    pub async fn persist_credentials(&self, credentials: Option<&Credentials>) {
        let stored = credentials.map(|c| StoredAuthInfo {
            version: BLOB_VERSION,
            email: c.email().to_string(),
            password_key: c.password_key().to_string(),
        });

        if let Err(e) = self.replace_blob(AUTH_INFO_KEY, stored.as_ref()).await {
            warn!(key = AUTH_INFO_KEY, error = %e, "Failed to persist credentials");
        }
    }

    /// Replace the persisted session token; `None` only deletes.
    pub async fn persist_token(&self, token: Option<&SessionToken>) {
        let stored = token.map(|t| StoredSessionToken {
            version: BLOB_VERSION,
            token: t.as_str().to_string(),
        });

        if let Err(e) = self.replace_blob(SESSION_TOKEN_KEY, stored.as_ref()).await {
            warn!(key = SESSION_TOKEN_KEY, error = %e, "Failed to persist session token");
        }
    }

    /// Delete the previous blob, then write the new one if present.
    async fn replace_blob<T: Serialize>(&self, key: &str, value: Option<&T>) -> Result<()> {
        self.store
            .delete(key)
            .await
            .map_err(|e| AuthError::StorageUnavailable(e.to_string()))?;

        let Some(value) = value else {
            debug!(key, "Stored blob cleared");
            return Ok(());
        };

        let json = serde_json::to_vec(value).map_err(|e| AuthError::SerializationFailed {
            context: key.to_string(),
            source: e,
        })?;

        self.store
            .save(key, &json)
            .await
            .map_err(|e| AuthError::StorageUnavailable(e.to_string()))?;

        info!(key, "Stored blob updated");
        Ok(())
    }

    async fn load_blob<T: DeserializeOwned + Versioned>(&self, key: &str) -> Option<T> {
        let bytes = match self.store.load(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(key, "No stored blob");
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to read stored blob");
                return None;
            }
        };

        match serde_json::from_slice::<T>(&bytes) {
            Ok(value) if value.version() == BLOB_VERSION => Some(value),
            Ok(value) => {
                warn!(key, version = value.version(), "Unsupported blob version, discarding");
                self.discard(key).await;
                None
            }
            Err(e) => {
                warn!(key, error = %e, "Corrupted blob, discarding");
                self.discard(key).await;
                None
            }
        }
    }

    async fn discard(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!(key, error = %e, "Failed to delete unreadable blob");
        }
    }
}
