//! Persisted State Abstractions
//!
//! Provides the platform-agnostic contract for persisting small opaque state
//! blobs (auth info, session tokens) next to the running component.

use async_trait::async_trait;

use crate::error::Result;

/// Opaque blob persistence trait
///
/// Abstracts where serialized state lives:
/// - Desktop: one file per key inside the install directory
/// - Tests: in-memory maps
///
/// A missing blob is never an error: [`load`](StateStore::load) returns
/// `Ok(None)` and [`delete`](StateStore::delete) succeeds.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::StateStore;
///
/// async fn replace(store: &dyn StateStore, value: &[u8]) -> Result<()> {
///     store.delete("session_token").await?;
///     store.save("session_token", value).await
/// }
/// ```
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Write a blob, replacing any previous value
    async fn save(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Read a blob
    ///
    /// # Returns
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a blob; deleting a missing key succeeds
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a blob exists without reading it
    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.load(key).await?.is_some())
    }
}
