//! MEGA update source workspace facade.
//!
//! Re-exports the workspace crates so a host application can depend on a
//! single crate. Enable `desktop-shims` (on by default) for the file-backed
//! state store.
//!
//! ```ignore
//! use mega_update_workspace::prelude::*;
//!
//! let config = ClientConfig::builder()
//!     .folder_link("https://mega.nz/folder/abc#key")
//!     .backend(backend)
//!     .build()?;
//! let source = MegaUpdateSource::from_config(&config).await;
//! let mut events = source.sessions().events().subscribe();
//! ```

pub use bridge_traits;
pub use core_auth;
pub use core_runtime;
pub use provider_mega;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;

pub mod prelude {
    pub use bridge_traits::{
        BridgeError, Credentials, LoginPrompt, ProgressSink, PromptOutcome, RemoteBackend,
        StateStore, UpdateItem, UpdateSource,
    };
    pub use core_auth::{SessionManager, SessionOrigin};
    pub use core_runtime::config::{ClientConfig, FolderLink};
    pub use core_runtime::events::{EventBus, SessionEvent};
    pub use core_runtime::RetryPolicy;
    pub use provider_mega::{MegaUpdateSource, RemoteItem};
}
