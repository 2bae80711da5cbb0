//! # Host Bridge Traits
//!
//! Contracts between the update-source core and everything it treats as an
//! external collaborator.
//!
//! ## Traits
//!
//! ### Remote storage
//! - [`RemoteBackend`](remote::RemoteBackend) - Login, folder listing and download (opaque wire API)
//!
//! ### Authentication
//! - [`LoginPrompt`](auth::LoginPrompt) - Interactive login UI
//!
//! ### Persistence
//! - [`StateStore`](storage::StateStore) - Opaque blob load/save/delete
//!
//! ### Update engine
//! - [`UpdateSource`](update::UpdateSource) - Root resolution entry point
//! - [`UpdateItem`](update::UpdateItem) - Remote item capability set
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should report refused logins as `Rejected` and honour cancellation tokens
//! by returning `Cancelled`.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks behind `Arc`.

pub mod auth;
pub mod error;
pub mod logging;
pub mod remote;
pub mod storage;
pub mod update;

pub use error::BridgeError;

pub use auth::{Credentials, LoginPrompt, PromptOutcome, SessionToken};
pub use logging::{LogEntry, LogLevel, LoggerSink};
pub use remote::{NodeHandle, NodeKind, ProgressSink, RemoteBackend, RemoteNode};
pub use storage::StateStore;
pub use update::{UpdateItem, UpdateSource};
