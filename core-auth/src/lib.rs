//! # Authentication Module
//!
//! Session management for the remote storage backend.
//!
//! ## Overview
//!
//! [`SessionManager`] owns the credentials, the session token and the
//! anonymous flag, and runs the connect sequence
//! (token, then credentials, then anonymous or interactive login) behind a
//! single-flight lock. [`CredentialStore`] persists the two auth blobs
//! through the host `StateStore`, best effort.
//!
//! ## Features
//!
//! - Stale tokens are discarded and never presented again
//! - Passive callers never block on the login prompt
//! - Bounded retry around the whole connect sequence; cancellation is never retried
//! - Session state events on the runtime event bus

pub mod credential_store;
pub mod error;
pub mod manager;
pub mod types;

pub use credential_store::{CredentialStore, AUTH_INFO_KEY, SESSION_TOKEN_KEY};
pub use error::{AuthError, Result};
pub use manager::SessionManager;
pub use types::{AuthState, ConnectState, SessionOrigin};
