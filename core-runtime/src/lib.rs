//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the update-source core:
//! - Logging and tracing infrastructure
//! - Configuration management and validation
//! - Bounded retry with cooperative cancellation
//! - Session event bus
//!
//! ## Overview
//!
//! Everything here is independent of the remote backend. `core-auth` and
//! `provider-mega` build on these pieces so that logging conventions, retry
//! behaviour and configuration errors are uniform across the workspace.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod retry;

pub use error::{Error, Result};
pub use retry::{retry_with_policy, RetryPolicy, Retryable};
