//! # MEGA Update Source
//!
//! Exposes a MEGA shared folder to the update engine through
//! `bridge_traits::UpdateSource`.
//!
//! ## Overview
//!
//! This module provides:
//! - A flat remote tree snapshot indexed by parent, refreshed wholesale per cycle
//! - Case-insensitive path resolution from the tree root
//! - Remote items that rebuild their relative path from an owner chain
//! - Downloads that re-validate the session, prompting if needed
//!
//! The wire protocol is not implemented here; all network calls go through
//! `bridge_traits::RemoteBackend`.

pub mod download;
pub mod error;
pub mod item;
pub mod resolver;
pub mod source;
pub mod tree;

#[cfg(test)]
mod testing;

pub use download::DownloadOrchestrator;
pub use error::{MegaError, Result};
pub use item::RemoteItem;
pub use source::MegaUpdateSource;
pub use tree::{RemoteTreeCache, TreeSnapshot};
