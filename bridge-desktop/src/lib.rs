//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `StateStore` using one JSON file per key under a state directory
//!   (usually next to the installed executable)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::FileStateStore;
//!
//! let store = FileStateStore::new("/opt/my-updater/state");
//! ```

mod state_store;

pub use state_store::FileStateStore;
