//! Error types for the MEGA update source

use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use core_runtime::Retryable;
use thiserror::Error;

/// MEGA provider errors
#[derive(Error, Debug)]
pub enum MegaError {
    /// No session could be established
    #[error("Session unavailable: {0}")]
    Session(AuthError),

    /// The backend failed a listing or download call
    #[error("Remote backend error: {0}")]
    Backend(BridgeError),

    /// The listing violates the tree invariants
    #[error("Invalid remote tree: {0}")]
    InvalidSnapshot(String),

    /// No successful refresh since construction or the last failure
    #[error("Remote tree not loaded")]
    TreeNotLoaded,

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

impl MegaError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MegaError::Cancelled)
    }
}

impl From<AuthError> for MegaError {
    fn from(error: AuthError) -> Self {
        if error.is_cancelled() {
            MegaError::Cancelled
        } else {
            MegaError::Session(error)
        }
    }
}

impl From<BridgeError> for MegaError {
    fn from(error: BridgeError) -> Self {
        if error.is_cancelled() {
            MegaError::Cancelled
        } else {
            MegaError::Backend(error)
        }
    }
}

impl Retryable for MegaError {
    fn is_cancelled(&self) -> bool {
        MegaError::is_cancelled(self)
    }

    fn is_permanent(&self) -> bool {
        match self {
            // The session manager already retried its own connect sequence
            MegaError::Session(_) => true,
            MegaError::Config(_) => true,
            _ => false,
        }
    }

    fn cancelled() -> Self {
        MegaError::Cancelled
    }
}

/// Result type for MEGA provider operations
pub type Result<T> = std::result::Result<T, MegaError>;

impl From<MegaError> for BridgeError {
    fn from(error: MegaError) -> Self {
        match error {
            MegaError::Backend(e) => e,
            MegaError::Cancelled => BridgeError::Cancelled,
            MegaError::Session(e) => {
                BridgeError::OperationFailed(format!("Session unavailable: {}", e))
            }
            MegaError::InvalidSnapshot(msg) => {
                BridgeError::OperationFailed(format!("Invalid remote tree: {}", msg))
            }
            MegaError::TreeNotLoaded => {
                BridgeError::OperationFailed("Remote tree not loaded".to_string())
            }
            MegaError::Config(e) => BridgeError::NotAvailable(e.to_string()),
        }
    }
}
