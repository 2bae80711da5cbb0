use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The backend refused the presented credentials or session token.
    #[error("Rejected by remote backend: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BridgeError::Cancelled)
    }

    /// The backend no longer accepts the current session.
    pub fn is_rejected(&self) -> bool {
        matches!(self, BridgeError::Rejected(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
