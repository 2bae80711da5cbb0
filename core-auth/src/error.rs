use bridge_traits::BridgeError;
use core_runtime::Retryable;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Remote backend error: {0}")]
    Backend(BridgeError),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Interactive login requested but no login prompt is configured")]
    PromptUnavailable,

    #[error("Login prompt failed: {0}")]
    PromptFailed(String),

    #[error("Authentication cancelled")]
    Cancelled,

    #[error("State storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Failed to serialize {context}: {source}")]
    SerializationFailed {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl AuthError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AuthError::Cancelled)
    }
}

impl From<BridgeError> for AuthError {
    fn from(error: BridgeError) -> Self {
        if error.is_cancelled() {
            AuthError::Cancelled
        } else {
            AuthError::Backend(error)
        }
    }
}

impl Retryable for AuthError {
    fn is_cancelled(&self) -> bool {
        AuthError::is_cancelled(self)
    }

    fn is_permanent(&self) -> bool {
        matches!(self, AuthError::PromptUnavailable)
    }

    fn cancelled() -> Self {
        AuthError::Cancelled
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
