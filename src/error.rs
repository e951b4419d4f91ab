//! Error types for Recall

use thiserror::Error;

/// Result type alias for Recall operations
pub type Result<T> = std::result::Result<T, RecallError>;

/// Main error type for Recall
#[derive(Error, Debug)]
pub enum RecallError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Memory not found: {0}")]
    NotFound(i64),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(i64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider timed out after {0}ms")]
    ProviderTimeout(u64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RecallError {
    /// Check if the error came from a degraded external provider
    ///
    /// Provider failures are always substituted with a safe fallback at the
    /// point of call; everything else propagates to the caller.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            RecallError::Provider(_) | RecallError::ProviderTimeout(_)
        )
    }

    /// Check if the error is a typed not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RecallError::NotFound(_) | RecallError::ConversationNotFound(_)
        )
    }
}
