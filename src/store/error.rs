//! Document store error types

use thiserror::Error;

/// Errors that can occur talking to a document store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Collection or key cannot address a document
    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    /// Document does not exist (only for operations that require it)
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Credentials missing or rejected
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Caller lacks permission for the operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Store rejected the request because of quota or rate limits
    #[error("Rate limited")]
    RateLimited,

    /// Store reachable but temporarily unable to serve
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Request timed out
    #[error("Request timeout")]
    Timeout,

    /// Network-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Store answered with an error not covered above
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Store client was shut down
    #[error("Store client closed")]
    Closed,
}

impl StoreError {
    /// Whether a read may succeed if simply tried again
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::RateLimited
                | StoreError::Unavailable(_)
                | StoreError::Timeout
                | StoreError::Transport(_)
        )
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout
        } else if err.is_connect() {
            StoreError::Unavailable(err.to_string())
        } else if err.is_decode() {
            StoreError::Serialization(err.to_string())
        } else {
            StoreError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
