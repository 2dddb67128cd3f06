use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during metadata store operations.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The backend could not be reached.
    #[error("metadata store connection error: {0}")]
    Connection(String),

    /// A binding with the same id is already stored.
    #[error("binding already exists: {0}")]
    Conflict(String),

    /// A stored record could not be decoded into a binding.
    #[error("metadata serialization error: {0}")]
    Serialization(String),

    /// The operation did not complete in time.
    #[error("metadata store operation timed out after {0:?}")]
    Timeout(Duration),

    /// Any other backend failure.
    #[error("metadata store error: {0}")]
    Backend(String),
}

impl MetadataError {
    /// Whether a retry of the same operation might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}
