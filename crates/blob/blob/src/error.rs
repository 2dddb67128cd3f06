use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during blob storage operations.
#[derive(Debug, Error)]
pub enum BlobError {
    /// No object is stored under the requested key.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// The payload stream did not yield exactly the declared number of bytes.
    #[error("blob size mismatch: declared {expected} bytes, received {actual}")]
    SizeMismatch {
        /// Size declared by the caller.
        expected: u64,
        /// Bytes actually read (may stop early once `expected` is exceeded).
        actual: u64,
    },

    /// The key cannot be used by this backend.
    #[error("invalid blob key: {0}")]
    InvalidKey(String),

    /// The backend could not be reached.
    #[error("blob store connection error: {0}")]
    Connection(String),

    /// The operation did not complete in time.
    #[error("blob store operation timed out after {0:?}")]
    Timeout(Duration),

    /// Reading the caller's payload stream failed.
    #[error("payload stream error: {0}")]
    Payload(String),

    /// Any other backend failure.
    #[error("blob storage error: {0}")]
    Backend(String),
}

impl BlobError {
    /// Whether a retry of the same operation might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(BlobError::Connection("reset".into()).is_retryable());
        assert!(BlobError::Timeout(Duration::from_secs(1)).is_retryable());
    }

    #[test]
    fn permanent_errors_are_not_retryable() {
        assert!(!BlobError::NotFound("k".into()).is_retryable());
        assert!(
            !BlobError::SizeMismatch {
                expected: 1,
                actual: 2
            }
            .is_retryable()
        );
        assert!(!BlobError::InvalidKey("a/b".into()).is_retryable());
        assert!(!BlobError::Payload("client went away".into()).is_retryable());
    }

    #[test]
    fn size_mismatch_message() {
        let err = BlobError::SizeMismatch {
            expected: 10,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "blob size mismatch: declared 10 bytes, received 4"
        );
    }
}
