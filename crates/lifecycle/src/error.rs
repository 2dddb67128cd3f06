use std::fmt;

use thiserror::Error;
use vanish_blob::BlobError;
use vanish_core::ObjectId;
use vanish_metadata::MetadataError;

/// Which backing store an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// The payload store.
    Blob,
    /// The binding record store.
    Metadata,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blob => f.write_str("blob store"),
            Self::Metadata => f.write_str("metadata store"),
        }
    }
}

/// Errors surfaced by the lifecycle manager.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// No binding exists for the id.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// A binding exists but its payload is missing.
    #[error("consistency violation for {id}: {detail}")]
    ConsistencyViolation {
        /// The affected binding.
        id: ObjectId,
        /// What was observed.
        detail: String,
    },

    /// A store call failed or timed out. Safe to retry.
    #[error("{store} unavailable: {detail}")]
    StoreUnavailable {
        /// The store that failed.
        store: StoreKind,
        /// Underlying error message.
        detail: String,
    },

    /// The payload was written, its binding could not be saved, and the
    /// compensating delete failed too. The payload is orphaned.
    #[error(
        "orphaned payload {id} in {namespace}: save failed ({save_error}), \
         compensating delete failed ({delete_error})"
    )]
    OrphanCompensationFailed {
        /// Key of the orphaned payload.
        id: ObjectId,
        /// Namespace (bucket or directory) holding it.
        namespace: String,
        /// Why the metadata save failed.
        save_error: String,
        /// Why the compensating delete failed.
        delete_error: String,
    },

    /// A save with an unknown outcome failed and its record could not be
    /// cleared, so the payload was kept. The binding may or may not exist.
    #[error(
        "binding {id} in {namespace} left unresolved: save failed ({save_error}), \
         record cleanup failed ({cleanup_error}); payload kept"
    )]
    CompensationIncomplete {
        /// The binding whose state is unknown.
        id: ObjectId,
        /// Namespace (bucket or directory) holding its payload.
        namespace: String,
        /// Why the metadata save failed.
        save_error: String,
        /// Why the record delete failed.
        cleanup_error: String,
    },

    /// The caller's payload was unusable (wrong size, broken stream).
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The manager was misconfigured.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl LifecycleError {
    /// Whether the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }

    pub(crate) fn blob_unavailable(err: &BlobError) -> Self {
        Self::StoreUnavailable {
            store: StoreKind::Blob,
            detail: err.to_string(),
        }
    }

    pub(crate) fn metadata_unavailable(err: &MetadataError) -> Self {
        Self::StoreUnavailable {
            store: StoreKind::Metadata,
            detail: err.to_string(),
        }
    }
}

impl From<BlobError> for LifecycleError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::SizeMismatch { .. } | BlobError::Payload(_) => {
                Self::InvalidPayload(err.to_string())
            }
            other => Self::blob_unavailable(&other),
        }
    }
}

impl From<MetadataError> for LifecycleError {
    fn from(err: MetadataError) -> Self {
        Self::metadata_unavailable(&err)
    }
}
