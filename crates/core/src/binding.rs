use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::ObjectId;

/// The unit the lifecycle manager tracks: an object id bound to a stored
/// payload and an expiration deadline.
///
/// A binding is a plain immutable record. `expires_at` is fixed at creation
/// and no operation rewrites it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// Join key between the blob store object and the metadata record.
    pub id: ObjectId,
    /// Filename supplied by the uploader.
    pub original_name: String,
    /// MIME content type supplied by the uploader.
    pub content_type: String,
    /// Payload size in bytes.
    pub size: u64,
    /// When the binding was created.
    pub created_at: DateTime<Utc>,
    /// When the binding becomes eligible for reclamation.
    pub expires_at: DateTime<Utc>,
}

impl Binding {
    /// Build a binding whose deadline is `created_at + ttl`.
    ///
    /// A TTL too large for the calendar saturates at the maximum
    /// representable timestamp.
    pub fn new(
        id: ObjectId,
        original_name: impl Into<String>,
        content_type: impl Into<String>,
        size: u64,
        created_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| created_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            id,
            original_name: original_name.into(),
            content_type: content_type.into(),
            size,
            created_at,
            expires_at,
        }
    }

    /// Returns `true` if the deadline lies strictly before `now`.
    ///
    /// This is the same predicate the reclamation query uses.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Time left until the deadline, or zero once it has passed.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}
