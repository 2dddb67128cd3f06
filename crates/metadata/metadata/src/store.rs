use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vanish_core::{Binding, ObjectId};

use crate::error::MetadataError;

/// Trait for persisting binding records.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a new binding.
    ///
    /// Fails with [`MetadataError::Conflict`] if a binding with the same id
    /// already exists; records are never overwritten.
    async fn save(&self, binding: &Binding) -> Result<(), MetadataError>;

    /// Look up a binding by id.
    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Binding>, MetadataError>;

    /// Return bindings whose deadline is strictly before `before`.
    ///
    /// Results are ordered by id, start strictly after the `after` cursor
    /// when one is given, and hold at most `limit` entries. Pass the id of
    /// the last returned binding as the next cursor to page through.
    async fn find_expired_before(
        &self,
        before: DateTime<Utc>,
        after: Option<&ObjectId>,
        limit: usize,
    ) -> Result<Vec<Binding>, MetadataError>;

    /// Delete a binding. Returns `true` if a record was removed.
    ///
    /// Deleting an absent id succeeds and returns `false`.
    async fn delete_by_id(&self, id: &ObjectId) -> Result<bool, MetadataError>;
}
