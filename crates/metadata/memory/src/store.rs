use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use vanish_core::{Binding, ObjectId};
use vanish_metadata::{MetadataError, MetadataStore};

/// In-memory [`MetadataStore`] backed by a [`DashMap`].
///
/// The expiry query scans every record, which is fine for tests and small
/// single-node deployments.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    bindings: DashMap<ObjectId, Binding>,
}

impl MemoryMetadataStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if no bindings are stored.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn save(&self, binding: &Binding) -> Result<(), MetadataError> {
        match self.bindings.entry(binding.id.clone()) {
            Entry::Occupied(_) => Err(MetadataError::Conflict(binding.id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(binding.clone());
                Ok(())
            }
        }
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Binding>, MetadataError> {
        Ok(self.bindings.get(id).map(|b| b.clone()))
    }

    async fn find_expired_before(
        &self,
        before: DateTime<Utc>,
        after: Option<&ObjectId>,
        limit: usize,
    ) -> Result<Vec<Binding>, MetadataError> {
        let mut expired: Vec<Binding> = self
            .bindings
            .iter()
            .filter(|entry| entry.expires_at < before)
            .filter(|entry| after.is_none_or(|cursor| entry.key() > cursor))
            .map(|entry| entry.value().clone())
            .collect();
        expired.sort_by(|a, b| a.id.cmp(&b.id));
        expired.truncate(limit);
        Ok(expired)
    }

    async fn delete_by_id(&self, id: &ObjectId) -> Result<bool, MetadataError> {
        Ok(self.bindings.remove(id).is_some())
    }
}
