//! Storage backends for dataset records.

use crate::error::StoreError;
use crate::models::Dataset;
use std::collections::BTreeMap;

/// Raw record storage used by [`super::DatasetStore`].
///
/// Backends do no locking or retention of their own; the store serializes
/// every call behind one mutex.
pub trait Backend: Send {
    /// Reserve the next dataset id. An id is never handed out twice, even
    /// after the record holding it has been pruned.
    fn allocate_id(&mut self) -> Result<u64, StoreError>;

    /// Persist a new record.
    fn insert(&mut self, dataset: &Dataset) -> Result<(), StoreError>;

    /// Fetch a record by id.
    fn fetch(&self, id: u64) -> Result<Option<Dataset>, StoreError>;

    /// Physically delete a record. Deleting an absent id is not an error.
    fn remove(&mut self, id: u64) -> Result<(), StoreError>;

    /// Every stored record, in no particular order.
    fn load_all(&self) -> Result<Vec<Dataset>, StoreError>;
}

/// Volatile backend keeping records in a map.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: BTreeMap<u64, Dataset>,
    last_id: u64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn allocate_id(&mut self) -> Result<u64, StoreError> {
        self.last_id += 1;
        Ok(self.last_id)
    }

    fn insert(&mut self, dataset: &Dataset) -> Result<(), StoreError> {
        self.records.insert(dataset.id, dataset.clone());
        Ok(())
    }

    fn fetch(&self, id: u64) -> Result<Option<Dataset>, StoreError> {
        Ok(self.records.get(&id).cloned())
    }

    fn remove(&mut self, id: u64) -> Result<(), StoreError> {
        self.records.remove(&id);
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Dataset>, StoreError> {
        Ok(self.records.values().cloned().collect())
    }
}
