//! In-memory record store.

use super::{reject_purged_update, EncryptedFields, Record, RecordId, RecordKind, RecordStore, RecordUpdate};
use crate::errors::StoreError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// A [`RecordStore`] backed by a map behind a mutex.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Mutex<BTreeMap<RecordId, Record>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fully formed record, replacing any record with the same id.
    ///
    /// Useful for seeding records with specific timestamps or lifecycle states.
    pub fn insert(&self, record: Record) {
        self.lock().insert(record.id.clone(), record);
    }

    /// Number of stored records across all users.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<RecordId, Record>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordStore for InMemoryStore {
    fn create(
        &self,
        user_id: &str,
        kind: RecordKind,
        fields: EncryptedFields,
    ) -> Result<RecordId, StoreError> {
        let id = RecordId::generate();
        let record = Record::new(id.clone(), user_id, kind, fields, Utc::now());
        self.lock().insert(id.clone(), record);
        debug!(record_id = %id, kind = %kind, "Created record");
        Ok(id)
    }

    fn update(&self, id: &RecordId, update: RecordUpdate) -> Result<(), StoreError> {
        reject_purged_update(id, &update)?;
        let mut records = self.lock();
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        record.apply(update, Utc::now());
        Ok(())
    }

    fn delete(&self, id: &RecordId) -> Result<(), StoreError> {
        self.lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn delete_trashed(
        &self,
        id: &RecordId,
        deleted_at_or_before: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        let mut records = self.lock();
        let record = records
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if !record.lifecycle.is_trashed_by(deleted_at_or_before) {
            return Ok(false);
        }
        records.remove(id);
        Ok(true)
    }

    fn query(&self, user_id: &str) -> Result<Vec<Record>, StoreError> {
        let mut records: Vec<Record> = self
            .lock()
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    fn get(&self, id: &RecordId) -> Result<Record, StoreError> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}
