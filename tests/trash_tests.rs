//! Integration tests for the trash lifecycle and batch purges.

use chrono::{DateTime, Duration, TimeZone, Utc};
use notecrypt::errors::{StoreError, TrashError};
use notecrypt::events::{self, LifecycleEvent};
use notecrypt::records::{
    EncryptedFields, InMemoryStore, Record, RecordId, RecordKind, RecordStore, RecordUpdate,
};
use notecrypt::trash::{self, TrashLifecycle};
use std::collections::HashSet;

/// Delegates to an in-memory store but refuses to delete selected ids.
struct FlakyStore {
    inner: InMemoryStore,
    refuse: HashSet<RecordId>,
}

impl RecordStore for FlakyStore {
    fn create(
        &self,
        user_id: &str,
        kind: RecordKind,
        fields: EncryptedFields,
    ) -> Result<RecordId, StoreError> {
        self.inner.create(user_id, kind, fields)
    }

    fn update(&self, id: &RecordId, update: RecordUpdate) -> Result<(), StoreError> {
        self.inner.update(id, update)
    }

    fn delete(&self, id: &RecordId) -> Result<(), StoreError> {
        if self.refuse.contains(id) {
            return Err(StoreError::Rejected("disk is read-only".to_string()));
        }
        self.inner.delete(id)
    }

    fn delete_trashed(
        &self,
        id: &RecordId,
        deleted_at_or_before: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        if self.refuse.contains(id) {
            return Err(StoreError::Rejected("disk is read-only".to_string()));
        }
        self.inner.delete_trashed(id, deleted_at_or_before)
    }

    fn query(&self, user_id: &str) -> Result<Vec<Record>, StoreError> {
        self.inner.query(user_id)
    }

    fn get(&self, id: &RecordId) -> Result<Record, StoreError> {
        self.inner.get(id)
    }
}

fn deleted_on() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

fn new_note(store: &impl RecordStore) -> Record {
    let id = store
        .create("u1", RecordKind::Note, EncryptedFields::new())
        .unwrap();
    store.get(&id).unwrap()
}

#[test]
fn test_soft_delete_restore_roundtrip() {
    let store = InMemoryStore::new();
    let lifecycle = TrashLifecycle::new(&store);
    let note = new_note(&store);

    let trashed = lifecycle.soft_delete_at(&note, deleted_on()).unwrap();
    assert_eq!(trashed.lifecycle.deleted_at(), Some(deleted_on()));
    assert_eq!(trash::trash_count(&store.query("u1").unwrap()), 1);
    assert!(trash::active(&store.query("u1").unwrap()).is_empty());

    let restored = lifecycle.restore(&trashed).unwrap();
    assert!(restored.lifecycle.is_active());
    assert_eq!(restored.lifecycle.deleted_at(), None);
    assert_eq!(restored.fields, note.fields);
    assert_eq!(trash::trash_count(&store.query("u1").unwrap()), 0);
}

#[test]
fn test_invalid_transitions_leave_record_unchanged() {
    let store = InMemoryStore::new();
    let lifecycle = TrashLifecycle::new(&store);
    let note = new_note(&store);

    assert!(matches!(
        lifecycle.restore(&note),
        Err(TrashError::InvalidTransition { operation: "restore", .. })
    ));

    let trashed = lifecycle.soft_delete(&note).unwrap();
    assert!(matches!(
        lifecycle.soft_delete(&trashed),
        Err(TrashError::InvalidTransition { .. })
    ));
    assert_eq!(store.get(&note.id).unwrap().lifecycle, trashed.lifecycle);
}

#[test]
fn test_purge_boundary_is_inclusive() {
    let store = InMemoryStore::new();
    let lifecycle = TrashLifecycle::new(&store);
    let retention = Duration::days(30);

    let exactly_due = lifecycle
        .soft_delete_at(&new_note(&store), deleted_on())
        .unwrap();
    let one_second_short = lifecycle
        .soft_delete_at(&new_note(&store), deleted_on() + Duration::seconds(1))
        .unwrap();

    let now = deleted_on() + retention;
    let report = lifecycle.purge_expired(&store.query("u1").unwrap(), retention, now);

    assert_eq!(report.purged, vec![exactly_due.id.clone()]);
    assert!(report.is_clean());
    assert!(store.get(&one_second_short.id).unwrap().lifecycle.is_soft_deleted());
    assert!(matches!(
        store.get(&exactly_due.id),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn test_purge_ignores_active_records() {
    let store = InMemoryStore::new();
    let lifecycle = TrashLifecycle::new(&store);
    let note = new_note(&store);

    let far_future = Utc::now() + Duration::days(3_650);
    let report = lifecycle.purge_expired(&store.query("u1").unwrap(), Duration::days(30), far_future);

    assert_eq!(report.purged_count(), 0);
    assert!(store.get(&note.id).unwrap().lifecycle.is_active());
}

#[test]
fn test_purge_is_idempotent_with_stale_snapshot() {
    let store = InMemoryStore::new();
    let lifecycle = TrashLifecycle::new(&store);
    lifecycle
        .soft_delete_at(&new_note(&store), deleted_on())
        .unwrap();

    let snapshot = store.query("u1").unwrap();
    let now = deleted_on() + Duration::days(31);

    let first = lifecycle.purge_expired(&snapshot, Duration::days(30), now);
    let second = lifecycle.purge_expired(&snapshot, Duration::days(30), now);

    assert_eq!(first.purged_count(), 1);
    assert_eq!(second.purged_count(), 0);
    assert!(second.is_clean());
    assert!(store.is_empty());
}

#[test]
fn test_purge_with_stale_snapshot_keeps_restored_note() {
    let store = InMemoryStore::new();
    let lifecycle = TrashLifecycle::new(&store);
    let trashed = lifecycle
        .soft_delete_at(&new_note(&store), deleted_on())
        .unwrap();

    let snapshot = store.query("u1").unwrap();
    lifecycle.restore(&trashed).unwrap();

    let report = lifecycle.purge_expired(&snapshot, Duration::days(30), deleted_on() + Duration::days(40));
    assert_eq!(report.purged_count(), 0);
    assert!(report.is_clean());
    assert!(store.get(&trashed.id).unwrap().lifecycle.is_active());

    let report = lifecycle.empty_all(&snapshot);
    assert_eq!(report.purged_count(), 0);
    assert!(store.get(&trashed.id).unwrap().lifecycle.is_active());
}

#[test]
fn test_partial_failure_does_not_abort_batch() {
    let inner = InMemoryStore::new();
    let stuck = new_note(&inner);
    let fine = new_note(&inner);
    let store = FlakyStore {
        inner,
        refuse: HashSet::from([stuck.id.clone()]),
    };

    let lifecycle = TrashLifecycle::new(&store);
    lifecycle.soft_delete_at(&stuck, deleted_on()).unwrap();
    lifecycle.soft_delete_at(&fine, deleted_on()).unwrap();

    let report = lifecycle.empty_all(&store.query("u1").unwrap());

    assert_eq!(report.purged, vec![fine.id.clone()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, stuck.id);
    assert!(!report.is_clean());
    assert!(store.get(&stuck.id).unwrap().lifecycle.is_soft_deleted());
}

#[test]
fn test_permanent_delete_from_either_state() {
    let store = InMemoryStore::new();
    let lifecycle = TrashLifecycle::new(&store);

    let active = new_note(&store);
    let purged = lifecycle.permanently_delete(&active).unwrap();
    assert!(purged.lifecycle.is_purged());

    let trashed = lifecycle.soft_delete(&new_note(&store)).unwrap();
    lifecycle.permanently_delete(&trashed).unwrap();
    assert!(store.is_empty());

    assert!(matches!(
        lifecycle.permanently_delete(&purged),
        Err(TrashError::InvalidTransition { .. })
    ));
}

#[test]
fn test_purges_publish_events() {
    let store = InMemoryStore::new();
    let (sender, mut receiver) = events::channel();
    let lifecycle = TrashLifecycle::new(&store).with_events(sender);

    let first = lifecycle.soft_delete(&new_note(&store)).unwrap();
    let second = lifecycle.soft_delete(&new_note(&store)).unwrap();
    lifecycle.empty_all(&store.query("u1").unwrap());

    let mut purged = HashSet::new();
    while let Ok(LifecycleEvent::TrashItemPurged { id }) = receiver.try_recv() {
        purged.insert(id);
    }
    assert_eq!(purged, HashSet::from([first.id, second.id]));
}

#[test]
fn test_trash_listing_is_newest_first() {
    let store = InMemoryStore::new();
    let lifecycle = TrashLifecycle::new(&store);

    let older = lifecycle
        .soft_delete_at(&new_note(&store), deleted_on())
        .unwrap();
    let newer = lifecycle
        .soft_delete_at(&new_note(&store), deleted_on() + Duration::hours(1))
        .unwrap();

    let ids: Vec<RecordId> = trash::trashed(&store.query("u1").unwrap())
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![newer.id, older.id]);
}
