//! Soft-delete, restore and purge of encrypted records.
//!
//! Trash transitions never need the encryption key: they only move a record's
//! [`LifecycleState`] or remove it from the store.
//!
//! ```text
//! Active --soft_delete--> SoftDeleted --restore--> Active
//!   |                          |
//!   +--permanently_delete------+--purge_expired / empty_all--> Purged
//! ```

use crate::errors::{PurgeFailure, StoreError, TrashError};
use crate::events::{publish, EventSender, LifecycleEvent};
use crate::records::{LifecycleState, Record, RecordId, RecordStore, RecordUpdate};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

/// Outcome of a batch purge.
#[derive(Debug, Default)]
pub struct PurgeReport {
    /// Records removed by this run
    pub purged: Vec<RecordId>,
    /// Records the store refused to remove
    pub failed: Vec<PurgeFailure>,
}

impl PurgeReport {
    /// Whether every eligible record was removed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of records removed.
    pub fn purged_count(&self) -> usize {
        self.purged.len()
    }
}

/// Applies trash transitions to records held in a [`RecordStore`].
///
/// # Example
///
/// ```
/// use notecrypt::records::{EncryptedFields, InMemoryStore, RecordKind, RecordStore};
/// use notecrypt::trash::TrashLifecycle;
///
/// let store = InMemoryStore::new();
/// let id = store.create("u1", RecordKind::Note, EncryptedFields::new())?;
/// let trash = TrashLifecycle::new(&store);
///
/// let deleted = trash.soft_delete(&store.get(&id)?)?;
/// assert!(deleted.lifecycle.is_soft_deleted());
///
/// let restored = trash.restore(&deleted)?;
/// assert!(restored.lifecycle.is_active());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct TrashLifecycle<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    events: Option<EventSender>,
}

impl<'a, S: RecordStore + ?Sized> TrashLifecycle<'a, S> {
    /// Creates a lifecycle manager over `store`.
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            events: None,
        }
    }

    /// Publishes `TrashItemPurged` for every removed record.
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Moves an active record to the trash, stamped with the current time.
    pub fn soft_delete(&self, record: &Record) -> Result<Record, TrashError> {
        self.soft_delete_at(record, Utc::now())
    }

    /// Moves an active record to the trash, stamped with `at`.
    ///
    /// # Errors
    ///
    /// `TrashError::InvalidTransition` unless the record is active.
    pub fn soft_delete_at(&self, record: &Record, at: DateTime<Utc>) -> Result<Record, TrashError> {
        if !record.lifecycle.is_active() {
            return Err(invalid(record, "soft-delete"));
        }
        self.transition(record, LifecycleState::SoftDeleted { at })
    }

    /// Returns a trashed record to normal listings.
    ///
    /// # Errors
    ///
    /// `TrashError::InvalidTransition` unless the record is in the trash.
    pub fn restore(&self, record: &Record) -> Result<Record, TrashError> {
        if !record.lifecycle.is_soft_deleted() {
            return Err(invalid(record, "restore"));
        }
        self.transition(record, LifecycleState::Active)
    }

    /// Removes an active or trashed record from the store.
    ///
    /// # Errors
    ///
    /// `TrashError::InvalidTransition` if the record is already purged, or the
    /// store error if removal fails.
    pub fn permanently_delete(&self, record: &Record) -> Result<Record, TrashError> {
        if record.lifecycle.is_purged() {
            return Err(invalid(record, "permanently delete"));
        }
        self.store.delete(&record.id)?;
        info!(record_id = %record.id, "Record permanently deleted");
        publish(
            self.events.as_ref(),
            LifecycleEvent::TrashItemPurged {
                id: record.id.clone(),
            },
        );

        let mut purged = record.clone();
        purged.lifecycle = LifecycleState::Purged;
        Ok(purged)
    }

    /// Removes every trashed record whose deletion is at least `retention` old.
    ///
    /// `records` may be stale: each removal re-checks the stored state, so a
    /// record restored since the snapshot is kept. Already purged and active
    /// records are skipped. A failure on one record is collected in the report
    /// and the batch continues.
    pub fn purge_expired(
        &self,
        records: &[Record],
        retention: Duration,
        now: DateTime<Utc>,
    ) -> PurgeReport {
        let report = match now.checked_sub_signed(retention) {
            Some(cutoff) => self.purge_all(records, Some(cutoff)),
            None => PurgeReport::default(),
        };
        info!(
            purged = report.purged_count(),
            failed = report.failed.len(),
            retention_days = retention.num_days(),
            "Expired trash purged"
        );
        report
    }

    /// Removes every trashed record regardless of age.
    pub fn empty_all(&self, records: &[Record]) -> PurgeReport {
        let report = self.purge_all(records, None);
        info!(
            purged = report.purged_count(),
            failed = report.failed.len(),
            "Trash emptied"
        );
        report
    }

    fn purge_all(&self, records: &[Record], cutoff: Option<DateTime<Utc>>) -> PurgeReport {
        let mut report = PurgeReport::default();
        let candidates = records
            .iter()
            .filter(|record| record.lifecycle.is_trashed_by(cutoff));
        for record in candidates {
            match self.store.delete_trashed(&record.id, cutoff) {
                Ok(true) => {
                    debug!(record_id = %record.id, "Purged trashed record");
                    publish(
                        self.events.as_ref(),
                        LifecycleEvent::TrashItemPurged {
                            id: record.id.clone(),
                        },
                    );
                    report.purged.push(record.id.clone());
                }
                Ok(false) => {
                    debug!(record_id = %record.id, "Record left the trash; skipping");
                }
                Err(StoreError::NotFound(_)) => {
                    debug!(record_id = %record.id, "Record already gone; skipping");
                }
                Err(source) => {
                    warn!(record_id = %record.id, error = %source, "Failed to purge record");
                    report.failed.push(PurgeFailure {
                        id: record.id.clone(),
                        source,
                    });
                }
            }
        }
        report
    }

    fn transition(&self, record: &Record, to: LifecycleState) -> Result<Record, TrashError> {
        self.store
            .update(&record.id, RecordUpdate::Lifecycle(to))?;
        debug!(
            record_id = %record.id,
            from = record.lifecycle.describe(),
            to = to.describe(),
            "Lifecycle transition"
        );
        Ok(self.store.get(&record.id)?)
    }
}

fn invalid(record: &Record, operation: &'static str) -> TrashError {
    TrashError::InvalidTransition {
        id: record.id.clone(),
        operation,
        state: record.lifecycle.describe(),
    }
}

/// Trashed records, most recently deleted first.
pub fn trashed(records: &[Record]) -> Vec<Record> {
    let mut trashed: Vec<Record> = records
        .iter()
        .filter(|record| record.lifecycle.is_soft_deleted())
        .cloned()
        .collect();
    trashed.sort_by(|a, b| b.lifecycle.deleted_at().cmp(&a.lifecycle.deleted_at()));
    trashed
}

/// Records in normal listings.
pub fn active(records: &[Record]) -> Vec<Record> {
    records
        .iter()
        .filter(|record| record.lifecycle.is_active())
        .cloned()
        .collect()
}

/// Number of records in the trash.
pub fn trash_count(records: &[Record]) -> usize {
    records
        .iter()
        .filter(|record| record.lifecycle.is_soft_deleted())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{EncryptedFields, InMemoryStore, RecordKind};
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap()
    }

    fn seeded(store: &InMemoryStore, id: &str, lifecycle: LifecycleState) -> Record {
        let mut record = Record::new(
            RecordId::from(id),
            "u1",
            RecordKind::Note,
            EncryptedFields::new(),
            at(1),
        );
        record.lifecycle = lifecycle;
        store.insert(record.clone());
        record
    }

    #[test]
    fn test_soft_delete_requires_active() {
        let store = InMemoryStore::new();
        let trashed = seeded(&store, "n1", LifecycleState::SoftDeleted { at: at(2) });

        let error = TrashLifecycle::new(&store).soft_delete(&trashed).unwrap_err();
        assert!(matches!(error, TrashError::InvalidTransition { operation: "soft-delete", .. }));
    }

    #[test]
    fn test_restore_requires_soft_deleted() {
        let store = InMemoryStore::new();
        let active = seeded(&store, "n1", LifecycleState::Active);

        let error = TrashLifecycle::new(&store).restore(&active).unwrap_err();
        assert!(matches!(error, TrashError::InvalidTransition { state: "active", .. }));
    }

    #[test]
    fn test_permanently_delete_purged_is_invalid() {
        let store = InMemoryStore::new();
        let mut record = seeded(&store, "n1", LifecycleState::Active);
        record.lifecycle = LifecycleState::Purged;

        assert!(matches!(
            TrashLifecycle::new(&store).permanently_delete(&record),
            Err(TrashError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_permanently_delete_missing_record_surfaces_store_error() {
        let store = InMemoryStore::new();
        let record = Record::new(RecordId::from("ghost"), "u1", RecordKind::Note, EncryptedFields::new(), at(1));

        assert!(matches!(
            TrashLifecycle::new(&store).permanently_delete(&record),
            Err(TrashError::Store(StoreError::NotFound(_)))
        ));
    }

    #[test]
    fn test_empty_all_ignores_active_records() {
        let store = InMemoryStore::new();
        let a = seeded(&store, "a", LifecycleState::Active);
        let b = seeded(&store, "b", LifecycleState::SoftDeleted { at: at(2) });

        let report = TrashLifecycle::new(&store).empty_all(&[a, b]);
        assert_eq!(report.purged, vec![RecordId::from("b")]);
        assert!(store.get(&RecordId::from("a")).is_ok());
    }

    #[test]
    fn test_stale_snapshot_purge_is_idempotent() {
        let store = InMemoryStore::new();
        let record = seeded(&store, "n1", LifecycleState::SoftDeleted { at: at(1) });
        let snapshot = vec![record];
        let trash = TrashLifecycle::new(&store);

        let first = trash.empty_all(&snapshot);
        let second = trash.empty_all(&snapshot);
        assert_eq!(first.purged_count(), 1);
        assert_eq!(second.purged_count(), 0);
        assert!(second.is_clean());
    }

    #[test]
    fn test_purge_keeps_record_restored_after_snapshot() {
        let store = InMemoryStore::new();
        let record = seeded(&store, "n1", LifecycleState::SoftDeleted { at: at(1) });
        let snapshot = vec![record.clone()];
        let trash = TrashLifecycle::new(&store);

        trash.restore(&record).unwrap();
        let expired = trash.purge_expired(&snapshot, Duration::days(1), at(20));
        let emptied = trash.empty_all(&snapshot);

        assert_eq!(expired.purged_count(), 0);
        assert_eq!(emptied.purged_count(), 0);
        assert!(store.get(&record.id).unwrap().lifecycle.is_active());
    }

    #[test]
    fn test_trashed_sorted_most_recent_first() {
        let store = InMemoryStore::new();
        let records = vec![
            seeded(&store, "old", LifecycleState::SoftDeleted { at: at(2) }),
            seeded(&store, "live", LifecycleState::Active),
            seeded(&store, "new", LifecycleState::SoftDeleted { at: at(5) }),
        ];

        let ids: Vec<String> = trashed(&records).into_iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["new", "old"]);
        assert_eq!(active(&records).len(), 1);
        assert_eq!(trash_count(&records), 2);
    }

    #[test]
    fn test_purge_emits_events() {
        let store = InMemoryStore::new();
        let record = seeded(&store, "n1", LifecycleState::SoftDeleted { at: at(1) });
        let (events, mut rx) = crate::events::channel();

        TrashLifecycle::new(&store)
            .with_events(events)
            .purge_expired(&[record], Duration::days(1), at(10));

        assert_eq!(
            rx.try_recv().unwrap(),
            LifecycleEvent::TrashItemPurged {
                id: RecordId::from("n1")
            }
        );
    }
}
