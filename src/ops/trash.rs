//! Trash operations by record id. None of these need an unlocked session.

use super::Vault;
use crate::errors::AppResult;
use crate::records::{Record, RecordId, RecordStore};
use crate::trash::{self, PurgeReport};
use chrono::{DateTime, Utc};

impl<S: RecordStore> Vault<S> {
    /// Moves a note or folder to the trash.
    pub fn soft_delete_note(&self, id: &RecordId) -> AppResult<Record> {
        let record = self.owned_record(id)?;
        Ok(self.trash().soft_delete(&record)?)
    }

    /// Returns a trashed note or folder to normal listings.
    pub fn restore_note(&self, id: &RecordId) -> AppResult<Record> {
        let record = self.owned_record(id)?;
        Ok(self.trash().restore(&record)?)
    }

    /// Removes a note or folder for good, whether or not it is in the trash.
    pub fn permanently_delete_note(&self, id: &RecordId) -> AppResult<()> {
        let record = self.owned_record(id)?;
        self.trash().permanently_delete(&record)?;
        Ok(())
    }

    /// Removes every trashed record of this user.
    pub fn empty_trash(&self) -> AppResult<PurgeReport> {
        let records = self.store.query(&self.user_id)?;
        Ok(self.trash().empty_all(&records))
    }

    /// Purges trashed records older than the configured retention.
    pub fn run_purge(&self) -> AppResult<PurgeReport> {
        self.run_purge_at(Utc::now())
    }

    /// Purges trashed records whose age at `now` reaches the configured retention.
    pub fn run_purge_at(&self, now: DateTime<Utc>) -> AppResult<PurgeReport> {
        let records = self.store.query(&self.user_id)?;
        Ok(self
            .trash()
            .purge_expired(&records, self.settings.trash_retention, now))
    }

    /// Trashed records, most recently deleted first. Fields stay encrypted.
    pub fn list_trash(&self) -> AppResult<Vec<Record>> {
        Ok(trash::trashed(&self.store.query(&self.user_id)?))
    }

    /// Number of records in the trash.
    pub fn trash_count(&self) -> AppResult<usize> {
        Ok(trash::trash_count(&self.store.query(&self.user_id)?))
    }
}
