//! `RecordStore` implementation over the `records` table.
//!
//! Every operation is a single statement or a single transaction, so a purge
//! racing a restore of the same id is serialized by SQLite. Purges re-check the
//! trash state inside their transaction before removing a row.

use super::Database;
use crate::crypto::EncryptedBlob;
use crate::errors::StoreError;
use crate::records::{
    reject_purged_update, EncryptedFields, LifecycleState, Record, RecordId, RecordKind,
    RecordStore, RecordUpdate,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, kind, fields, is_deleted, deleted_at, created_at, updated_at FROM records";

/// A row as stored, before validation.
struct RawRecord {
    id: String,
    user_id: String,
    kind: String,
    fields: String,
    is_deleted: bool,
    deleted_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            kind: row.get(2)?,
            fields: row.get(3)?,
            is_deleted: row.get(4)?,
            deleted_at: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_record(self) -> Result<Record, StoreError> {
        let kind = RecordKind::parse(&self.kind).ok_or_else(|| {
            StoreError::Corrupt(format!("record {} has unknown kind '{}'", self.id, self.kind))
        })?;

        let lifecycle = match (self.is_deleted, self.deleted_at.as_deref()) {
            (false, None) => LifecycleState::Active,
            (true, Some(at)) => LifecycleState::SoftDeleted {
                at: parse_timestamp(&self.id, at)?,
            },
            _ => {
                return Err(StoreError::Corrupt(format!(
                    "record {} has inconsistent deletion state",
                    self.id
                )))
            }
        };

        Ok(Record {
            fields: decode_fields(&self.id, &self.fields)?,
            kind,
            lifecycle,
            created_at: parse_timestamp(&self.id, &self.created_at)?,
            updated_at: parse_timestamp(&self.id, &self.updated_at)?,
            user_id: self.user_id,
            id: RecordId::from(self.id),
        })
    }
}

/// Field map as stored: field name to base64 text.
type StoredFields = BTreeMap<String, String>;

/// Decodes the stored field map.
///
/// A value that is not valid base64 becomes an empty blob. It fails
/// authentication at decrypt time, so only that record is skipped.
fn decode_fields(id: &str, raw: &str) -> Result<EncryptedFields, StoreError> {
    let stored: StoredFields = serde_json::from_str(raw)?;
    Ok(stored
        .into_iter()
        .map(|(name, encoded)| {
            let blob = EncryptedBlob::from_base64(&encoded).unwrap_or_else(|_| {
                warn!(record_id = id, field = %name, "Stored field is not valid base64");
                EncryptedBlob::from_bytes(Vec::new())
            });
            (name, blob)
        })
        .collect())
}

fn parse_timestamp(id: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("record {} has invalid timestamp: {}", id, e)))
}

impl Database {
    /// Inserts a fully formed record, e.g. one imported from another store.
    ///
    /// # Errors
    ///
    /// Returns an error if the id already exists or the row cannot be written.
    pub fn insert_record(&self, record: &Record) -> Result<(), StoreError> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO records (id, user_id, kind, fields, is_deleted, deleted_at, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                record.id.as_str(),
                record.user_id,
                record.kind.as_str(),
                serde_json::to_string(&record.fields)?,
                record.lifecycle.is_soft_deleted(),
                record.lifecycle.deleted_at().map(|at| at.to_rfc3339()),
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

impl RecordStore for Database {
    fn create(
        &self,
        user_id: &str,
        kind: RecordKind,
        fields: EncryptedFields,
    ) -> Result<RecordId, StoreError> {
        let record = Record::new(RecordId::generate(), user_id, kind, fields, Utc::now());
        self.insert_record(&record)?;
        debug!(record_id = %record.id, kind = %kind, "Created record");
        Ok(record.id)
    }

    fn update(&self, id: &RecordId, update: RecordUpdate) -> Result<(), StoreError> {
        reject_purged_update(id, &update)?;
        let now = Utc::now().to_rfc3339();
        let mut conn = self.get_conn()?;

        let changed = match update {
            RecordUpdate::Lifecycle(state) => conn.execute(
                "UPDATE records SET is_deleted = ?1, deleted_at = ?2, updated_at = ?3 WHERE id = ?4",
                params![
                    state.is_soft_deleted(),
                    state.deleted_at().map(|at| at.to_rfc3339()),
                    now,
                    id.as_str()
                ],
            )?,
            RecordUpdate::Fields(fields) => {
                let tx = conn.transaction()?;
                let existing: Option<String> = tx
                    .query_row(
                        "SELECT fields FROM records WHERE id = ?1",
                        [id.as_str()],
                        |row| row.get(0),
                    )
                    .optional()?;
                let Some(existing) = existing else {
                    return Err(StoreError::NotFound(id.clone()));
                };

                let mut merged: StoredFields = serde_json::from_str(&existing)?;
                merged.extend(fields.into_iter().map(|(name, blob)| (name, blob.to_base64())));
                let changed = tx.execute(
                    "UPDATE records SET fields = ?1, updated_at = ?2 WHERE id = ?3",
                    params![serde_json::to_string(&merged)?, now, id.as_str()],
                )?;
                tx.commit()?;
                changed
            }
        };

        if changed == 0 {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(())
    }

    fn delete(&self, id: &RecordId) -> Result<(), StoreError> {
        let conn = self.get_conn()?;
        let changed = conn.execute("DELETE FROM records WHERE id = ?1", [id.as_str()])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.clone()));
        }
        debug!(record_id = %id, "Deleted record");
        Ok(())
    }

    fn delete_trashed(
        &self,
        id: &RecordId,
        deleted_at_or_before: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let state: Option<(bool, Option<String>)> = tx
            .query_row(
                "SELECT is_deleted, deleted_at FROM records WHERE id = ?1",
                [id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((is_deleted, deleted_at)) = state else {
            return Err(StoreError::NotFound(id.clone()));
        };

        let eligible = match (is_deleted, deleted_at.as_deref()) {
            (true, Some(at)) => {
                let at = parse_timestamp(id.as_str(), at)?;
                deleted_at_or_before.map_or(true, |cutoff| at <= cutoff)
            }
            _ => false,
        };
        if !eligible {
            return Ok(false);
        }

        tx.execute("DELETE FROM records WHERE id = ?1", [id.as_str()])?;
        tx.commit()?;
        debug!(record_id = %id, "Deleted trashed record");
        Ok(true)
    }

    fn query(&self, user_id: &str) -> Result<Vec<Record>, StoreError> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE user_id = ?1 ORDER BY created_at ASC, id ASC",
            SELECT_COLUMNS
        ))?;
        let rows = stmt
            .query_map([user_id], RawRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(RawRecord::into_record).collect()
    }

    fn get(&self, id: &RecordId) -> Result<Record, StoreError> {
        let conn = self.get_conn()?;
        conn.query_row(
            &format!("{} WHERE id = ?1", SELECT_COLUMNS),
            [id.as_str()],
            RawRecord::from_row,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(id.clone()))?
        .into_record()
    }
}
