//! Encrypting, creating, updating and loading notes and folders.

use super::Vault;
use crate::constants::{FIELD_CONTENT, FIELD_NAME, FIELD_TITLE};
use crate::crypto::{self, DecryptionResolver, EncryptedBlob, EncryptionKey, KeySource};
use crate::errors::{AppError, AppResult, CryptoError, TrashError};
use crate::records::{
    EncryptedFields, LifecycleState, Record, RecordId, RecordKind, RecordStore, RecordUpdate,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// A record with its fields decrypted.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct DecryptedRecord {
    /// Record id
    pub id: RecordId,
    /// Note or folder
    pub kind: RecordKind,
    /// Plaintext field values
    pub fields: BTreeMap<String, String>,
    /// Trash state
    pub lifecycle: LifecycleState,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl DecryptedRecord {
    /// The note title, if present.
    pub fn title(&self) -> Option<&str> {
        self.fields.get(FIELD_TITLE).map(String::as_str)
    }

    /// The note body, if present.
    pub fn content(&self) -> Option<&str> {
        self.fields.get(FIELD_CONTENT).map(String::as_str)
    }

    /// The folder name, if present.
    pub fn name(&self) -> Option<&str> {
        self.fields.get(FIELD_NAME).map(String::as_str)
    }

    /// Title for notes, name for folders.
    pub fn label(&self) -> &str {
        match self.kind {
            RecordKind::Note => self.title(),
            RecordKind::Folder => self.name(),
        }
        .unwrap_or("")
    }
}

impl fmt::Debug for DecryptedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedRecord")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

/// Result of loading every record of a user.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Records that decrypted, oldest first
    pub records: Vec<DecryptedRecord>,
    /// Records no known key could open
    pub skipped: Vec<RecordId>,
    /// Legacy records re-encrypted under the current key
    pub migrated: Vec<RecordId>,
}

impl LoadReport {
    /// Decrypted records that are not in the trash.
    pub fn active(&self) -> impl Iterator<Item = &DecryptedRecord> {
        self.records.iter().filter(|r| r.lifecycle.is_active())
    }

    /// Decrypted records that are in the trash.
    pub fn trashed(&self) -> impl Iterator<Item = &DecryptedRecord> {
        self.records.iter().filter(|r| r.lifecycle.is_soft_deleted())
    }
}

fn encrypt_fields(pairs: &[(&str, &str)], key: &EncryptionKey) -> Result<EncryptedFields, CryptoError> {
    pairs
        .iter()
        .map(|(name, value)| crypto::encrypt_text(value, key).map(|blob| (name.to_string(), blob)))
        .collect()
}

fn decrypt_record(
    resolver: &DecryptionResolver,
    record: &Record,
) -> Result<(DecryptedRecord, bool), CryptoError> {
    let mut fields = BTreeMap::new();
    let mut used_legacy = false;
    for (name, blob) in &record.fields {
        let (text, source) = resolver.resolve_text(&record.id, blob)?;
        used_legacy |= source != KeySource::Primary;
        fields.insert(name.clone(), text);
    }

    Ok((
        DecryptedRecord {
            id: record.id.clone(),
            kind: record.kind,
            fields,
            lifecycle: record.lifecycle,
            created_at: record.created_at,
            updated_at: record.updated_at,
        },
        used_legacy,
    ))
}

impl<S: RecordStore> Vault<S> {
    /// Encrypts a field value under the live key.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` when locked.
    pub fn encrypt_text(&self, text: &str) -> AppResult<EncryptedBlob> {
        let key = self.live_key()?;
        Ok(crypto::encrypt_text(text, &key)?)
    }

    /// Decrypts a field value of `record_id`, falling back to legacy keys.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotActive` when locked.
    /// - `CryptoError::UnrecoverableDecryption` when no key opens the blob.
    pub fn decrypt_text(&self, record_id: &RecordId, blob: &EncryptedBlob) -> AppResult<String> {
        let (text, _) = self.resolver()?.resolve_text(record_id, blob)?;
        Ok(text)
    }

    /// Encrypts and stores a new note.
    pub fn create_note(&self, title: &str, content: &str) -> AppResult<RecordId> {
        let key = self.live_key()?;
        let fields = encrypt_fields(&[(FIELD_TITLE, title), (FIELD_CONTENT, content)], &key)?;
        let id = self.store.create(&self.user_id, RecordKind::Note, fields)?;
        self.note_activity();
        info!(record_id = %id, "Note created");
        Ok(id)
    }

    /// Encrypts and stores a new folder.
    pub fn create_folder(&self, name: &str) -> AppResult<RecordId> {
        let key = self.live_key()?;
        let fields = encrypt_fields(&[(FIELD_NAME, name)], &key)?;
        let id = self.store.create(&self.user_id, RecordKind::Folder, fields)?;
        self.note_activity();
        info!(record_id = %id, "Folder created");
        Ok(id)
    }

    /// Re-encrypts the given fields of an active note. `None` leaves a field as is.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotActive` when locked.
    /// - `TrashError::InvalidTransition` if the note is in the trash.
    /// - `StoreError::NotFound` if the note does not exist for this user.
    pub fn update_note(
        &self,
        id: &RecordId,
        title: Option<&str>,
        content: Option<&str>,
    ) -> AppResult<()> {
        let key = self.live_key()?;
        let record = self.owned_record(id)?;
        if !record.lifecycle.is_active() {
            return Err(TrashError::InvalidTransition {
                id: id.clone(),
                operation: "edit",
                state: record.lifecycle.describe(),
            }
            .into());
        }

        let pairs: Vec<(&str, &str)> = [(FIELD_TITLE, title), (FIELD_CONTENT, content)]
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect();
        if pairs.is_empty() {
            return Ok(());
        }

        let fields = encrypt_fields(&pairs, &key)?;
        self.store.update(id, RecordUpdate::Fields(fields))?;
        self.note_activity();
        debug!(record_id = %id, "Note updated");
        Ok(())
    }

    /// Loads and decrypts every record of this user, including trashed ones.
    ///
    /// Records that no known key can open are skipped and listed in the report
    /// instead of failing the whole load. With `migrate_on_read`, records opened
    /// by a legacy key are re-encrypted under the live key.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotActive` when locked.
    /// - `CryptoError::KeyDerivation` if legacy keys cannot be derived.
    /// - Store errors from querying.
    pub fn load_records(&self) -> AppResult<LoadReport> {
        let resolver = self.resolver()?;
        let records = self.store.query(&self.user_id)?;
        let mut report = LoadReport::default();

        for record in &records {
            match decrypt_record(&resolver, record) {
                Ok((decrypted, used_legacy)) => {
                    if used_legacy
                        && self.settings.migrate_on_read
                        && self.migrate(record, &decrypted, resolver.primary())
                    {
                        report.migrated.push(record.id.clone());
                    }
                    report.records.push(decrypted);
                }
                Err(CryptoError::UnrecoverableDecryption { .. })
                | Err(CryptoError::MalformedPlaintext) => {
                    warn!(record_id = %record.id, "Skipping record that could not be decrypted");
                    report.skipped.push(record.id.clone());
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.note_activity();
        info!(
            loaded = report.records.len(),
            skipped = report.skipped.len(),
            migrated = report.migrated.len(),
            "Records loaded"
        );
        Ok(report)
    }

    fn migrate(&self, record: &Record, decrypted: &DecryptedRecord, key: &EncryptionKey) -> bool {
        let pairs: Vec<(&str, &str)> = decrypted
            .fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();

        let result = encrypt_fields(&pairs, key)
            .map_err(AppError::from)
            .and_then(|fields| {
                self.store
                    .update(&record.id, RecordUpdate::Fields(fields))
                    .map_err(Into::into)
            });

        match result {
            Ok(()) => {
                info!(record_id = %record.id, "Legacy record re-encrypted under current key");
                true
            }
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "Failed to migrate legacy record");
                false
            }
        }
    }
}
