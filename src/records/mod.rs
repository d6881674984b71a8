//! Encrypted records and the store they live in.
//!
//! A record is a note or folder whose user-visible fields are held only as
//! [`EncryptedBlob`]s. Its trash state is a [`LifecycleState`], which makes a
//! deletion timestamp without the deleted flag (or the reverse) unrepresentable.
//!
//! Storage is abstracted behind [`RecordStore`]. [`InMemoryStore`] is provided for
//! tests and embedders; [`crate::db::Database`] persists to SQLite.

mod memory;

pub use memory::InMemoryStore;

use crate::crypto::EncryptedBlob;
use crate::errors::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Field name to ciphertext map of a record.
pub type EncryptedFields = BTreeMap<String, EncryptedBlob>;

/// Opaque record identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// What a record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A note with a title and content.
    Note,
    /// A folder with a name.
    Folder,
}

impl RecordKind {
    /// Lowercase name used in storage and output.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Note => "note",
            RecordKind::Folder => "folder",
        }
    }

    /// Parses a stored kind name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "note" => Some(RecordKind::Note),
            "folder" => Some(RecordKind::Folder),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trash state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LifecycleState {
    /// Visible in normal listings.
    Active,
    /// In the trash since `at`.
    SoftDeleted {
        /// When the record was moved to the trash
        at: DateTime<Utc>,
    },
    /// Removed from the store; terminal.
    Purged,
}

impl LifecycleState {
    /// Whether the record is in normal listings.
    pub fn is_active(&self) -> bool {
        matches!(self, LifecycleState::Active)
    }

    /// Whether the record is in the trash.
    pub fn is_soft_deleted(&self) -> bool {
        matches!(self, LifecycleState::SoftDeleted { .. })
    }

    /// Whether the record has been permanently removed.
    pub fn is_purged(&self) -> bool {
        matches!(self, LifecycleState::Purged)
    }

    /// When the record entered the trash, if it is there.
    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self {
            LifecycleState::SoftDeleted { at } => Some(*at),
            _ => None,
        }
    }

    /// Whether the record is in the trash and was deleted no later than
    /// `cutoff`. `None` accepts any deletion time.
    pub fn is_trashed_by(&self, cutoff: Option<DateTime<Utc>>) -> bool {
        self.deleted_at()
            .is_some_and(|at| cutoff.map_or(true, |cutoff| at <= cutoff))
    }

    /// Human-readable state used in error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            LifecycleState::Active => "active",
            LifecycleState::SoftDeleted { .. } => "in the trash",
            LifecycleState::Purged => "purged",
        }
    }
}

/// A stored note or folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Store-assigned identifier
    pub id: RecordId,
    /// Owner of the record
    pub user_id: String,
    /// Note or folder
    pub kind: RecordKind,
    /// Encrypted user-visible fields
    pub fields: EncryptedFields,
    /// Trash state
    pub lifecycle: LifecycleState,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// Builds a new active record stamped with `now`.
    pub fn new(
        id: RecordId,
        user_id: impl Into<String>,
        kind: RecordKind,
        fields: EncryptedFields,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            kind,
            fields,
            lifecycle: LifecycleState::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies `update` in place and bumps `updated_at`.
    ///
    /// Field updates merge into the existing map; fields not named are kept.
    pub fn apply(&mut self, update: RecordUpdate, now: DateTime<Utc>) {
        match update {
            RecordUpdate::Fields(fields) => self.fields.extend(fields),
            RecordUpdate::Lifecycle(state) => self.lifecycle = state,
        }
        self.updated_at = now;
    }
}

/// A change applied through [`RecordStore::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordUpdate {
    /// Replace the named encrypted fields.
    Fields(EncryptedFields),
    /// Move the record to a new trash state. `Purged` is reached via
    /// [`RecordStore::delete`] instead and is rejected here.
    Lifecycle(LifecycleState),
}

/// Persistence collaborator for encrypted records.
///
/// Implementations must apply each call atomically per id; that is what
/// serializes a purge racing a restore of the same record.
pub trait RecordStore: Send + Sync {
    /// Inserts a new active record and returns its id.
    fn create(
        &self,
        user_id: &str,
        kind: RecordKind,
        fields: EncryptedFields,
    ) -> Result<RecordId, StoreError>;

    /// Applies `update` to an existing record.
    fn update(&self, id: &RecordId, update: RecordUpdate) -> Result<(), StoreError>;

    /// Removes a record permanently.
    fn delete(&self, id: &RecordId) -> Result<(), StoreError>;

    /// Removes a record only while it is still in the trash and was deleted
    /// no later than `deleted_at_or_before` (any time when `None`).
    ///
    /// The state check and the removal happen as one step, so a record
    /// restored after the caller read it is kept. Returns `Ok(false)` when the
    /// record exists but is no longer eligible.
    fn delete_trashed(
        &self,
        id: &RecordId,
        deleted_at_or_before: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError>;

    /// Every record owned by `user_id`, oldest first.
    fn query(&self, user_id: &str) -> Result<Vec<Record>, StoreError>;

    /// A single record by id.
    fn get(&self, id: &RecordId) -> Result<Record, StoreError>;
}

impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    fn create(
        &self,
        user_id: &str,
        kind: RecordKind,
        fields: EncryptedFields,
    ) -> Result<RecordId, StoreError> {
        (**self).create(user_id, kind, fields)
    }

    fn update(&self, id: &RecordId, update: RecordUpdate) -> Result<(), StoreError> {
        (**self).update(id, update)
    }

    fn delete(&self, id: &RecordId) -> Result<(), StoreError> {
        (**self).delete(id)
    }

    fn delete_trashed(
        &self,
        id: &RecordId,
        deleted_at_or_before: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        (**self).delete_trashed(id, deleted_at_or_before)
    }

    fn query(&self, user_id: &str) -> Result<Vec<Record>, StoreError> {
        (**self).query(user_id)
    }

    fn get(&self, id: &RecordId) -> Result<Record, StoreError> {
        (**self).get(id)
    }
}

pub(crate) fn reject_purged_update(id: &RecordId, update: &RecordUpdate) -> Result<(), StoreError> {
    if matches!(update, RecordUpdate::Lifecycle(LifecycleState::Purged)) {
        return Err(StoreError::Rejected(format!(
            "record {} cannot be marked purged by update; delete it instead",
            id
        )));
    }
    Ok(())
}
