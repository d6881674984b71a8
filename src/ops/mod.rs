//! High-level operations over an encrypted note vault.
//!
//! A [`Vault`] binds one user id to a record store, an expiring key session and
//! a lifecycle event channel. It is the surface a UI (or the CLI) drives:
//! unlocking, encrypting and loading notes, and moving records through the
//! trash.
//!
//! Trash operations never touch plaintext and work while the vault is locked.

pub mod notes;
pub mod session;
pub mod trash;

pub use notes::{DecryptedRecord, LoadReport};

use crate::config::Config;
use crate::crypto::{CredentialScheme, KeyDerivation, SecureSession};
use crate::errors::{AppResult, StoreError};
use crate::events::{self, EventSender};
use crate::records::{Record, RecordId, RecordStore};
use crate::trash::TrashLifecycle;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type ExpiryListener = Arc<dyn Fn() + Send + Sync>;

/// Tunables for a [`Vault`].
#[derive(Debug, Clone)]
pub struct VaultSettings {
    /// Key derivation work factor
    pub kdf: KeyDerivation,
    /// Inactivity timeout of the key session
    pub session_timeout: Duration,
    /// Lead time of the `SessionExpiring` warning
    pub warning_time: Duration,
    /// Age at which trashed records are purged
    pub trash_retention: chrono::Duration,
    /// Re-encrypt records opened with a legacy key under the current key
    pub migrate_on_read: bool,
}

impl Default for VaultSettings {
    fn default() -> Self {
        let config = Config::default();
        Self {
            kdf: KeyDerivation::default(),
            session_timeout: config.session_timeout(),
            warning_time: config.warning_time(),
            trash_retention: config.trash_retention(),
            migrate_on_read: config.migrate_on_read,
        }
    }
}

impl VaultSettings {
    /// Settings taken from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Crypto` if the configured iteration count is invalid.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        Ok(Self {
            kdf: config.key_derivation()?,
            session_timeout: config.session_timeout(),
            warning_time: config.warning_time(),
            trash_retention: config.trash_retention(),
            migrate_on_read: config.migrate_on_read,
        })
    }
}

/// One user's encrypted notes, their key session and their trash.
///
/// # Example
///
/// ```no_run
/// use notecrypt::crypto::CredentialScheme;
/// use notecrypt::ops::{Vault, VaultSettings};
/// use notecrypt::records::InMemoryStore;
/// use secrecy::SecretString;
///
/// # async fn run() -> notecrypt::AppResult<()> {
/// let vault = Vault::new(InMemoryStore::new(), "user-1", VaultSettings::default());
/// vault.unlock(&SecretString::new("passphrase".into()), CredentialScheme::Password)?;
///
/// let id = vault.create_note("Groceries", "milk, eggs")?;
/// let loaded = vault.load_records()?;
/// assert_eq!(loaded.records[0].title(), Some("Groceries"));
///
/// vault.soft_delete_note(&id)?;
/// vault.lock();
/// # Ok(())
/// # }
/// ```
pub struct Vault<S: RecordStore> {
    store: S,
    user_id: String,
    settings: VaultSettings,
    session: SecureSession,
    scheme: Mutex<CredentialScheme>,
    events: EventSender,
    expiry_listener: Arc<Mutex<Option<ExpiryListener>>>,
}

impl<S: RecordStore> Vault<S> {
    /// Creates a locked vault for `user_id` over `store`.
    pub fn new(store: S, user_id: impl Into<String>, settings: VaultSettings) -> Self {
        let (events, _) = events::channel();
        let session = SecureSession::new(settings.session_timeout)
            .with_warning(settings.warning_time)
            .with_events(events.clone());

        Self {
            store,
            user_id: user_id.into(),
            settings,
            session,
            scheme: Mutex::new(CredentialScheme::Password),
            events,
            expiry_listener: Arc::new(Mutex::new(None)),
        }
    }

    /// The user this vault belongs to.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The underlying record store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The settings this vault was built with.
    pub fn settings(&self) -> &VaultSettings {
        &self.settings
    }

    fn trash(&self) -> TrashLifecycle<'_, S> {
        TrashLifecycle::new(&self.store).with_events(self.events.clone())
    }

    /// Fetches a record owned by this vault's user.
    ///
    /// Records of other users are reported as not found.
    fn owned_record(&self, id: &RecordId) -> AppResult<Record> {
        let record = self.store.get(id)?;
        if record.user_id != self.user_id {
            return Err(StoreError::NotFound(id.clone()).into());
        }
        Ok(record)
    }
}
