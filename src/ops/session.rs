//! Unlocking, locking and observing the vault's key session.

use super::Vault;
use crate::crypto::{
    create_verifier, ensure_verified, CredentialScheme, DecryptionResolver, EncryptedBlob, EncryptionKey,
    LegacyKeyring,
};
use crate::errors::AppResult;
use crate::events::EventReceiver;
use crate::records::RecordStore;
use secrecy::SecretString;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tracing::info;

impl<S: RecordStore> Vault<S> {
    /// Derives the key for `credential` and opens the session with it.
    ///
    /// Any previous session is closed first.
    ///
    /// # Errors
    ///
    /// - `CryptoError::KeyDerivation` if derivation fails; the vault stays locked.
    /// - `SessionError::NoRuntime` outside a Tokio runtime.
    pub fn unlock(&self, credential: &SecretString, scheme: CredentialScheme) -> AppResult<()> {
        let key = self
            .settings
            .kdf
            .derive_scheme(scheme, credential, &self.user_id)?;
        self.open_session(key, scheme)
    }

    /// Like [`unlock`](Self::unlock), but checks the derived key against a
    /// stored password verifier before opening the session.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidCredential` when the verifier does not match.
    pub fn unlock_verified(
        &self,
        credential: &SecretString,
        scheme: CredentialScheme,
        verifier: &EncryptedBlob,
    ) -> AppResult<()> {
        let key = self
            .settings
            .kdf
            .derive_scheme(scheme, credential, &self.user_id)?;
        ensure_verified(&key, verifier)?;
        self.open_session(key, scheme)
    }

    fn open_session(&self, key: EncryptionKey, scheme: CredentialScheme) -> AppResult<()> {
        let listener = Arc::clone(&self.expiry_listener);
        self.session.open(key, move || {
            let callback = listener
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if let Some(callback) = callback {
                callback();
            }
        })?;
        *self.scheme.lock().unwrap_or_else(PoisonError::into_inner) = scheme;

        info!(scheme = %scheme, "Vault unlocked");
        Ok(())
    }

    /// Clears the key immediately. The expiry callback is not invoked.
    pub fn lock(&self) {
        self.session.close();
    }

    /// Whether a key is currently held.
    pub fn is_unlocked(&self) -> bool {
        self.session.is_active()
    }

    /// Records user activity, pushing the expiry deadline back.
    ///
    /// Returns `false` when the vault is locked.
    pub fn note_activity(&self) -> bool {
        self.session.extend().is_some()
    }

    /// Time left before the session expires, or `None` when locked.
    pub fn session_remaining(&self) -> Option<Duration> {
        self.session.remaining()
    }

    /// Registers `callback` to run when the session times out.
    ///
    /// Replaces any earlier callback. It is not invoked on an explicit
    /// [`lock`](Self::lock).
    pub fn on_session_expired<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self
            .expiry_listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    /// Subscribes to session and trash lifecycle events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// The scheme the current key was derived with.
    pub fn credential_scheme(&self) -> CredentialScheme {
        *self.scheme.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A resolver over the live key and this user's legacy keys.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` when locked.
    pub(crate) fn resolver(&self) -> AppResult<DecryptionResolver> {
        let key = self.session.key()?;
        let keyring = LegacyKeyring::new(self.settings.kdf, &self.user_id, self.credential_scheme());
        Ok(keyring.into_resolver(key))
    }

    /// Encrypts a password verifier under the live key.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` when locked.
    pub fn create_verifier(&self) -> AppResult<EncryptedBlob> {
        Ok(create_verifier(&self.live_key()?)?)
    }

    pub(crate) fn live_key(&self) -> AppResult<EncryptionKey> {
        Ok(self.session.key()?)
    }
}
