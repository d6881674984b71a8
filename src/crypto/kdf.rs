//! Credential-to-key derivation.
//!
//! Keys are derived with PBKDF2-HMAC-SHA256 over a salt of
//! `KDF_VERSION_PREFIX || user_id`. Derivation is deterministic so the key can be
//! re-derived after a restart instead of being persisted anywhere.

use crate::constants::{DEFAULT_PBKDF2_ITERATIONS, KDF_VERSION_PREFIX, KEY_LEN, REDACTED_PLACEHOLDER};
use crate::errors::CryptoError;
use hmac::Hmac;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// A 256-bit symmetric key.
///
/// The bytes are zeroized when the last copy is dropped and are never exposed
/// outside this crate. `Debug` output is redacted.
#[derive(Clone)]
pub struct EncryptionKey(Zeroizing<[u8; KEY_LEN]>);

impl EncryptionKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl PartialEq for EncryptionKey {
    /// Constant-time comparison.
    fn eq(&self, other: &Self) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl Eq for EncryptionKey {}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EncryptionKey")
            .field(&REDACTED_PLACEHOLDER)
            .finish()
    }
}

/// The credential-to-key schemes this application has used over time.
///
/// Records written under an older scheme stay readable because the decryption
/// resolver retries them with keys from [`CredentialScheme::legacy_candidates`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialScheme {
    /// User-chosen password, versioned salt.
    Password,
    /// Provider-issued stable user id used as the credential, versioned salt.
    ProviderIdentity,
    /// Provider user id as the credential with the bare user id as salt.
    LegacyUnversioned,
}

impl CredentialScheme {
    /// Legacy schemes in the order the resolver tries them.
    pub const LEGACY_PRIORITY: [CredentialScheme; 2] = [
        CredentialScheme::ProviderIdentity,
        CredentialScheme::LegacyUnversioned,
    ];

    /// Builds the salt this scheme uses for `user_id`.
    pub fn salt(&self, user_id: &str) -> String {
        match self {
            CredentialScheme::Password | CredentialScheme::ProviderIdentity => user_salt(user_id),
            CredentialScheme::LegacyUnversioned => user_id.to_string(),
        }
    }

    /// Whether deriving this scheme's key needs a secret the core does not keep.
    pub fn requires_secret(&self) -> bool {
        matches!(self, CredentialScheme::Password)
    }

    /// Schemes worth retrying after the primary key fails, in priority order.
    ///
    /// Only schemes derivable from the user id alone qualify, since the user's
    /// password is never retained after unlock.
    pub fn legacy_candidates(primary: CredentialScheme) -> Vec<CredentialScheme> {
        Self::LEGACY_PRIORITY
            .into_iter()
            .filter(|scheme| *scheme != primary)
            .collect()
    }

    /// Short lowercase name used in logs and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialScheme::Password => "password",
            CredentialScheme::ProviderIdentity => "provider_identity",
            CredentialScheme::LegacyUnversioned => "legacy_unversioned",
        }
    }
}

impl fmt::Display for CredentialScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the versioned salt for a user.
///
/// # Example
///
/// ```
/// use notecrypt::crypto::user_salt;
///
/// assert_eq!(user_salt("u1"), "securenotes_v1_u1");
/// ```
pub fn user_salt(user_id: &str) -> String {
    format!("{}{}", KDF_VERSION_PREFIX, user_id)
}

/// PBKDF2-HMAC-SHA256 key derivation with a fixed work factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDerivation {
    iterations: u32,
}

impl Default for KeyDerivation {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }
}

impl KeyDerivation {
    /// Creates a derivation with a custom iteration count.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::KeyDerivation` if `iterations` is zero.
    pub fn new(iterations: u32) -> Result<Self, CryptoError> {
        if iterations == 0 {
            return Err(CryptoError::KeyDerivation(
                "iteration count must be greater than zero".to_string(),
            ));
        }
        if iterations < DEFAULT_PBKDF2_ITERATIONS {
            warn!(
                iterations,
                recommended = DEFAULT_PBKDF2_ITERATIONS,
                "PBKDF2 iteration count below recommended work factor"
            );
        }
        Ok(Self { iterations })
    }

    /// The configured iteration count.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Derives the key for `credential` bound to `user_id` with the versioned salt.
    ///
    /// # Example
    ///
    /// ```
    /// use notecrypt::crypto::KeyDerivation;
    /// use secrecy::SecretString;
    ///
    /// let kdf = KeyDerivation::new(1_000)?;
    /// let password = SecretString::new("correct horse".to_string());
    /// let first = kdf.derive(&password, "user-1")?;
    /// let second = kdf.derive(&password, "user-1")?;
    /// assert_eq!(first, second);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn derive(
        &self,
        credential: &SecretString,
        user_id: &str,
    ) -> Result<EncryptionKey, CryptoError> {
        self.derive_scheme(CredentialScheme::Password, credential, user_id)
    }

    /// Derives a key using the salt rule of `scheme`.
    pub fn derive_scheme(
        &self,
        scheme: CredentialScheme,
        credential: &SecretString,
        user_id: &str,
    ) -> Result<EncryptionKey, CryptoError> {
        debug!(scheme = %scheme, iterations = self.iterations, "Deriving encryption key");
        let salt = scheme.salt(user_id);
        self.derive_raw(credential.expose_secret().as_bytes(), salt.as_bytes())
    }

    /// Derives a key for a scheme whose credential is the user id itself.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::KeyDerivation` for schemes that need a secret.
    pub fn derive_from_identity(
        &self,
        scheme: CredentialScheme,
        user_id: &str,
    ) -> Result<EncryptionKey, CryptoError> {
        if scheme.requires_secret() {
            return Err(CryptoError::KeyDerivation(format!(
                "scheme '{}' cannot be derived without the user's credential",
                scheme
            )));
        }
        let credential = SecretString::new(user_id.to_string());
        self.derive_scheme(scheme, &credential, user_id)
    }

    fn derive_raw(&self, secret: &[u8], salt: &[u8]) -> Result<EncryptionKey, CryptoError> {
        let mut key = EncryptionKey::from_bytes([0u8; KEY_LEN]);
        pbkdf2::pbkdf2::<Hmac<Sha256>>(secret, salt, self.iterations, &mut key.0[..])
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok(key)
    }
}

/// Derives a key with the default work factor.
pub fn derive_key(credential: &SecretString, user_id: &str) -> Result<EncryptionKey, CryptoError> {
    KeyDerivation::default().derive(credential, user_id)
}
