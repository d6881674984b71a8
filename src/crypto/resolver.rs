//! Decryption with legacy-key fallback.
//!
//! Records written by older releases were encrypted under keys derived with a
//! different credential scheme. A [`DecryptionResolver`] tries the primary key
//! first and, only when that fails, derives the legacy candidates once and tries
//! them in priority order.

use crate::crypto::cipher::{decrypt, EncryptedBlob};
use crate::crypto::kdf::{CredentialScheme, EncryptionKey, KeyDerivation};
use crate::errors::CryptoError;
use crate::records::RecordId;
use once_cell::sync::OnceCell;
use std::fmt;
use tracing::{debug, warn};

/// Candidate keys in the order they are tried.
pub type CandidateKeys = Vec<(CredentialScheme, EncryptionKey)>;

type LegacyDerivation = Box<dyn Fn() -> Result<CandidateKeys, CryptoError> + Send + Sync>;

/// Which key opened a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// The key of the current session.
    Primary,
    /// A key derived under an older credential scheme.
    Legacy(CredentialScheme),
}

/// A successfully decrypted blob and the key that opened it.
#[derive(Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Decrypted bytes
    pub plaintext: Vec<u8>,
    /// Which candidate key succeeded
    pub source: KeySource,
}

impl Resolved {
    /// Whether a legacy key was needed, which makes the record a migration candidate.
    pub fn is_legacy(&self) -> bool {
        matches!(self.source, KeySource::Legacy(_))
    }

    /// Interprets the plaintext as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::MalformedPlaintext` for non-UTF-8 bytes.
    pub fn into_text(self) -> Result<String, CryptoError> {
        String::from_utf8(self.plaintext).map_err(|_| CryptoError::MalformedPlaintext)
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("plaintext", &format_args!("{} bytes", self.plaintext.len()))
            .field("source", &self.source)
            .finish()
    }
}

/// Tries the primary key, then lazily derived legacy keys.
///
/// Scope one resolver to a single decrypt call or a single batch load; legacy
/// keys are derived at most once per resolver.
///
/// # Example
///
/// ```
/// use notecrypt::crypto::{encrypt, DecryptionResolver, KeyDerivation, KeySource, LegacyKeyring, CredentialScheme};
/// use notecrypt::records::RecordId;
/// use secrecy::SecretString;
///
/// let kdf = KeyDerivation::new(1_000)?;
/// let old_key = kdf.derive_from_identity(CredentialScheme::ProviderIdentity, "u1")?;
/// let blob = encrypt(b"written long ago", &old_key)?;
///
/// let primary = kdf.derive(&SecretString::new("new password".into()), "u1")?;
/// let resolver = LegacyKeyring::new(kdf, "u1", CredentialScheme::Password).into_resolver(primary);
///
/// let resolved = resolver.resolve(&RecordId::from("n1"), &blob)?;
/// assert_eq!(resolved.source, KeySource::Legacy(CredentialScheme::ProviderIdentity));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct DecryptionResolver {
    primary: EncryptionKey,
    legacy: LegacyDerivation,
    candidates: OnceCell<CandidateKeys>,
}

impl DecryptionResolver {
    /// Creates a resolver around `primary`, deriving legacy keys with `legacy` on demand.
    pub fn new<F>(primary: EncryptionKey, legacy: F) -> Self
    where
        F: Fn() -> Result<CandidateKeys, CryptoError> + Send + Sync + 'static,
    {
        Self {
            primary,
            legacy: Box::new(legacy),
            candidates: OnceCell::new(),
        }
    }

    /// A resolver with no legacy fallback.
    pub fn primary_only(primary: EncryptionKey) -> Self {
        Self::new(primary, || Ok(Vec::new()))
    }

    /// The primary key this resolver tries first.
    pub fn primary(&self) -> &EncryptionKey {
        &self.primary
    }

    /// Decrypts `blob`, trying each candidate key in order.
    ///
    /// # Errors
    ///
    /// - `CryptoError::UnrecoverableDecryption` when no candidate verifies.
    /// - `CryptoError::KeyDerivation` when deriving the legacy keys fails.
    pub fn resolve(&self, record_id: &RecordId, blob: &EncryptedBlob) -> Result<Resolved, CryptoError> {
        match decrypt(blob, &self.primary) {
            Ok(plaintext) => {
                return Ok(Resolved {
                    plaintext,
                    source: KeySource::Primary,
                })
            }
            Err(CryptoError::AuthenticationFailure) => {
                debug!(record_id = %record_id, "Primary key failed; trying legacy keys");
            }
            Err(e) => return Err(e),
        }

        let candidates = self.candidates.get_or_try_init(|| (self.legacy)())?;
        for (scheme, key) in candidates {
            if let Ok(plaintext) = decrypt(blob, key) {
                warn!(
                    record_id = %record_id,
                    scheme = %scheme,
                    "Record decrypted with legacy key"
                );
                return Ok(Resolved {
                    plaintext,
                    source: KeySource::Legacy(*scheme),
                });
            }
        }

        Err(CryptoError::UnrecoverableDecryption {
            record_id: record_id.clone(),
        })
    }

    /// Like [`resolve`](Self::resolve), returning UTF-8 text alongside its key source.
    pub fn resolve_text(
        &self,
        record_id: &RecordId,
        blob: &EncryptedBlob,
    ) -> Result<(String, KeySource), CryptoError> {
        let resolved = self.resolve(record_id, blob)?;
        let source = resolved.source;
        Ok((resolved.into_text()?, source))
    }
}

impl fmt::Debug for DecryptionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionResolver")
            .field("primary", &self.primary)
            .field("legacy_derived", &self.candidates.get().is_some())
            .finish()
    }
}

/// Derives the legacy candidate keys for one user.
#[derive(Debug, Clone)]
pub struct LegacyKeyring {
    kdf: KeyDerivation,
    user_id: String,
    primary: CredentialScheme,
}

impl LegacyKeyring {
    /// Keyring for `user_id` whose current key uses `primary`.
    pub fn new(kdf: KeyDerivation, user_id: impl Into<String>, primary: CredentialScheme) -> Self {
        Self {
            kdf,
            user_id: user_id.into(),
            primary,
        }
    }

    /// Schemes this keyring derives, in priority order.
    pub fn schemes(&self) -> Vec<CredentialScheme> {
        CredentialScheme::legacy_candidates(self.primary)
    }

    /// Derives every legacy candidate key.
    pub fn derive_all(&self) -> Result<CandidateKeys, CryptoError> {
        self.schemes()
            .into_iter()
            .map(|scheme| {
                self.kdf
                    .derive_from_identity(scheme, &self.user_id)
                    .map(|key| (scheme, key))
            })
            .collect()
    }

    /// Builds a resolver that falls back to this keyring.
    pub fn into_resolver(self, primary: EncryptionKey) -> DecryptionResolver {
        DecryptionResolver::new(primary, move || self.derive_all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::KEY_LEN;
    use crate::crypto::cipher::encrypt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn key(byte: u8) -> EncryptionKey {
        EncryptionKey::from_bytes([byte; KEY_LEN])
    }

    fn id() -> RecordId {
        RecordId::from("rec-1")
    }

    #[test]
    fn test_primary_key_is_tried_first() {
        let blob = encrypt(b"hello", &key(1)).unwrap();
        let resolver = DecryptionResolver::new(key(1), || panic!("legacy keys not needed"));

        let resolved = resolver.resolve(&id(), &blob).unwrap();
        assert_eq!(resolved.plaintext, b"hello");
        assert_eq!(resolved.source, KeySource::Primary);
        assert!(!resolved.is_legacy());
    }

    #[test]
    fn test_falls_back_in_priority_order() {
        let blob = encrypt(b"old", &key(3)).unwrap();
        let resolver = DecryptionResolver::new(key(1), || {
            Ok(vec![
                (CredentialScheme::ProviderIdentity, key(2)),
                (CredentialScheme::LegacyUnversioned, key(3)),
            ])
        });

        let resolved = resolver.resolve(&id(), &blob).unwrap();
        assert_eq!(resolved.plaintext, b"old");
        assert_eq!(
            resolved.source,
            KeySource::Legacy(CredentialScheme::LegacyUnversioned)
        );
    }

    #[test]
    fn test_legacy_keys_derived_once_per_resolver() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let resolver = DecryptionResolver::new(key(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![(CredentialScheme::ProviderIdentity, key(2))])
        });

        for _ in 0..3 {
            let blob = encrypt(b"old", &key(2)).unwrap();
            resolver.resolve(&id(), &blob).unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exhaustion_names_record_only() {
        let blob = encrypt(b"secret words", &key(9)).unwrap();
        let resolver = DecryptionResolver::new(key(1), || {
            Ok(vec![(CredentialScheme::ProviderIdentity, key(2))])
        });

        let error = resolver.resolve(&id(), &blob).unwrap_err();
        assert!(matches!(
            &error,
            CryptoError::UnrecoverableDecryption { record_id } if record_id == &id()
        ));
        assert!(!error.to_string().contains("secret words"));
    }

    #[test]
    fn test_legacy_derivation_error_propagates() {
        let blob = encrypt(b"x", &key(9)).unwrap();
        let resolver = DecryptionResolver::new(key(1), || {
            Err(CryptoError::KeyDerivation("boom".to_string()))
        });

        assert!(matches!(
            resolver.resolve(&id(), &blob),
            Err(CryptoError::KeyDerivation(_))
        ));
    }

    #[test]
    fn test_primary_only_has_no_fallback() {
        let blob = encrypt(b"x", &key(2)).unwrap();
        let resolver = DecryptionResolver::primary_only(key(1));
        assert!(matches!(
            resolver.resolve(&id(), &blob),
            Err(CryptoError::UnrecoverableDecryption { .. })
        ));
    }

    #[test]
    fn test_keyring_derives_identity_schemes() {
        let kdf = KeyDerivation::new(1_000).unwrap();
        let keyring = LegacyKeyring::new(kdf, "uid-1", CredentialScheme::Password);

        let keys = keyring.derive_all().unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].0, CredentialScheme::ProviderIdentity);
        assert_eq!(
            keys[0].1,
            kdf.derive_from_identity(CredentialScheme::ProviderIdentity, "uid-1")
                .unwrap()
        );
        assert_eq!(keys[1].0, CredentialScheme::LegacyUnversioned);
    }

    #[test]
    fn test_resolver_is_sync() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<DecryptionResolver>();
    }

    #[test]
    fn test_resolved_debug_hides_plaintext() {
        let resolved = Resolved {
            plaintext: b"diary".to_vec(),
            source: KeySource::Primary,
        };
        assert!(!format!("{:?}", resolved).contains("diary"));
    }
}
