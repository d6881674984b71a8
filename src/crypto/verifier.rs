//! Password verifiers.
//!
//! A verifier is a fixed marker encrypted under the user's key. Checking a newly
//! derived key against it tells a wrong password apart from a damaged record
//! before any note is touched.

use crate::constants::PASSWORD_VERIFIER_MARKER;
use crate::crypto::cipher::{decrypt, encrypt, EncryptedBlob};
use crate::crypto::kdf::EncryptionKey;
use crate::errors::CryptoError;

/// Encrypts the verifier marker under `key`.
pub fn create_verifier(key: &EncryptionKey) -> Result<EncryptedBlob, CryptoError> {
    encrypt(PASSWORD_VERIFIER_MARKER.as_bytes(), key)
}

/// Returns `true` when `key` authenticates `verifier` and yields the marker.
pub fn verify(key: &EncryptionKey, verifier: &EncryptedBlob) -> bool {
    matches!(decrypt(verifier, key), Ok(plaintext) if plaintext == PASSWORD_VERIFIER_MARKER.as_bytes())
}

/// Like [`verify`], but reports a mismatch as `CryptoError::InvalidCredential`.
pub fn ensure_verified(key: &EncryptionKey, verifier: &EncryptedBlob) -> Result<(), CryptoError> {
    if verify(key, verifier) {
        Ok(())
    } else {
        Err(CryptoError::InvalidCredential)
    }
}
