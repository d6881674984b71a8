//! Authenticated encryption of note fields.
//!
//! Uses AES-256-GCM with a random 96-bit nonce per call.
//!
//! Blob wire format:
//!   [ nonce (12 bytes) | ciphertext + tag (16 bytes) ]
//! transported as standard base64.

use crate::constants::{NONCE_LEN, TAG_LEN};
use crate::crypto::kdf::EncryptionKey;
use crate::errors::CryptoError;
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Self-contained ciphertext produced by a single [`encrypt`] call.
///
/// Carries no key material or metadata; meaningless without its key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct EncryptedBlob(Vec<u8>);

impl EncryptedBlob {
    /// Wraps raw `nonce || ciphertext || tag` bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The raw wire bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of raw bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the blob holds no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encodes the blob for storage.
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.0)
    }

    /// Decodes a stored blob.
    ///
    /// # Errors
    ///
    /// Invalid base64 is reported as `CryptoError::AuthenticationFailure`, the
    /// same outcome as any other unreadable blob.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        BASE64
            .decode(encoded.trim())
            .map(Self)
            .map_err(|_| CryptoError::AuthenticationFailure)
    }
}

impl fmt::Debug for EncryptedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedBlob({} bytes)", self.0.len())
    }
}

impl From<EncryptedBlob> for String {
    fn from(blob: EncryptedBlob) -> Self {
        blob.to_base64()
    }
}

impl TryFrom<String> for EncryptedBlob {
    type Error = CryptoError;

    fn try_from(encoded: String) -> Result<Self, Self::Error> {
        EncryptedBlob::from_base64(&encoded)
    }
}

fn cipher_for(key: &EncryptionKey) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()))
}

/// Encrypts `plaintext` under `key` with a fresh random nonce.
///
/// # Example
///
/// ```
/// use notecrypt::crypto::{decrypt, encrypt, KeyDerivation};
/// use secrecy::SecretString;
///
/// let key = KeyDerivation::new(1_000)?.derive(&SecretString::new("pw".into()), "u1")?;
/// let blob = encrypt(b"Secret note", &key)?;
/// assert_eq!(decrypt(&blob, &key)?, b"Secret note");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn encrypt(plaintext: &[u8], key: &EncryptionKey) -> Result<EncryptedBlob, CryptoError> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher_for(key)
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(EncryptedBlob(out))
}

/// Decrypts a blob produced by [`encrypt`].
///
/// # Errors
///
/// Returns `CryptoError::AuthenticationFailure` for a wrong key, a truncated
/// blob or any modified byte.
pub fn decrypt(blob: &EncryptedBlob, key: &EncryptionKey) -> Result<Vec<u8>, CryptoError> {
    let bytes = blob.as_bytes();
    if bytes.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::AuthenticationFailure);
    }
    let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);

    cipher_for(key)
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailure)
}

/// Encrypts a UTF-8 field value.
pub fn encrypt_text(text: &str, key: &EncryptionKey) -> Result<EncryptedBlob, CryptoError> {
    encrypt(text.as_bytes(), key)
}

/// Decrypts a blob and interprets it as UTF-8 text.
///
/// # Errors
///
/// `AuthenticationFailure` when the tag does not verify, `MalformedPlaintext`
/// when authenticated bytes are not UTF-8.
pub fn decrypt_text(blob: &EncryptedBlob, key: &EncryptionKey) -> Result<String, CryptoError> {
    let bytes = decrypt(blob, key)?;
    String::from_utf8(bytes).map_err(|_| CryptoError::MalformedPlaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::KEY_LEN;

    fn key(byte: u8) -> EncryptionKey {
        EncryptionKey::from_bytes([byte; KEY_LEN])
    }

    #[test]
    fn test_blob_layout() {
        let blob = encrypt(b"hello", &key(1)).unwrap();
        assert_eq!(blob.len(), NONCE_LEN + 5 + TAG_LEN);
    }

    #[test]
    fn test_empty_plaintext_roundtrip() {
        let blob = encrypt(b"", &key(1)).unwrap();
        assert_eq!(blob.len(), NONCE_LEN + TAG_LEN);
        assert!(decrypt(&blob, &key(1)).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_blob_is_authentication_failure() {
        let short = EncryptedBlob::from_bytes(vec![0u8; NONCE_LEN + TAG_LEN - 1]);
        assert!(matches!(
            decrypt(&short, &key(1)),
            Err(CryptoError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_invalid_base64_is_authentication_failure() {
        assert!(matches!(
            EncryptedBlob::from_base64("not base64!!"),
            Err(CryptoError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_base64_roundtrip_preserves_bytes() {
        let blob = encrypt(b"note", &key(2)).unwrap();
        let decoded = EncryptedBlob::from_base64(&blob.to_base64()).unwrap();
        assert_eq!(decoded, blob);
    }

    #[test]
    fn test_serde_uses_base64_string() {
        let blob = encrypt(b"note", &key(2)).unwrap();
        let json = serde_json::to_string(&blob).unwrap();
        assert_eq!(json, format!("\"{}\"", blob.to_base64()));
        let back: EncryptedBlob = serde_json::from_str(&json).unwrap();
        assert_eq!(back, blob);
    }

    #[test]
    fn test_decrypt_text_rejects_non_utf8() {
        let blob = encrypt(&[0xff, 0xfe, 0xfd], &key(3)).unwrap();
        assert!(matches!(
            decrypt_text(&blob, &key(3)),
            Err(CryptoError::MalformedPlaintext)
        ));
    }

    #[test]
    fn test_debug_hides_content() {
        let blob = EncryptedBlob::from_bytes(vec![1, 2, 3]);
        assert_eq!(format!("{:?}", blob), "EncryptedBlob(3 bytes)");
    }
}
