//! Integration tests for cryptographic operations.
//!
//! These tests exercise key derivation, field encryption and legacy-key
//! fallback through the public crypto API only.

use notecrypt::crypto::{
    decrypt, decrypt_text, derive_key, encrypt, encrypt_text, CredentialScheme, EncryptedBlob,
    KeyDerivation, KeySource, LegacyKeyring,
};
use notecrypt::errors::CryptoError;
use notecrypt::records::RecordId;
use secrecy::SecretString;
use std::collections::HashSet;

fn fast_kdf() -> KeyDerivation {
    KeyDerivation::new(1_000).expect("valid iteration count")
}

fn secret(value: &str) -> SecretString {
    SecretString::new(value.to_string())
}

#[test]
fn test_text_roundtrip_with_unicode() {
    let key = fast_kdf().derive(&secret("hunter2"), "user-1").unwrap();
    let text = "Grocery list\n- café au lait\n- 日本茶\n- 🍞";

    let blob = encrypt_text(text, &key).unwrap();
    assert_eq!(decrypt_text(&blob, &key).unwrap(), text);
}

#[test]
fn test_empty_plaintext_roundtrip() {
    let key = fast_kdf().derive(&secret("hunter2"), "user-1").unwrap();
    let blob = encrypt(b"", &key).unwrap();

    assert_eq!(blob.len(), 12 + 16);
    assert!(decrypt(&blob, &key).unwrap().is_empty());
}

#[test]
fn test_same_plaintext_never_repeats_ciphertext() {
    let key = fast_kdf().derive(&secret("hunter2"), "user-1").unwrap();

    let mut nonces = HashSet::new();
    for _ in 0..10_000 {
        let blob = encrypt(b"same note", &key).unwrap();
        let nonce = blob.as_bytes()[..12].to_vec();
        assert!(nonces.insert(nonce), "nonce reused");
    }
}

#[test]
fn test_any_modified_byte_fails_authentication() {
    let key = fast_kdf().derive(&secret("hunter2"), "user-1").unwrap();
    let blob = encrypt(b"tamper with me", &key).unwrap();

    for i in 0..blob.len() {
        let mut bytes = blob.as_bytes().to_vec();
        bytes[i] ^= 0x01;
        let tampered = EncryptedBlob::from_bytes(bytes);
        assert!(
            matches!(decrypt(&tampered, &key), Err(CryptoError::AuthenticationFailure)),
            "byte {} modified without detection",
            i
        );
    }
}

#[test]
fn test_truncated_blob_fails_authentication() {
    let key = fast_kdf().derive(&secret("hunter2"), "user-1").unwrap();
    let blob = encrypt(b"truncate me", &key).unwrap();

    let truncated = EncryptedBlob::from_bytes(blob.as_bytes()[..blob.len() - 1].to_vec());
    assert!(matches!(
        decrypt(&truncated, &key),
        Err(CryptoError::AuthenticationFailure)
    ));
    assert!(matches!(
        decrypt(&EncryptedBlob::from_bytes(vec![0u8; 5]), &key),
        Err(CryptoError::AuthenticationFailure)
    ));
}

#[test]
fn test_wrong_key_fails_authentication() {
    let kdf = fast_kdf();
    let right = kdf.derive(&secret("right"), "user-1").unwrap();
    let wrong = kdf.derive(&secret("wrong"), "user-1").unwrap();
    let blob = encrypt(b"for the right key only", &right).unwrap();

    assert!(matches!(
        decrypt(&blob, &wrong),
        Err(CryptoError::AuthenticationFailure)
    ));
}

#[test]
fn test_keys_are_bound_to_user() {
    let kdf = fast_kdf();
    let alice = kdf.derive(&secret("shared password"), "alice").unwrap();
    let bob = kdf.derive(&secret("shared password"), "bob").unwrap();

    assert_ne!(alice, bob);
}

#[test]
fn test_blob_survives_base64_storage() {
    let key = fast_kdf().derive(&secret("hunter2"), "user-1").unwrap();
    let blob = encrypt_text("stored as text", &key).unwrap();

    let stored = blob.to_base64();
    let loaded = EncryptedBlob::from_base64(&stored).unwrap();
    assert_eq!(decrypt_text(&loaded, &key).unwrap(), "stored as text");

    assert!(matches!(
        EncryptedBlob::from_base64("not base64 at all!"),
        Err(CryptoError::AuthenticationFailure)
    ));
}

#[test]
fn test_resolver_falls_back_to_each_legacy_scheme() {
    let kdf = fast_kdf();
    let primary = kdf.derive(&secret("current password"), "user-1").unwrap();
    let id = RecordId::from("n-1");

    for scheme in [
        CredentialScheme::ProviderIdentity,
        CredentialScheme::LegacyUnversioned,
    ] {
        let old_key = kdf.derive_from_identity(scheme, "user-1").unwrap();
        let blob = encrypt_text("old note", &old_key).unwrap();

        let resolver = LegacyKeyring::new(kdf, "user-1", CredentialScheme::Password)
            .into_resolver(primary.clone());
        let (text, source) = resolver.resolve_text(&id, &blob).unwrap();
        assert_eq!(text, "old note");
        assert_eq!(source, KeySource::Legacy(scheme));
    }
}

#[test]
fn test_resolver_reports_unrecoverable_record() {
    let kdf = fast_kdf();
    let primary = kdf.derive(&secret("current password"), "user-1").unwrap();
    let stranger = kdf.derive(&secret("someone else"), "user-2").unwrap();
    let blob = encrypt_text("not yours", &stranger).unwrap();

    let resolver = LegacyKeyring::new(kdf, "user-1", CredentialScheme::Password).into_resolver(primary);
    match resolver.resolve(&RecordId::from("n-9"), &blob) {
        Err(CryptoError::UnrecoverableDecryption { record_id }) => {
            assert_eq!(record_id.as_str(), "n-9");
        }
        other => panic!("Expected UnrecoverableDecryption, got {:?}", other),
    }
}

#[test]
fn test_default_work_factor_is_deterministic() {
    let password = secret("correct horse battery staple");

    let first = derive_key(&password, "user-1").unwrap();
    let second = derive_key(&password, "user-1").unwrap();
    assert_eq!(first, second);
    assert_eq!(KeyDerivation::default().iterations(), 210_000);
}
