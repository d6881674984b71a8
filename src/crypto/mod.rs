//! Cryptographic operations for note encryption and key lifetime.
//!
//! This module turns a credential into a durable key, protects note fields with
//! authenticated encryption, and keeps the live key in an expiring session.
//!
//! # Module Structure
//!
//! - `kdf`: PBKDF2 credential-to-key derivation and credential schemes
//! - `cipher`: AES-256-GCM encryption of field values
//! - `session`: Session key management with auto-lock timeout
//! - `resolver`: Decryption with legacy-key fallback
//! - `verifier`: Password verifier creation and checks
//!
//! # Example
//!
//! ```
//! use notecrypt::crypto::{decrypt_text, encrypt_text, KeyDerivation};
//! use secrecy::SecretString;
//!
//! let kdf = KeyDerivation::new(1_000)?;
//! let key = kdf.derive(&SecretString::new("passphrase".into()), "user-1")?;
//!
//! let blob = encrypt_text("Secret note", &key)?;
//! assert_eq!(decrypt_text(&blob, &key)?, "Secret note");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cipher;
pub mod kdf;
pub mod resolver;
pub mod session;
pub mod verifier;

// Re-export commonly used types
pub use self::cipher::{decrypt, decrypt_text, encrypt, encrypt_text, EncryptedBlob};
pub use self::kdf::{derive_key, user_salt, CredentialScheme, EncryptionKey, KeyDerivation};
pub use self::resolver::{CandidateKeys, DecryptionResolver, KeySource, LegacyKeyring, Resolved};
pub use self::session::{SecureSession, SessionState, SessionTimer};
pub use self::verifier::{create_verifier, ensure_verified, verify};
