//! Error handling utilities for the notecrypt core.
//!
//! This module provides the central error type `AppError`, which wraps one error
//! enum per subsystem (crypto, session, record store, trash lifecycle), and the
//! convenience alias `AppResult` used by functions that can return any of them.
//!
//! None of the error messages in this module ever include key material,
//! credentials or decrypted plaintext. Record ids are the only identifying data
//! that may appear.

use crate::records::RecordId;
use std::io;
use thiserror::Error;

/// Represents specific error cases that can occur during cryptographic operations.
///
/// # Examples
///
/// ```
/// use notecrypt::errors::CryptoError;
///
/// let error = CryptoError::AuthenticationFailure;
/// assert!(format!("{}", error).contains("authenticate"));
/// ```
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The key-derivation primitive rejected its parameters or is unavailable.
    ///
    /// Fatal to the unlock attempt; the session is never opened with a partial key.
    #[error("Could not prepare security key: {0}")]
    KeyDerivation(String),

    /// A single decryption attempt failed its integrity check.
    ///
    /// This is the only error produced for a wrong key, a tampered blob, a
    /// truncated blob or a blob that is not valid base64. It deliberately carries
    /// no detail about which of those happened.
    #[error("Encrypted data could not be authenticated with the supplied key")]
    AuthenticationFailure,

    /// Every known key was tried against a record and none verified.
    #[error("Record {record_id} could not be decrypted with any known key")]
    UnrecoverableDecryption {
        /// The record that could not be decrypted
        record_id: RecordId,
    },

    /// The credential does not match the stored password verifier.
    #[error("Incorrect credential. Please try again with the password used to protect your notes.")]
    InvalidCredential,

    /// Authenticated plaintext was not valid UTF-8 text.
    #[error("Decrypted data is not valid text")]
    MalformedPlaintext,

    /// The AEAD primitive refused to encrypt (plaintext exceeds its length limit).
    #[error("Encryption failed")]
    EncryptionFailed,

    /// Reading the credential from the terminal failed.
    #[error("Failed to read passphrase: {0}")]
    PassphrasePrompt(String),

    /// The passphrase and its confirmation differ.
    #[error("Passphrases do not match")]
    PassphraseMismatch,

    /// An empty passphrase was entered.
    #[error("Passphrase cannot be empty")]
    EmptyPassphrase,
}

/// Errors raised by the in-memory key session.
///
/// # Examples
///
/// ```
/// use notecrypt::errors::SessionError;
///
/// let error = SessionError::NotActive;
/// assert!(format!("{}", error).contains("locked"));
/// ```
#[derive(Debug, Error)]
pub enum SessionError {
    /// An operation requiring a live key was attempted while locked.
    #[error("Session locked. Unlock again with your credential to continue.\n\nNote: Sessions automatically lock after inactivity (configurable via NOTECRYPT_SESSION_TIMEOUT).")]
    NotActive,

    /// The session timer could not be scheduled because no Tokio runtime is running.
    #[error("Session timer requires a running Tokio runtime")]
    NoRuntime,
}

/// Represents specific error cases that can occur in a record store.
///
/// # Examples
///
/// ```
/// use notecrypt::errors::StoreError;
/// use notecrypt::records::RecordId;
///
/// let error = StoreError::NotFound(RecordId::from("abc"));
/// assert!(format!("{}", error).contains("not found"));
/// ```
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("Record not found: {0}")]
    NotFound(RecordId),

    /// The store refused the operation.
    #[error("Record store rejected the operation: {0}")]
    Rejected(String),

    /// A stored row is inconsistent (for example a deletion timestamp without the deleted flag).
    #[error("Corrupt record in store: {0}")]
    Corrupt(String),

    /// SQLite database error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("Failed to get connection from pool: {0}\n\nThis may indicate database connection issues. Try closing other notecrypt instances.")]
    Pool(#[from] r2d2::Error),

    /// Encrypted field map could not be encoded or decoded.
    #[error("Failed to encode record fields: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by trash lifecycle transitions.
///
/// # Examples
///
/// ```
/// use notecrypt::errors::TrashError;
/// use notecrypt::records::RecordId;
///
/// let error = TrashError::InvalidTransition {
///     id: RecordId::from("n1"),
///     operation: "restore",
///     state: "active",
/// };
/// assert!(format!("{}", error).contains("restore"));
/// ```
#[derive(Debug, Error)]
pub enum TrashError {
    /// The requested transition is not valid from the record's current state.
    #[error("Cannot {operation} record {id}: record is {state}")]
    InvalidTransition {
        /// The record the transition was attempted on
        id: RecordId,
        /// The attempted operation
        operation: &'static str,
        /// The record's current lifecycle state
        state: &'static str,
    },

    /// The record store failed while applying a transition.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A single record that could not be removed during a batch purge.
///
/// Collected into [`crate::trash::PurgeReport`]; never aborts the batch.
#[derive(Debug, Error)]
#[error("Failed to purge record {id}: {source}")]
pub struct PurgeFailure {
    /// The record that could not be removed
    pub id: RecordId,
    /// Why the store refused
    #[source]
    pub source: StoreError,
}

/// Represents all possible errors that can occur in the notecrypt core.
///
/// # Examples
///
/// ```
/// use notecrypt::errors::{AppError, SessionError};
///
/// let error: AppError = SessionError::NotActive.into();
/// assert!(format!("{}", error).starts_with("Session error"));
/// ```
#[derive(Debug, Error)]
pub enum AppError {
    /// Errors related to configuration loading or validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input/output errors from filesystem or terminal operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to cryptographic operations.
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    /// Errors related to the in-memory key session.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Errors related to record store operations.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Errors related to trash lifecycle transitions.
    #[error("Trash error: {0}")]
    Trash(#[from] TrashError),

    /// Command output could not be rendered as JSON.
    #[error("Failed to format output: {0}")]
    Output(#[from] serde_json::Error),
}

/// A type alias for `Result<T, AppError>` to simplify function signatures.
pub type AppResult<T> = Result<T, AppError>;
