//! Constants used throughout the application.
//!
//! This module contains all constants used in notecrypt, organized into logical
//! groups. Having constants centralized makes them easier to find, modify, and
//! reference consistently.

// Application Metadata
/// The name of the application.
pub const APP_NAME: &str = "notecrypt";
/// The description of the application used in CLI help text.
pub const APP_DESCRIPTION: &str = "Encrypted personal notes with a self-locking key session";

// Key Derivation
/// Scheme version prefix prepended to the user id to form the PBKDF2 salt.
///
/// Changing this value invalidates every previously derived key for every user.
pub const KDF_VERSION_PREFIX: &str = "securenotes_v1_";
/// Default PBKDF2-HMAC-SHA256 iteration count (OWASP 2023 guidance).
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 210_000;
/// Derived key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

// Cipher
/// AES-GCM nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;
/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;
/// Plaintext marker encrypted into a password verifier.
pub const PASSWORD_VERIFIER_MARKER: &str = "password_verifier";

// Session
/// Default inactivity timeout in minutes.
pub const DEFAULT_SESSION_TIMEOUT_MINUTES: u64 = 30;
/// Longest accepted inactivity timeout in minutes (one week).
pub const MAX_SESSION_TIMEOUT_MINUTES: u64 = 7 * 24 * 60;
/// Default lead time, in seconds, for the "session expiring" warning.
pub const DEFAULT_WARNING_TIME_SECS: u64 = 120;
/// Capacity of the lifecycle event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

// Trash
/// Default number of days a soft-deleted record is retained before purge.
pub const DEFAULT_TRASH_RETENTION_DAYS: i64 = 30;
/// Longest accepted trash retention in days.
pub const MAX_TRASH_RETENTION_DAYS: i64 = 36_500;

// Record Fields
/// Encrypted field name for a note title.
pub const FIELD_TITLE: &str = "title";
/// Encrypted field name for a note body.
pub const FIELD_CONTENT: &str = "content";
/// Encrypted field name for a folder name.
pub const FIELD_NAME: &str = "name";

// Configuration Keys & Environment Variables
/// Environment variable for the SQLite database path.
pub const ENV_VAR_DB: &str = "NOTECRYPT_DB";
/// Environment variable for the stable user id.
pub const ENV_VAR_USER: &str = "NOTECRYPT_USER";
/// Environment variable for the session timeout in minutes.
pub const ENV_VAR_SESSION_TIMEOUT: &str = "NOTECRYPT_SESSION_TIMEOUT";
/// Environment variable for the expiry warning lead time in seconds.
pub const ENV_VAR_WARNING_TIME: &str = "NOTECRYPT_WARNING_TIME";
/// Environment variable for the trash retention period in days.
pub const ENV_VAR_TRASH_RETENTION_DAYS: &str = "NOTECRYPT_TRASH_RETENTION_DAYS";
/// Environment variable overriding the PBKDF2 iteration count.
pub const ENV_VAR_PBKDF2_ITERATIONS: &str = "NOTECRYPT_PBKDF2_ITERATIONS";
/// Environment variable enabling re-encryption of legacy records on read.
pub const ENV_VAR_MIGRATE_ON_READ: &str = "NOTECRYPT_MIGRATE_ON_READ";
/// Environment variable selecting the log format.
pub const ENV_VAR_LOG_FORMAT: &str = "NOTECRYPT_LOG_FORMAT";
/// Environment variable bypassing the interactive credential prompt.
pub const ENV_VAR_TEST_PASSPHRASE: &str = "NOTECRYPT_TEST_PASSPHRASE";
/// Standard environment variable for the user's home directory.
pub const ENV_VAR_HOME: &str = "HOME";
/// Default database location relative to the user's home directory.
pub const DEFAULT_DB_SUBPATH: &str = ".local/share/notecrypt/notes.db";

// Logging Configuration
/// Log format identifier for plain text.
pub const LOG_FORMAT_TEXT: &str = "text";
/// Log format identifier for JSON.
pub const LOG_FORMAT_JSON: &str = "json";
/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Placeholder string for redacted information in debug output.
pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";
/// Service name used in tracing spans and structured logs.
pub const TRACING_SERVICE_NAME: &str = "notecrypt";
/// Name for the root tracing span covering an application invocation.
pub const TRACING_ROOT_SPAN_NAME: &str = "app_invocation";

// File System Parameters
/// Default POSIX permissions for newly created directories (owner read/write/execute).
#[cfg(unix)]
pub const DEFAULT_DIR_PERMISSIONS: u32 = 0o700;
