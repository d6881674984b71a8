//! Configuration management for the notecrypt application.
//!
//! This module handles loading and validating configuration settings from
//! environment variables, with sensible defaults.
//!
//! # Environment Variables
//!
//! - `NOTECRYPT_DB`: Path to the SQLite database (defaults to ~/.local/share/notecrypt/notes.db)
//! - `NOTECRYPT_USER`: Stable user id the keys are bound to
//! - `NOTECRYPT_SESSION_TIMEOUT`: Session inactivity timeout in minutes (default: 30, at most 10080)
//! - `NOTECRYPT_WARNING_TIME`: Seconds before expiry to emit a warning (default: 120)
//! - `NOTECRYPT_TRASH_RETENTION_DAYS`: Days a trashed record is kept (default: 30, at most 36500)
//! - `NOTECRYPT_PBKDF2_ITERATIONS`: Key-derivation work factor (default: 210000)
//! - `NOTECRYPT_MIGRATE_ON_READ`: Re-encrypt legacy records when loaded (default: false)
//! - `NOTECRYPT_LOG_FORMAT`: `text` or `json` (default: text)
//! - `HOME`: Used for expanding the default database path

use crate::constants::{
    DEFAULT_DB_SUBPATH, DEFAULT_PBKDF2_ITERATIONS, DEFAULT_SESSION_TIMEOUT_MINUTES,
    DEFAULT_TRASH_RETENTION_DAYS, DEFAULT_WARNING_TIME_SECS, ENV_VAR_DB, ENV_VAR_HOME,
    ENV_VAR_LOG_FORMAT, ENV_VAR_MIGRATE_ON_READ, ENV_VAR_PBKDF2_ITERATIONS,
    ENV_VAR_SESSION_TIMEOUT, ENV_VAR_TRASH_RETENTION_DAYS, ENV_VAR_USER, ENV_VAR_WARNING_TIME,
    LOG_FORMAT_JSON, LOG_FORMAT_TEXT, MAX_SESSION_TIMEOUT_MINUTES, MAX_TRASH_RETENTION_DAYS,
    REDACTED_PLACEHOLDER,
};
use crate::crypto::KeyDerivation;
use crate::errors::{AppError, AppResult};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Configuration for the notecrypt application.
///
/// # Examples
///
/// Loading configuration from environment variables:
/// ```no_run
/// use notecrypt::Config;
/// use std::env;
///
/// env::set_var("NOTECRYPT_DB", "/custom/notes.db");
/// env::set_var("NOTECRYPT_SESSION_TIMEOUT", "10");
///
/// let config = Config::load().expect("Failed to load configuration");
/// assert_eq!(config.session_timeout_minutes, 10);
/// ```
#[derive(Clone)]
pub struct Config {
    /// Path of the SQLite database holding encrypted records.
    pub db_path: PathBuf,

    /// Stable user id keys are bound to. The CLI `--user` flag may supply it instead.
    pub user_id: Option<String>,

    /// Minutes of inactivity before the session key is cleared.
    pub session_timeout_minutes: u64,

    /// Seconds before expiry at which `SessionExpiring` is emitted.
    pub warning_time_secs: u64,

    /// Days a soft-deleted record is kept before purge.
    pub trash_retention_days: i64,

    /// PBKDF2 iteration count.
    pub pbkdf2_iterations: u32,

    /// Re-encrypt records opened with a legacy key under the current key.
    pub migrate_on_read: bool,

    /// Log output format, `text` or `json`.
    pub log_format: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("db_path", &"[REDACTED_PATH]")
            .field("user_id", &self.user_id.as_ref().map(|_| REDACTED_PLACEHOLDER))
            .field("session_timeout_minutes", &self.session_timeout_minutes)
            .field("warning_time_secs", &self.warning_time_secs)
            .field("trash_retention_days", &self.trash_retention_days)
            .field("pbkdf2_iterations", &self.pbkdf2_iterations)
            .field("migrate_on_read", &self.migrate_on_read)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Default for Config {
    /// Creates a new Config with default values and an empty database path.
    fn default() -> Self {
        Config {
            db_path: PathBuf::new(),
            user_id: None,
            session_timeout_minutes: DEFAULT_SESSION_TIMEOUT_MINUTES,
            warning_time_secs: DEFAULT_WARNING_TIME_SECS,
            trash_retention_days: DEFAULT_TRASH_RETENTION_DAYS,
            pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
            migrate_on_read: false,
            log_format: LOG_FORMAT_TEXT.to_string(),
        }
    }
}

fn parse_env<T>(name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e| {
            AppError::Config(format!("Invalid value '{}' for {}: {}", raw, name, e))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> AppResult<bool> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(AppError::Config(format!(
                "Invalid value '{}' for {}: expected true or false",
                raw, name
            ))),
        },
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables with sensible defaults.
    ///
    /// The database path is expanded with `shellexpand` to handle `~` and
    /// environment variable references.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if:
    /// - The database path expansion fails
    /// - A numeric or boolean variable cannot be parsed
    /// - The loaded values fail [`Config::validate`]
    pub fn load() -> AppResult<Self> {
        let db_path_str = env::var(ENV_VAR_DB).unwrap_or_else(|_| {
            let home = env::var(ENV_VAR_HOME).unwrap_or_default();
            format!("{}/{}", home, DEFAULT_DB_SUBPATH)
        });

        // Expand the path (handles ~ and environment variables)
        let expanded_path = shellexpand::full(&db_path_str)
            .map_err(|e| AppError::Config(format!("Failed to expand path: {}", e)))?;

        let user_id = env::var(ENV_VAR_USER)
            .ok()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        let config = Config {
            db_path: PathBuf::from(expanded_path.into_owned()),
            user_id,
            session_timeout_minutes: parse_env(
                ENV_VAR_SESSION_TIMEOUT,
                DEFAULT_SESSION_TIMEOUT_MINUTES,
            )?,
            warning_time_secs: parse_env(ENV_VAR_WARNING_TIME, DEFAULT_WARNING_TIME_SECS)?,
            trash_retention_days: parse_env(
                ENV_VAR_TRASH_RETENTION_DAYS,
                DEFAULT_TRASH_RETENTION_DAYS,
            )?,
            pbkdf2_iterations: parse_env(ENV_VAR_PBKDF2_ITERATIONS, DEFAULT_PBKDF2_ITERATIONS)?,
            migrate_on_read: parse_env_bool(ENV_VAR_MIGRATE_ON_READ, false)?,
            log_format: env::var(ENV_VAR_LOG_FORMAT)
                .map(|f| f.trim().to_ascii_lowercase())
                .unwrap_or_else(|_| LOG_FORMAT_TEXT.to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if:
    /// - The database path is empty or relative
    /// - The session timeout is zero
    /// - The trash retention is not positive
    /// - The PBKDF2 iteration count is zero
    /// - The log format is neither `text` nor `json`
    ///
    /// # Examples
    ///
    /// ```
    /// use notecrypt::Config;
    /// use std::path::PathBuf;
    ///
    /// let valid = Config {
    ///     db_path: PathBuf::from("/absolute/notes.db"),
    ///     ..Config::default()
    /// };
    /// assert!(valid.validate().is_ok());
    ///
    /// let invalid = Config {
    ///     session_timeout_minutes: 0,
    ///     ..valid.clone()
    /// };
    /// assert!(invalid.validate().is_err());
    /// ```
    pub fn validate(&self) -> AppResult<()> {
        if self.db_path.as_os_str().is_empty() {
            return Err(AppError::Config("Database path is empty".to_string()));
        }

        if !self.db_path.is_absolute() {
            return Err(AppError::Config(
                "Database path must be an absolute path".to_string(),
            ));
        }

        if self.session_timeout_minutes == 0 {
            return Err(AppError::Config(
                "Session timeout must be at least 1 minute".to_string(),
            ));
        }

        if self.session_timeout_minutes > MAX_SESSION_TIMEOUT_MINUTES {
            return Err(AppError::Config(format!(
                "Session timeout must be at most {} minutes",
                MAX_SESSION_TIMEOUT_MINUTES
            )));
        }

        if self.trash_retention_days <= 0 {
            return Err(AppError::Config(
                "Trash retention must be at least 1 day".to_string(),
            ));
        }

        if self.trash_retention_days > MAX_TRASH_RETENTION_DAYS {
            return Err(AppError::Config(format!(
                "Trash retention must be at most {} days",
                MAX_TRASH_RETENTION_DAYS
            )));
        }

        if self.pbkdf2_iterations == 0 {
            return Err(AppError::Config(
                "PBKDF2 iteration count must be greater than zero".to_string(),
            ));
        }

        if self.log_format != LOG_FORMAT_TEXT && self.log_format != LOG_FORMAT_JSON {
            return Err(AppError::Config(format!(
                "Unsupported log format '{}'. Use '{}' or '{}'",
                self.log_format, LOG_FORMAT_TEXT, LOG_FORMAT_JSON
            )));
        }

        Ok(())
    }

    /// Session inactivity timeout, capped at the largest accepted value.
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_minutes.min(MAX_SESSION_TIMEOUT_MINUTES) * 60)
    }

    /// Lead time of the expiry warning.
    pub fn warning_time(&self) -> Duration {
        Duration::from_secs(self.warning_time_secs)
    }

    /// How long trashed records are kept, capped at the largest accepted value.
    pub fn trash_retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.trash_retention_days.clamp(0, MAX_TRASH_RETENTION_DAYS))
    }

    /// Key derivation with the configured work factor.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Crypto` if the iteration count is zero.
    pub fn key_derivation(&self) -> AppResult<KeyDerivation> {
        Ok(KeyDerivation::new(self.pbkdf2_iterations)?)
    }
}
