//! SQLite persistence for encrypted records.
//!
//! The database only ever sees ciphertext: note and folder fields arrive here as
//! [`EncryptedBlob`](crate::crypto::EncryptedBlob)s and are stored as a JSON
//! object of base64 strings. Connections are pooled via r2d2.
//!
//! # Module Structure
//!
//! - `schema`: Table definitions and schema initialization
//! - `records`: `RecordStore` implementation
//! - `verifiers`: Per-user password verifier storage
//!
//! # Example
//!
//! ```no_run
//! use notecrypt::db::Database;
//! use notecrypt::records::{EncryptedFields, RecordKind, RecordStore};
//! use std::path::Path;
//!
//! let db = Database::open(Path::new("/tmp/notecrypt.db"))?;
//! db.initialize_schema()?;
//! let id = db.create("user-1", RecordKind::Folder, EncryptedFields::new())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod records;
pub mod schema;
pub mod verifiers;

use crate::errors::{AppResult, StoreError};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

#[cfg(unix)]
use crate::constants::DEFAULT_DIR_PERMISSIONS;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Type alias for a pooled SQLite connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Milliseconds a connection waits on a locked database before failing.
const BUSY_TIMEOUT_MS: i64 = 5_000;

/// Database handle with connection pooling.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Opens or creates the SQLite database at `db_path`.
    ///
    /// Missing parent directories are created (owner-only on Unix).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The parent directory cannot be created
    /// - Database file cannot be opened
    /// - Connection pool cannot be initialized
    pub fn open(db_path: &Path) -> AppResult<Self> {
        debug!("Opening database at: {:?}", db_path);

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
                #[cfg(unix)]
                fs::set_permissions(parent, fs::Permissions::from_mode(DEFAULT_DIR_PERMISSIONS))?;
                info!("Created database directory: {:?}", parent);
            }
        }

        let manager = SqliteConnectionManager::file(db_path);
        let db = Self::with_manager(manager, 5)?;
        info!("Database opened successfully");
        Ok(db)
    }

    /// Opens a private in-memory database.
    ///
    /// The pool holds a single connection so every caller sees the same data.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_manager(SqliteConnectionManager::memory(), 1)
    }

    fn with_manager(manager: SqliteConnectionManager, max_size: u32) -> Result<Self, StoreError> {
        let pool = Pool::builder()
            .max_size(max_size)
            .connection_customizer(Box::new(ConnectionPragmas))
            .build(manager)?;

        // Test the connection
        let conn = pool.get()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i32>(0))?;
        drop(conn);

        Ok(Database { pool })
    }

    /// Gets a connection from the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection is available or the pool is exhausted.
    pub fn get_conn(&self) -> Result<PooledConnection, StoreError> {
        Ok(self.pool.get()?)
    }

    /// Initializes the database schema.
    ///
    /// Creates all necessary tables and indexes if they don't exist.
    /// This is idempotent and safe to call multiple times.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails.
    pub fn initialize_schema(&self) -> Result<(), StoreError> {
        let conn = self.get_conn()?;
        schema::create_tables(&conn)?;
        info!("Database schema initialized");
        Ok(())
    }
}

/// Connection customizer applying per-connection pragmas.
#[derive(Debug)]
struct ConnectionPragmas;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionPragmas {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "busy_timeout", BUSY_TIMEOUT_MS)?;
        Ok(())
    }
}
