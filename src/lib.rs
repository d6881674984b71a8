/*!
# notecrypt

notecrypt keeps personal notes and folders encrypted at rest. Every field is
sealed with AES-256-GCM under a key derived from the user's credential, and the
key is only held in memory by a session that clears itself after a period of
inactivity.

## Core Features

- PBKDF2-HMAC-SHA256 key derivation bound to a stable user id
- Authenticated encryption of individual fields
- A key session with an inactivity timeout, an expiry warning and an expiry callback
- Decryption that falls back to keys of older credential schemes
- A soft-delete trash with restore, permanent delete and retention-based purge
- SQLite persistence of ciphertext only

## Architecture

- `crypto`: Key derivation, field encryption, the key session and the legacy key resolver
- `records`: The record model and the `RecordStore` seam
- `trash`: Lifecycle transitions and batch purges
- `db`: SQLite `RecordStore` with connection pooling
- `events`: Broadcast lifecycle events
- `ops`: The `Vault`, which ties a user, a store and a session together
- `config`, `cli`, `errors`, `constants`: Ambient plumbing

## Usage Example

```rust,no_run
use notecrypt::crypto::CredentialScheme;
use notecrypt::db::Database;
use notecrypt::ops::{Vault, VaultSettings};
use notecrypt::Config;
use secrecy::SecretString;

#[tokio::main]
async fn main() -> notecrypt::AppResult<()> {
    let config = Config::load()?;
    let db = Database::open(&config.db_path)?;
    db.initialize_schema()?;

    let vault = Vault::new(db, "user-1", VaultSettings::from_config(&config)?);
    vault.unlock(&SecretString::new("passphrase".into()), CredentialScheme::Password)?;
    vault.create_note("Groceries", "milk, eggs")?;
    vault.lock();
    Ok(())
}
```
*/

/// Command-line interface for parsing and handling user arguments
pub mod cli;
/// Configuration loading and management
pub mod config;
/// Application-wide constants
pub mod constants;
/// Key derivation, encryption and the in-memory key session
pub mod crypto;
/// SQLite persistence
pub mod db;
/// Error types and utilities for error handling
pub mod errors;
/// Session and trash lifecycle events
pub mod events;
/// High-level vault operations
pub mod ops;
/// Encrypted record model and storage trait
pub mod records;
/// Trash lifecycle and purging
pub mod trash;

// Re-export important types for convenience
pub use cli::CliArgs;
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use ops::Vault;
