//! Per-user password verifier storage.

use super::Database;
use crate::crypto::EncryptedBlob;
use crate::errors::StoreError;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

impl Database {
    /// Stores (or replaces) the password verifier for `user_id`.
    pub fn put_verifier(&self, user_id: &str, verifier: &EncryptedBlob) -> Result<(), StoreError> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO verifiers (user_id, verifier, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id) DO UPDATE SET
                verifier = excluded.verifier,
                created_at = excluded.created_at
            "#,
            params![user_id, verifier.to_base64(), Utc::now().to_rfc3339()],
        )?;
        debug!("Stored password verifier");
        Ok(())
    }

    /// Loads the password verifier for `user_id`, if one was stored.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corrupt` if the stored value is not valid base64.
    pub fn get_verifier(&self, user_id: &str) -> Result<Option<EncryptedBlob>, StoreError> {
        let conn = self.get_conn()?;
        let encoded: Option<String> = conn
            .query_row(
                "SELECT verifier FROM verifiers WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()?;

        encoded
            .map(|value| {
                EncryptedBlob::from_base64(&value)
                    .map_err(|_| StoreError::Corrupt("stored verifier is not valid base64".to_string()))
            })
            .transpose()
    }
}
