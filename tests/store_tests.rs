//! Integration tests for the SQLite record store.

use chrono::{Duration, TimeZone, Utc};
use notecrypt::crypto::{create_verifier, encrypt_text, verify, KeyDerivation};
use notecrypt::db::Database;
use notecrypt::errors::StoreError;
use notecrypt::records::{EncryptedFields, LifecycleState, RecordKind, RecordStore};
use notecrypt::trash::TrashLifecycle;
use secrecy::SecretString;
use tempfile::TempDir;

fn open(dir: &TempDir) -> Database {
    let db = Database::open(&dir.path().join("notes.db")).expect("open database");
    db.initialize_schema().expect("initialize schema");
    db
}

#[test]
fn test_records_persist_across_reopen() {
    let dir = TempDir::new().unwrap();
    let key = KeyDerivation::new(1_000)
        .unwrap()
        .derive(&SecretString::new("pw".to_string()), "u1")
        .unwrap();

    let mut fields = EncryptedFields::new();
    fields.insert("title".to_string(), encrypt_text("Persisted", &key).unwrap());

    let id = {
        let db = open(&dir);
        db.create("u1", RecordKind::Note, fields.clone()).unwrap()
    };

    let db = open(&dir);
    let record = db.get(&id).unwrap();
    assert_eq!(record.fields, fields);
    assert_eq!(record.user_id, "u1");
}

#[test]
fn test_trash_state_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();

    let id = {
        let db = open(&dir);
        let id = db.create("u1", RecordKind::Folder, EncryptedFields::new()).unwrap();
        let record = db.get(&id).unwrap();
        TrashLifecycle::new(&db).soft_delete_at(&record, at).unwrap();
        id
    };

    let db = open(&dir);
    assert_eq!(db.get(&id).unwrap().lifecycle, LifecycleState::SoftDeleted { at });

    let report = TrashLifecycle::new(&db).purge_expired(
        &db.query("u1").unwrap(),
        Duration::days(30),
        at + Duration::days(30),
    );
    assert_eq!(report.purged, vec![id.clone()]);
    assert!(matches!(db.get(&id), Err(StoreError::NotFound(_))));
}

#[test]
fn test_purge_with_stale_snapshot_keeps_restored_record() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();
    let lifecycle = TrashLifecycle::new(&db);

    let id = db.create("u1", RecordKind::Note, EncryptedFields::new()).unwrap();
    let trashed = lifecycle.soft_delete_at(&db.get(&id).unwrap(), at).unwrap();
    let snapshot = db.query("u1").unwrap();
    lifecycle.restore(&trashed).unwrap();

    let report = lifecycle.purge_expired(&snapshot, Duration::days(30), at + Duration::days(40));
    assert_eq!(report.purged_count(), 0);
    assert!(report.is_clean());
    assert!(db.get(&id).unwrap().lifecycle.is_active());
}

#[test]
fn test_inconsistent_deletion_state_is_refused() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let conn = db.get_conn().unwrap();

    let result = conn.execute(
        "INSERT INTO records (id, user_id, kind, fields, is_deleted, deleted_at, created_at, updated_at)
         VALUES ('x', 'u1', 'note', '{}', 1, NULL, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
        [],
    );
    assert!(result.is_err());
}

#[test]
fn test_verifier_roundtrip() {
    let dir = TempDir::new().unwrap();
    let kdf = KeyDerivation::new(1_000).unwrap();
    let key = kdf.derive(&SecretString::new("pw".to_string()), "u1").unwrap();
    let other = kdf.derive(&SecretString::new("nope".to_string()), "u1").unwrap();

    {
        let db = open(&dir);
        assert!(db.get_verifier("u1").unwrap().is_none());
        db.put_verifier("u1", &create_verifier(&key).unwrap()).unwrap();
    }

    let db = open(&dir);
    let stored = db.get_verifier("u1").unwrap().expect("verifier stored");
    assert!(verify(&key, &stored));
    assert!(!verify(&other, &stored));
    assert!(db.get_verifier("u2").unwrap().is_none());
}
