//! CLI command implementations.

use super::{CliArgs, Commands};
use crate::config::Config;
use crate::constants::ENV_VAR_TEST_PASSPHRASE;
use crate::crypto::CredentialScheme;
use crate::db::Database;
use crate::errors::{AppError, AppResult, CryptoError};
use crate::ops::{DecryptedRecord, Vault, VaultSettings};
use crate::records::RecordId;
use crate::trash::PurgeReport;
use secrecy::SecretString;
use std::env;
use tracing::{debug, info, warn};

/// Reads an existing credential from the terminal.
///
/// For non-interactive use, set `NOTECRYPT_TEST_PASSPHRASE`; its value is used
/// instead of prompting.
fn read_credential() -> AppResult<SecretString> {
    let passphrase = match env::var(ENV_VAR_TEST_PASSPHRASE) {
        Ok(value) => {
            debug!("Using NOTECRYPT_TEST_PASSPHRASE for non-interactive use");
            value
        }
        Err(_) => rpassword::prompt_password("Enter passphrase: ")
            .map_err(|e| CryptoError::PassphrasePrompt(e.to_string()))?,
    };

    if passphrase.is_empty() {
        return Err(CryptoError::EmptyPassphrase.into());
    }
    Ok(SecretString::new(passphrase))
}

/// Reads a new credential with confirmation.
fn read_new_credential() -> AppResult<SecretString> {
    if env::var(ENV_VAR_TEST_PASSPHRASE).is_ok() {
        return read_credential();
    }

    println!("Choose a strong passphrase to protect your notes.\n");
    let passphrase = rpassword::prompt_password("Enter passphrase: ")
        .map_err(|e| CryptoError::PassphrasePrompt(e.to_string()))?;
    let confirmation = rpassword::prompt_password("Confirm passphrase: ")
        .map_err(|e| CryptoError::PassphrasePrompt(e.to_string()))?;

    if passphrase != confirmation {
        return Err(CryptoError::PassphraseMismatch.into());
    }
    if passphrase.is_empty() {
        return Err(CryptoError::EmptyPassphrase.into());
    }
    Ok(SecretString::new(passphrase))
}

/// Runs one CLI invocation against the configured database.
///
/// Must be called from inside a Tokio runtime, which hosts the session timer.
///
/// # Errors
///
/// Returns `AppError::Config` when no user id is configured, plus any error of
/// the command itself.
pub fn run(args: &CliArgs, config: &Config) -> AppResult<()> {
    let user_id = args
        .user
        .clone()
        .or_else(|| config.user_id.clone())
        .ok_or_else(|| {
            AppError::Config(
                "No user id configured. Set NOTECRYPT_USER or pass --user".to_string(),
            )
        })?;
    let db_path = args.db.clone().unwrap_or_else(|| config.db_path.clone());

    let db = Database::open(&db_path)?;
    db.initialize_schema()?;
    let vault = Vault::new(db, user_id, VaultSettings::from_config(config)?);

    let scheme = if args.provider {
        CredentialScheme::ProviderIdentity
    } else {
        CredentialScheme::Password
    };

    let result = dispatch(&vault, &args.command, scheme);
    vault.lock();
    result
}

fn dispatch(vault: &Vault<Database>, command: &Commands, scheme: CredentialScheme) -> AppResult<()> {
    if command.needs_unlock() {
        unlock(vault, scheme)?;
    }

    match command {
        Commands::Init => init(vault, scheme)?,
        Commands::Add { title, content } => {
            let id = vault.create_note(title, content)?;
            println!("{}", id);
        }
        Commands::Folder { name } => {
            let id = vault.create_folder(name)?;
            println!("{}", id);
        }
        Commands::List { trash, json } => list(vault, *trash, *json)?,
        Commands::Trash { id } => {
            vault.soft_delete_note(&RecordId::from(id.as_str()))?;
            println!("Moved {} to the trash", id);
        }
        Commands::Restore { id } => {
            vault.restore_note(&RecordId::from(id.as_str()))?;
            println!("Restored {}", id);
        }
        Commands::Delete { id } => {
            vault.permanently_delete_note(&RecordId::from(id.as_str()))?;
            println!("Permanently deleted {}", id);
        }
        Commands::EmptyTrash => report_purge(&vault.empty_trash()?),
        Commands::Purge => report_purge(&vault.run_purge()?),
    }
    Ok(())
}

fn init(vault: &Vault<Database>, scheme: CredentialScheme) -> AppResult<()> {
    if scheme != CredentialScheme::Password {
        return Err(AppError::Config(
            "init sets a password; provider identity unlock needs no setup".to_string(),
        ));
    }
    if vault.store().get_verifier(vault.user_id())?.is_some() {
        return Err(AppError::Config(
            "A password is already set for this user".to_string(),
        ));
    }

    let credential = read_new_credential()?;
    vault.unlock(&credential, scheme)?;
    let verifier = vault.create_verifier()?;
    vault.store().put_verifier(vault.user_id(), &verifier)?;

    info!("Password verifier stored");
    println!("Initialized encrypted notes");
    Ok(())
}

fn unlock(vault: &Vault<Database>, scheme: CredentialScheme) -> AppResult<()> {
    if scheme == CredentialScheme::ProviderIdentity {
        let identity = SecretString::new(vault.user_id().to_string());
        return vault.unlock(&identity, scheme);
    }

    let credential = read_credential()?;
    match vault.store().get_verifier(vault.user_id())? {
        Some(verifier) => vault.unlock_verified(&credential, scheme, &verifier),
        None => {
            debug!("No password verifier stored; unlocking without verification");
            vault.unlock(&credential, scheme)
        }
    }
}

fn list(vault: &Vault<Database>, trash: bool, json: bool) -> AppResult<()> {
    let report = vault.load_records()?;
    if !report.skipped.is_empty() {
        warn!(skipped = report.skipped.len(), "Some records could not be decrypted");
        eprintln!(
            "{} record(s) could not be decrypted and were skipped",
            report.skipped.len()
        );
    }

    let mut records: Vec<&DecryptedRecord> = if trash {
        report.trashed().collect()
    } else {
        report.active().collect()
    };
    if trash {
        records.sort_by(|a, b| b.lifecycle.deleted_at().cmp(&a.lifecycle.deleted_at()));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("{}", if trash { "Trash is empty" } else { "No notes" });
        return Ok(());
    }
    for record in records {
        match record.lifecycle.deleted_at() {
            Some(at) => println!(
                "{}  {:<6}  {}  (deleted {})",
                record.id,
                record.kind.as_str(),
                record.label(),
                at.format("%Y-%m-%d %H:%M")
            ),
            None => println!("{}  {:<6}  {}", record.id, record.kind.as_str(), record.label()),
        }
    }
    Ok(())
}

fn report_purge(report: &PurgeReport) {
    println!("Purged {} record(s)", report.purged_count());
    for failure in &report.failed {
        eprintln!("{}", failure);
    }
}
