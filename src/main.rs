/*!
# notecrypt

Command-line front end for an encrypted note vault. Notes and folders are
encrypted with a key derived from the user's credential; the key lives only in
memory for the length of an invocation and is cleared afterwards.

## Usage

```bash
notecrypt --user alice init
notecrypt --user alice add --title "Groceries" --content "milk, eggs"
notecrypt --user alice list
notecrypt --user alice trash <ID>
notecrypt --user alice list --trash
notecrypt --user alice purge
```

## Environment Variables

- `NOTECRYPT_DB`: Path of the SQLite database
- `NOTECRYPT_USER`: Stable user id keys are bound to
- `NOTECRYPT_SESSION_TIMEOUT`: Session inactivity timeout in minutes (1 to 10080)
- `NOTECRYPT_WARNING_TIME`: Seconds before expiry to emit a warning
- `NOTECRYPT_TRASH_RETENTION_DAYS`: Days a trashed record is kept (1 to 36500)
- `NOTECRYPT_PBKDF2_ITERATIONS`: Key-derivation work factor
- `NOTECRYPT_MIGRATE_ON_READ`: Re-encrypt legacy records when loaded
- `NOTECRYPT_LOG_FORMAT`: `text` or `json`
- `NOTECRYPT_TEST_PASSPHRASE`: Credential used instead of prompting (tests and scripts)
- `RUST_LOG`: Overrides the log filter
*/

use clap::Parser;
use notecrypt::cli::{commands, CliArgs};
use notecrypt::constants::{DEFAULT_LOG_LEVEL, LOG_FORMAT_JSON, TRACING_ROOT_SPAN_NAME, TRACING_SERVICE_NAME};
use notecrypt::{AppResult, Config};
use std::io;
use std::process::ExitCode;
use tracing::{debug, error, info, info_span};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

fn init_tracing(verbose: bool, log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(DEFAULT_LOG_LEVEL)
        }
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false);

    if log_format == LOG_FORMAT_JSON {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs) -> AppResult<()> {
    let mut config = Config::load()?;
    if let Some(format) = &args.log_format {
        config.log_format = format.trim().to_ascii_lowercase();
    }
    if let Some(db) = &args.db {
        config.db_path = db.clone();
    }
    if let Some(user) = &args.user {
        config.user_id = Some(user.clone());
    }
    config.validate()?;

    init_tracing(args.verbose, &config.log_format);

    let correlation_id = Uuid::new_v4().to_string();
    let root_span = info_span!(
        TRACING_ROOT_SPAN_NAME,
        service = TRACING_SERVICE_NAME,
        correlation_id = %correlation_id
    );
    let _guard = root_span.enter();

    info!("Starting notecrypt");
    debug!(config = ?config, "Configuration loaded");

    commands::run(args, &config)?;

    debug!("Command completed");
    Ok(())
}
