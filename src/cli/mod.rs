//! Command-line interface for the `notecrypt` binary.

pub mod commands;

use crate::constants::{APP_DESCRIPTION, APP_NAME};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Encrypted personal notes with a self-locking key session
#[derive(Parser, Debug)]
#[command(name = APP_NAME, about = APP_DESCRIPTION)]
#[command(author, version, long_about = None)]
pub struct CliArgs {
    /// Stable user id the keys are bound to (overrides NOTECRYPT_USER)
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Path to the database file (overrides NOTECRYPT_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Unlock with the provider identity instead of a password
    #[arg(long, global = true)]
    pub provider: bool,

    /// Print verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log format: text or json (overrides NOTECRYPT_LOG_FORMAT)
    #[arg(long, global = true, value_name = "FORMAT")]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Set a password and store its verifier
    Init,

    /// Add an encrypted note
    Add {
        /// Note title
        #[arg(short, long)]
        title: String,

        /// Note body
        #[arg(short, long, default_value = "")]
        content: String,
    },

    /// Add an encrypted folder
    Folder {
        /// Folder name
        #[arg(short, long)]
        name: String,
    },

    /// List notes and folders
    List {
        /// List the trash instead
        #[arg(long)]
        trash: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Move a record to the trash
    Trash {
        /// Record id
        id: String,
    },

    /// Restore a record from the trash
    Restore {
        /// Record id
        id: String,
    },

    /// Permanently delete a record
    Delete {
        /// Record id
        id: String,
    },

    /// Permanently delete everything in the trash
    EmptyTrash,

    /// Permanently delete trashed records older than the retention period
    Purge,
}

impl Commands {
    /// Whether the command unlocks with an existing credential before running.
    ///
    /// Trash management works on ciphertext only and never prompts; `init`
    /// sets up its credential itself.
    pub fn needs_unlock(&self) -> bool {
        matches!(
            self,
            Commands::Add { .. } | Commands::Folder { .. } | Commands::List { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_command() {
        let args = CliArgs::parse_from(["notecrypt", "add", "--title", "Hi", "--content", "body"]);
        assert_eq!(
            args.command,
            Commands::Add {
                title: "Hi".to_string(),
                content: "body".to_string()
            }
        );
        assert!(!args.verbose);
        assert!(!args.provider);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = CliArgs::parse_from([
            "notecrypt", "list", "--trash", "--user", "u1", "-v", "--log-format", "json",
        ]);
        assert_eq!(
            args.command,
            Commands::List {
                trash: true,
                json: false
            }
        );
        assert_eq!(args.user.as_deref(), Some("u1"));
        assert!(args.verbose);
        assert_eq!(args.log_format.as_deref(), Some("json"));
    }

    #[test]
    fn test_id_commands() {
        let args = CliArgs::parse_from(["notecrypt", "restore", "abc"]);
        assert_eq!(args.command, Commands::Restore { id: "abc".to_string() });

        let args = CliArgs::parse_from(["notecrypt", "empty-trash"]);
        assert_eq!(args.command, Commands::EmptyTrash);
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(CliArgs::try_parse_from(["notecrypt"]).is_err());
    }

    #[test]
    fn test_needs_unlock() {
        assert!(!Commands::Init.needs_unlock());
        assert!(Commands::Add { title: "t".into(), content: String::new() }.needs_unlock());
        assert!(Commands::List { trash: false, json: false }.needs_unlock());
        assert!(!Commands::Purge.needs_unlock());
        assert!(!Commands::Trash { id: "x".into() }.needs_unlock());
    }
}
