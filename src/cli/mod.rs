//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for cardsync using clap.
//!
//! # Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0    | Success |
//! | 1    | Completed with record failures |
//! | 2    | Configuration error |
//! | 3    | A sync run is already active |
//! | 4    | Connection error |
//! | 5    | Fatal error |
//! | 130  | Cancelled by signal |

pub mod commands;

use crate::domain::CardSyncError;
use clap::{Parser, Subcommand};

/// cardsync - Scryfall bulk data synchronizer
#[derive(Parser, Debug)]
#[command(name = "cardsync")]
#[command(version, about, long_about = None)]
#[command(author = "Cardsync Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "cardsync.toml", env = "CARDSYNC_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "CARDSYNC_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one synchronization now
    Sync(commands::sync::SyncArgs),

    /// Run synchronizations on a schedule until stopped
    Daemon(commands::daemon::DaemonArgs),

    /// Show whether a run is active, the latest run and statistics
    Status(commands::status::StatusArgs),

    /// List past runs or show one run with its errors
    History(commands::history::HistoryArgs),

    /// Mark runs left active by a crashed process as failed
    Reclaim(commands::reclaim::ReclaimArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

/// Process exit code for an error that ended a command
pub fn exit_code_for(error: &CardSyncError) -> i32 {
    match error {
        CardSyncError::Configuration(_) => 2,
        CardSyncError::Conflict(_) => 3,
        e if e.is_connection() => 4,
        _ => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProviderError;

    #[test]
    fn test_cli_parse_sync() {
        let cli = Cli::parse_from(["cardsync", "sync"]);
        assert_eq!(cli.config, "cardsync.toml");
        assert!(matches!(cli.command, Commands::Sync(_)));
    }

    #[test]
    fn test_cli_parse_sync_overrides() {
        let cli = Cli::parse_from([
            "cardsync",
            "sync",
            "--dry-run",
            "--batch-size",
            "250",
            "--source-file",
            "cards.json",
        ]);
        match cli.command {
            Commands::Sync(args) => {
                assert!(args.dry_run);
                assert_eq!(args.batch_size, Some(250));
                assert_eq!(args.source_file.as_deref(), Some("cards.json"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_with_config_and_log_level() {
        let cli = Cli::parse_from([
            "cardsync",
            "--config",
            "custom.toml",
            "--log-level",
            "debug",
            "status",
        ]);
        assert_eq!(cli.config, "custom.toml");
        assert_eq!(cli.log_level, Some("debug".to_string()));
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn test_cli_parse_history() {
        let cli = Cli::parse_from(["cardsync", "history", "--page", "2", "--page-size", "5"]);
        match cli.command {
            Commands::History(args) => {
                assert_eq!(args.page, 2);
                assert_eq!(args.page_size, 5);
                assert!(args.run_id.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_zero_page_size() {
        assert!(Cli::try_parse_from(["cardsync", "history", "--page-size", "0"]).is_err());
    }

    #[test]
    fn test_cli_parse_other_commands() {
        assert!(matches!(
            Cli::parse_from(["cardsync", "daemon", "--run-now"]).command,
            Commands::Daemon(_)
        ));
        assert!(matches!(
            Cli::parse_from(["cardsync", "reclaim", "--older-than-minutes", "30"]).command,
            Commands::Reclaim(_)
        ));
        assert!(matches!(
            Cli::parse_from(["cardsync", "validate-config"]).command,
            Commands::ValidateConfig(_)
        ));
        assert!(matches!(
            Cli::parse_from(["cardsync", "init"]).command,
            Commands::Init(_)
        ));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code_for(&CardSyncError::Configuration("x".into())), 2);
        assert_eq!(exit_code_for(&CardSyncError::Conflict("x".into())), 3);
        assert_eq!(
            exit_code_for(&ProviderError::ConnectionFailed("x".into()).into()),
            4
        );
        assert_eq!(exit_code_for(&CardSyncError::Database("x".into())), 4);
        assert_eq!(exit_code_for(&CardSyncError::Other("x".into())), 5);
    }
}
