//! Sync command implementation
//!
//! This module implements the `sync` command, which performs one
//! synchronization run immediately.

use crate::cli::exit_code_for;
use crate::config::{load_config, CardSyncConfig, SourceKind};
use crate::core::sync::{SyncCoordinator, SyncSummary};
use clap::Args;
use tokio::sync::watch;

/// Arguments for the sync command
#[derive(Args, Debug, Default)]
pub struct SyncArgs {
    /// Dry run mode - count changes without writing cards or applying the schema
    #[arg(long)]
    pub dry_run: bool,

    /// Override the number of records per storage write
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Read the dataset from a local JSON file instead of the API
    #[arg(long, value_name = "PATH")]
    pub source_file: Option<String>,
}

impl SyncArgs {
    /// Apply command-line overrides to a loaded configuration
    pub fn apply_overrides(&self, config: &mut CardSyncConfig) {
        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }

        if let Some(batch_size) = self.batch_size {
            tracing::info!(batch_size, "Overriding batch size from CLI");
            config.sync.batch_size = batch_size;
        }

        if let Some(path) = &self.source_file {
            tracing::info!(path = %path, "Reading dataset from local file");
            config.source.kind = SourceKind::File;
            config.source.file_path = Some(path.clone());
        }
    }

    /// Execute the sync command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting sync command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("❌ Failed to load configuration: {e}");
                return Ok(2);
            }
        };
        self.apply_overrides(&mut config);

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        if config.application.dry_run {
            println!("🔍 DRY RUN MODE - No cards will be written to the database");
            println!();
        }

        let coordinator = match SyncCoordinator::new(&config, shutdown_signal).await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create sync coordinator");
                eprintln!("Failed to initialize sync: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        println!("🚀 Starting sync...");
        println!();

        let summary = match coordinator.start_run().await {
            Ok(s) => s,
            Err(e) if e.is_conflict() => {
                println!("⏳ A sync run is already active, nothing started.");
                println!("   Use 'cardsync status' to follow it.");
                return Ok(3);
            }
            Err(e) => {
                eprintln!("❌ Sync failed: {e}");
                eprintln!("   The run was recorded as failed, see 'cardsync history'.");
                return Ok(5);
            }
        };

        print_summary(&summary);
        Ok(summary_exit_code(&summary))
    }
}

fn print_summary(summary: &SyncSummary) {
    println!("📊 Sync Summary:");
    println!("  Run: {}", summary.run_id);
    println!("  Status: {}", summary.status);
    if let Some(dataset_id) = &summary.dataset_id {
        println!("  Dataset: {dataset_id}");
    }
    println!("  Records in source: {}", summary.counters.total_in_source);
    println!("  Processed: {}", summary.counters.processed);
    println!("  Added: {}", summary.counters.added);
    println!("  Updated: {}", summary.counters.updated);
    println!("  Skipped: {}", summary.counters.skipped);
    println!("  Failed: {}", summary.counters.failed);
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!("  Success Rate: {:.2}%", summary.success_rate());
    println!();
}

/// Exit code of a run that reached Completed or Cancelled
pub fn summary_exit_code(summary: &SyncSummary) -> i32 {
    if summary.is_cancelled() {
        println!("⚠️  Sync cancelled. Flushed batches are kept, the in-flight batch was dropped.");
        130
    } else if summary.is_successful() {
        println!("✅ Sync completed successfully!");
        0
    } else {
        println!("⚠️  Sync completed with record failures");
        println!("   Run 'cardsync history --run-id {}' for details.", summary.run_id);
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use crate::core::state::run::{RunCounters, RunStatus, SyncRun};

    fn summary(status: RunStatus, failed: u64) -> SyncSummary {
        let mut summary = SyncSummary::from_run(&SyncRun::new(), false);
        summary.status = status;
        summary.counters = RunCounters {
            total_in_source: 10,
            processed: 10,
            added: 10 - failed,
            failed,
            ..RunCounters::default()
        };
        summary
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = load_config_from_str("database_target = \"memory\"\n").unwrap();
        let args = SyncArgs {
            dry_run: true,
            batch_size: Some(250),
            source_file: Some("/data/oracle-cards.json".to_string()),
        };

        args.apply_overrides(&mut config);

        assert!(config.application.dry_run);
        assert_eq!(config.sync.batch_size, 250);
        assert_eq!(config.source.kind, SourceKind::File);
        assert_eq!(
            config.source.file_path.as_deref(),
            Some("/data/oracle-cards.json")
        );
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let mut config = load_config_from_str("database_target = \"memory\"\n").unwrap();
        SyncArgs::default().apply_overrides(&mut config);
        assert!(!config.application.dry_run);
        assert_eq!(config.sync.batch_size, 1000);
    }

    #[test]
    fn test_summary_exit_codes() {
        assert_eq!(summary_exit_code(&summary(RunStatus::Completed, 0)), 0);
        assert_eq!(summary_exit_code(&summary(RunStatus::Completed, 2)), 1);
        assert_eq!(summary_exit_code(&summary(RunStatus::Cancelled, 0)), 130);
    }
}
