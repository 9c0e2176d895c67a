//! Status command implementation
//!
//! This module implements the `status` command for displaying whether a run
//! is active, the latest run and aggregate statistics.

use super::history::print_run_details;
use crate::adapters::database::create_stores;
use crate::cli::exit_code_for;
use crate::config::load_config;
use crate::core::state::RunManager;
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only print whether a run is active (exit 0 if idle, 3 if active)
    #[arg(long)]
    pub check: bool,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking sync status");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let stores = match create_stores(&config).await {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to connect to database");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };
        let manager = RunManager::new(stores.runs.clone());

        let active = match manager.is_run_active().await {
            Ok(active) => active,
            Err(e) => {
                println!("❌ Failed to read run state");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        if self.check {
            println!("{}", if active { "active" } else { "idle" });
            return Ok(if active { 3 } else { 0 });
        }

        println!("📊 Sync Status");
        println!();
        if active {
            println!("🔄 A sync run is currently active");
        } else {
            println!("💤 No sync run is active");
        }
        println!();

        match manager.latest_run().await {
            Ok(Some(run)) => {
                println!("Latest run:");
                print_run_details(&run);
            }
            Ok(None) => {
                println!("No sync runs recorded yet.");
                println!("Run 'cardsync sync' to start one.");
                return Ok(0);
            }
            Err(e) => {
                println!("❌ Failed to load latest run");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        }

        let stats = match manager.stats().await {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to load statistics");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        println!("Statistics:");
        println!("  Total runs: {}", stats.total_runs);
        println!("  Completed: {}", stats.completed_runs);
        println!("  Failed: {}", stats.failed_runs);
        println!("  Cancelled: {}", stats.cancelled_runs);
        println!("  Cards added: {}", stats.total_added);
        println!("  Cards updated: {}", stats.total_updated);
        if let Some(avg) = stats.average_duration_secs {
            println!("  Average duration: {avg:.1}s");
        }
        if let Some(last) = stats.last_completed_at {
            println!("  Last completed: {}", last.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        match stores.cards.count_cards().await {
            Ok(count) => println!("  Cards stored: {count}"),
            Err(e) => tracing::warn!(error = %e, "Could not count stored cards"),
        }
        println!();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_status_on_empty_memory_store() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "database_target = \"memory\"").unwrap();

        let code = StatusArgs { check: false }
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_check_reports_idle() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "database_target = \"memory\"").unwrap();

        let code = StatusArgs { check: true }
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 0);
    }
}
