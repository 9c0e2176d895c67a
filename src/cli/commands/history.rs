//! History command implementation
//!
//! This module implements the `history` command for listing past runs and
//! inspecting the record-level errors of one run.

use crate::adapters::database::create_stores;
use crate::cli::exit_code_for;
use crate::config::load_config;
use crate::core::state::{RunManager, RunStatus, SyncRun};
use crate::domain::RunId;
use clap::Args;
use std::str::FromStr;

/// Arguments for the history command
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Page number, starting at 1
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Runs per page
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..=500))]
    pub page_size: u32,

    /// Show one run with its record errors
    #[arg(long)]
    pub run_id: Option<String>,

    /// Maximum number of record errors to show with --run-id
    #[arg(long, default_value_t = 20)]
    pub errors: u32,
}

impl HistoryArgs {
    /// Execute the history command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
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
        let manager = RunManager::new(stores.runs);

        match &self.run_id {
            Some(run_id) => self.show_run(&manager, run_id).await,
            None => self.list_runs(&manager).await,
        }
    }

    async fn list_runs(&self, manager: &RunManager) -> anyhow::Result<i32> {
        let page = match manager.history(self.page, self.page_size).await {
            Ok(p) => p,
            Err(e) => {
                println!("❌ Failed to load run history");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        if page.total == 0 {
            println!("No sync runs recorded yet.");
            println!("Run 'cardsync sync' to start one.");
            return Ok(0);
        }

        println!(
            "📜 Sync history - page {} of {} ({} runs)",
            page.page,
            page.total_pages(),
            page.total
        );
        println!();
        println!(
            "{:<38} {:<14} {:<20} {:>8} {:>8} {:>8} {:>8} {:>10}",
            "Run ID", "Status", "Started", "Added", "Updated", "Skipped", "Failed", "Duration"
        );
        println!("{}", "-".repeat(122));
        for run in &page.runs {
            println!("{}", format_run_row(run));
        }
        println!();
        Ok(0)
    }

    async fn show_run(&self, manager: &RunManager, run_id: &str) -> anyhow::Result<i32> {
        let id = match RunId::from_str(run_id) {
            Ok(id) => id,
            Err(e) => {
                println!("❌ {e}");
                return Ok(2);
            }
        };

        let run = match manager.get_run(id).await {
            Ok(Some(run)) => run,
            Ok(None) => {
                println!("❌ No sync run with id {id}");
                return Ok(1);
            }
            Err(e) => {
                println!("❌ Failed to load run");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        print_run_details(&run);

        if run.counters.failed > 0 {
            let errors = match manager.run_errors(id, self.errors).await {
                Ok(errors) => errors,
                Err(e) => {
                    println!("❌ Failed to load run errors");
                    println!("   Error: {e}");
                    return Ok(exit_code_for(&e));
                }
            };

            println!("⚠️  Record errors (showing {} of {}):", errors.len(), run.counters.failed);
            for error in &errors {
                println!(
                    "  - {} [{}]",
                    error.card_name.as_deref().unwrap_or("<unknown>"),
                    error.oracle_id.as_deref().unwrap_or("no key")
                );
                println!("    {}", error.message);
            }
            println!();
        }
        Ok(0)
    }
}

/// Status label with icon
pub fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Pending => "⏸️  Pending",
        RunStatus::Downloading => "⬇️  Downloading",
        RunStatus::Processing => "🔄 Processing",
        RunStatus::Completed => "✅ Completed",
        RunStatus::Failed => "❌ Failed",
        RunStatus::Cancelled => "⚠️  Cancelled",
    }
}

fn format_duration(run: &SyncRun) -> String {
    match run.duration() {
        Some(d) => format!("{:.1}s", d.num_milliseconds() as f64 / 1000.0),
        None => "running".to_string(),
    }
}

/// One table row of the history listing
pub fn format_run_row(run: &SyncRun) -> String {
    format!(
        "{:<38} {:<14} {:<20} {:>8} {:>8} {:>8} {:>8} {:>10}",
        run.id.to_string(),
        run.status.as_str(),
        run.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        run.counters.added,
        run.counters.updated,
        run.counters.skipped,
        run.counters.failed,
        format_duration(run)
    )
}

/// Full description of one run
pub fn print_run_details(run: &SyncRun) {
    println!("Run {}", run.id);
    println!("  Status: {}", status_label(run.status));
    println!("  Started: {}", run.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(completed_at) = run.completed_at {
        println!("  Finished: {}", completed_at.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("  Duration: {}", format_duration(run));
    }
    if let Some(dataset_id) = &run.dataset_id {
        println!("  Dataset: {dataset_id}");
    }
    if let Some(updated_at) = run.source_updated_at {
        println!("  Source updated: {}", updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(size) = run.size_bytes {
        println!("  Size: {:.1} MiB", size as f64 / (1024.0 * 1024.0));
    }
    println!("  Records in source: {}", run.counters.total_in_source);
    println!("  Processed: {}", run.counters.processed);
    println!("  Added: {}", run.counters.added);
    println!("  Updated: {}", run.counters.updated);
    println!("  Skipped: {}", run.counters.skipped);
    println!("  Failed: {}", run.counters.failed);
    if let Some(message) = &run.error_message {
        println!("  Error: {message}");
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_shows_counters_and_status() {
        let mut run = SyncRun::new();
        run.counters.added = 12;
        run.counters.failed = 3;

        let row = format_run_row(&run);
        assert!(row.contains(&run.id.to_string()));
        assert!(row.contains("Pending"));
        assert!(row.contains("12"));
        assert!(row.contains("running"));
    }

    #[test]
    fn test_finished_run_has_duration() {
        let mut run = SyncRun::new();
        run.mark_cancelled().unwrap();
        assert!(format_duration(&run).ends_with('s'));
    }

    #[test]
    fn test_status_labels_are_distinct() {
        let labels: std::collections::HashSet<_> = [
            RunStatus::Pending,
            RunStatus::Downloading,
            RunStatus::Processing,
            RunStatus::Completed,
            RunStatus::Failed,
            RunStatus::Cancelled,
        ]
        .into_iter()
        .map(status_label)
        .collect();
        assert_eq!(labels.len(), 6);
    }
}
