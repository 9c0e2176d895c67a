//! Reclaim command implementation
//!
//! Marks runs left active by a crashed process as Failed so the next sync
//! can start.

use crate::adapters::database::create_stores;
use crate::cli::exit_code_for;
use crate::config::load_config;
use crate::core::state::RunManager;
use clap::Args;

/// Arguments for the reclaim command
#[derive(Args, Debug)]
pub struct ReclaimArgs {
    /// Only reclaim runs started more than this many minutes ago
    /// (defaults to sync.stale_run_minutes)
    #[arg(long)]
    pub older_than_minutes: Option<u64>,
}

impl ReclaimArgs {
    /// Execute the reclaim command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let minutes = self
            .older_than_minutes
            .unwrap_or(config.sync.stale_run_minutes);
        let Ok(minutes) = i64::try_from(minutes) else {
            println!("❌ --older-than-minutes is too large");
            return Ok(2);
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
        match manager.reclaim_stale(chrono::Duration::minutes(minutes)).await {
            Ok(0) => {
                println!("✅ No runs active for more than {minutes} minutes");
                Ok(0)
            }
            Ok(reclaimed) => {
                println!("🧹 Marked {reclaimed} abandoned run(s) as failed");
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to reclaim runs");
                println!("   Error: {e}");
                Ok(exit_code_for(&e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_reclaim_with_nothing_stale() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "database_target = \"memory\"").unwrap();

        let args = ReclaimArgs {
            older_than_minutes: Some(5),
        };
        let code = args.execute(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(code, 0);
    }
}
