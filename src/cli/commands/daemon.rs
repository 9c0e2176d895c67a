//! Daemon command implementation
//!
//! This module implements the `daemon` command, the scheduled trigger that
//! starts a run every `schedule.interval_hours` until shutdown.

use crate::cli::exit_code_for;
use crate::config::load_config;
use crate::core::sync::{Scheduler, SyncCoordinator};
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Arguments for the daemon command
#[derive(Args, Debug)]
pub struct DaemonArgs {
    /// Override the interval between runs, in hours
    #[arg(long)]
    pub interval_hours: Option<u64>,

    /// Start a run immediately instead of waiting for the first interval
    #[arg(long)]
    pub run_now: bool,
}

impl DaemonArgs {
    /// Execute the daemon command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("❌ Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        if let Some(hours) = self.interval_hours {
            config.schedule.interval_hours = hours;
        }
        if self.run_now {
            config.schedule.run_on_start = true;
        }
        if let Err(e) = config.validate() {
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        let coordinator = match SyncCoordinator::new(&config, shutdown_signal.clone()).await {
            Ok(c) => Arc::new(c),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create sync coordinator");
                eprintln!("Failed to initialize sync: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        let interval = Duration::from_secs(config.schedule.interval_hours * 3600);
        println!(
            "⏰ Sync daemon started, running every {}h{}",
            config.schedule.interval_hours,
            if config.schedule.run_on_start {
                " (first run now)"
            } else {
                ""
            }
        );

        let scheduler = Scheduler::new(
            coordinator,
            interval,
            config.schedule.run_on_start,
            shutdown_signal,
        );

        let stats = scheduler.run().await;
        println!();
        println!("👋 Sync daemon stopped");
        println!("  Ticks: {}", stats.ticks);
        println!("  Runs finished: {}", stats.runs_completed);
        println!("  Runs failed: {}", stats.runs_failed);
        println!("  Ticks skipped: {}", stats.ticks_skipped);
        Ok(0)
    }
}
