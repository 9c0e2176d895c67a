//! Scheduled trigger
//!
//! Calls [`SyncCoordinator::start_run`] on a fixed interval until shutdown is
//! requested. A failed run, or a failed check for an active run, is only
//! logged; the next attempt is the next tick.

use super::coordinator::SyncCoordinator;
use super::summary::SyncSummary;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Result of one scheduler tick
#[derive(Debug)]
pub enum TickOutcome {
    /// A run was started and reached Completed or Cancelled
    Ran(SyncSummary),
    /// Another run was active, nothing started
    SkippedActive,
    /// The run failed, or the active-run check could not be made
    Failed(String),
}

/// Counters of a scheduler lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub runs_completed: u64,
    pub runs_failed: u64,
    pub ticks_skipped: u64,
}

impl SchedulerStats {
    fn record(&mut self, outcome: &TickOutcome) {
        self.ticks += 1;
        match outcome {
            TickOutcome::Ran(_) => self.runs_completed += 1,
            TickOutcome::SkippedActive => self.ticks_skipped += 1,
            TickOutcome::Failed(_) => self.runs_failed += 1,
        }
    }
}

/// Interval-driven trigger around a coordinator
pub struct Scheduler {
    coordinator: Arc<SyncCoordinator>,
    interval: Duration,
    run_on_start: bool,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(
        coordinator: Arc<SyncCoordinator>,
        interval: Duration,
        run_on_start: bool,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            coordinator,
            interval,
            run_on_start,
            shutdown,
        }
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Start one run unless another is active
    pub async fn tick(&self) -> TickOutcome {
        match self.coordinator.is_run_active().await {
            Ok(true) => {
                tracing::info!("A sync run is already active, skipping this tick");
                return TickOutcome::SkippedActive;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    connection = e.is_connection(),
                    "Could not check for an active run, retrying next tick"
                );
                return TickOutcome::Failed(e.to_string());
            }
        }

        match self.coordinator.start_run().await {
            Ok(summary) => TickOutcome::Ran(summary),
            Err(e) if e.is_conflict() => {
                tracing::info!(error = %e, "Run started elsewhere, skipping this tick");
                TickOutcome::SkippedActive
            }
            Err(e) => {
                tracing::error!(error = %e, "Scheduled sync run failed, retrying next tick");
                TickOutcome::Failed(e.to_string())
            }
        }
    }

    /// Loop until shutdown is requested
    pub async fn run(mut self) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            run_on_start = self.run_on_start,
            "Sync scheduler started"
        );

        if self.run_on_start && !self.shutdown_requested() {
            let outcome = self.tick().await;
            stats.record(&outcome);
        }

        loop {
            if self.shutdown_requested() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        tracing::warn!("Shutdown channel closed, stopping scheduler");
                        break;
                    }
                    continue;
                }
            }

            let outcome = self.tick().await;
            stats.record(&outcome);
        }

        tracing::info!(
            ticks = stats.ticks,
            completed = stats.runs_completed,
            failed = stats.runs_failed,
            skipped = stats.ticks_skipped,
            "Sync scheduler stopped"
        );
        stats
    }
}
