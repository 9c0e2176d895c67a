//! Sync summary and reporting
//!
//! This module defines the result handed back to callers once a run reaches
//! a terminal status other than Failed.

use crate::core::state::run::{RunCounters, RunStatus, SyncRun};
use crate::domain::ids::RunId;
use std::time::Duration;

/// Summary of a finished sync run
#[derive(Debug, Clone)]
pub struct SyncSummary {
    /// Identity of the persisted run
    pub run_id: RunId,

    /// Terminal status (Completed or Cancelled)
    pub status: RunStatus,

    /// Source dataset identifier
    pub dataset_id: Option<String>,

    /// Final counters
    pub counters: RunCounters,

    /// Largest number of records buffered by the writer
    pub peak_queued: usize,

    /// Records dropped from the writer queues on cancellation
    pub discarded: usize,

    /// Whether writes were skipped
    pub dry_run: bool,

    /// Wall-clock duration of the run
    pub duration: Duration,
}

impl SyncSummary {
    /// Create a summary from the final state of a run
    pub fn from_run(run: &SyncRun, dry_run: bool) -> Self {
        Self {
            run_id: run.id,
            status: run.status,
            dataset_id: run.dataset_id.clone(),
            counters: run.counters,
            peak_queued: 0,
            discarded: 0,
            dry_run,
            duration: Duration::from_secs(0),
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the writer statistics
    pub fn with_queue_stats(mut self, peak_queued: usize, discarded: usize) -> Self {
        self.peak_queued = peak_queued;
        self.discarded = discarded;
        self
    }

    /// Completed without any record-level failure
    pub fn is_successful(&self) -> bool {
        self.status == RunStatus::Completed && self.counters.failed == 0
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == RunStatus::Cancelled
    }

    /// Share of settled records that did not fail, as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.counters.processed == 0 {
            return 100.0;
        }
        let ok = self.counters.processed - self.counters.failed;
        (ok as f64 / self.counters.processed as f64) * 100.0
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            run_id = %self.run_id,
            status = %self.status,
            dataset_id = self.dataset_id.as_deref().unwrap_or("-"),
            total_in_source = self.counters.total_in_source,
            processed = self.counters.processed,
            added = self.counters.added,
            updated = self.counters.updated,
            skipped = self.counters.skipped,
            failed = self.counters.failed,
            peak_queued = self.peak_queued,
            dry_run = self.dry_run,
            duration_secs = self.duration.as_secs(),
            success_rate = format!("{:.2}%", self.success_rate()),
            "Sync finished"
        );

        if self.counters.failed > 0 {
            tracing::warn!(
                failed = self.counters.failed,
                "Sync finished with record errors, see sync_errors for details"
            );
        }
        if self.discarded > 0 {
            tracing::warn!(
                discarded = self.discarded,
                "Unflushed records were discarded on cancellation"
            );
        }
    }
}
