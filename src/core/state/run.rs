//! Synchronization run model
//!
//! A [`SyncRun`] is the audit record of one synchronization attempt. It moves
//! through `Pending → Downloading → Processing → {Completed | Failed | Cancelled}`
//! and is persisted at every transition so observers always see the current phase.

use crate::adapters::dataset::DatasetMetadata;
use crate::domain::ids::RunId;
use crate::domain::{CardSyncError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bound for stored error messages
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 2000;

/// Upper bound for card names captured on error entries
pub const MAX_CARD_NAME_LENGTH: usize = 300;

/// Run status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run record created, nothing fetched yet
    Pending,
    /// Fetching dataset metadata and opening the download
    Downloading,
    /// Streaming records through the pipeline
    Processing,
    /// Stream fully consumed
    Completed,
    /// Aborted by a stream-level or persistence error
    Failed,
    /// Stopped by a cancellation signal
    Cancelled,
}

impl RunStatus {
    /// Statuses that hold the single-flight slot
    pub const ACTIVE: [RunStatus; 3] = [
        RunStatus::Pending,
        RunStatus::Downloading,
        RunStatus::Processing,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        use RunStatus::*;
        matches!(
            (self, next),
            (Pending, Downloading)
                | (Downloading, Processing)
                | (Processing, Completed)
                | (Pending | Downloading | Processing, Failed)
                | (Pending | Downloading | Processing, Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "Pending",
            RunStatus::Downloading => "Downloading",
            RunStatus::Processing => "Processing",
            RunStatus::Completed => "Completed",
            RunStatus::Failed => "Failed",
            RunStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(RunStatus::Pending),
            "Downloading" => Ok(RunStatus::Downloading),
            "Processing" => Ok(RunStatus::Processing),
            "Completed" => Ok(RunStatus::Completed),
            "Failed" => Ok(RunStatus::Failed),
            "Cancelled" => Ok(RunStatus::Cancelled),
            other => Err(format!("Unknown run status '{other}'")),
        }
    }
}

/// Progress counters of a run
///
/// `total_in_source` counts records pulled from the stream, `processed` counts
/// records whose outcome is settled. Every persisted observation satisfies
/// `added + updated + skipped + failed == processed <= total_in_source`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub total_in_source: u64,
    pub processed: u64,
    pub added: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl RunCounters {
    /// Sum of all outcome counters
    pub fn settled(&self) -> u64 {
        self.added + self.updated + self.skipped + self.failed
    }

    /// Checks the counter invariant
    pub fn is_consistent(&self) -> bool {
        self.settled() == self.processed && self.processed <= self.total_in_source
    }

    /// Records pulled but not yet settled
    pub fn in_flight(&self) -> u64 {
        self.total_in_source.saturating_sub(self.processed)
    }
}

/// Audit record of one synchronization attempt
///
/// # Examples
///
/// ```
/// use cardsync::core::state::run::{RunStatus, SyncRun};
///
/// let mut run = SyncRun::new();
/// assert_eq!(run.status, RunStatus::Pending);
/// assert!(run.completed_at.is_none());
///
/// run.mark_downloading().unwrap();
/// run.mark_processing().unwrap();
/// run.mark_completed().unwrap();
/// assert!(run.completed_at.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: RunId,
    pub started_at: DateTime<Utc>,
    /// Set if and only if the status is terminal
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,

    /// Source dataset identifier
    pub dataset_id: Option<String>,
    pub download_uri: Option<String>,
    /// Update time reported by the source
    pub source_updated_at: Option<DateTime<Utc>>,
    pub size_bytes: Option<u64>,

    pub counters: RunCounters,

    /// Truncated top-level failure message
    pub error_message: Option<String>,
}

impl SyncRun {
    /// Creates a new run in the Pending state
    pub fn new() -> Self {
        Self {
            id: RunId::new(),
            started_at: Utc::now(),
            completed_at: None,
            status: RunStatus::Pending,
            dataset_id: None,
            download_uri: None,
            source_updated_at: None,
            size_bytes: None,
            counters: RunCounters::default(),
            error_message: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == RunStatus::Cancelled
    }

    /// Duration of the run once it reached a terminal status
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|completed| completed - self.started_at)
    }

    fn transition_to(&mut self, next: RunStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(CardSyncError::State(format!(
                "Run {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }

        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Pending → Downloading
    pub fn mark_downloading(&mut self) -> Result<()> {
        self.transition_to(RunStatus::Downloading)
    }

    /// Downloading → Processing
    pub fn mark_processing(&mut self) -> Result<()> {
        self.transition_to(RunStatus::Processing)
    }

    /// Processing → Completed
    pub fn mark_completed(&mut self) -> Result<()> {
        self.transition_to(RunStatus::Completed)
    }

    /// Any active status → Cancelled
    pub fn mark_cancelled(&mut self) -> Result<()> {
        self.transition_to(RunStatus::Cancelled)
    }

    /// Any active status → Failed, storing a truncated message
    pub fn mark_failed(&mut self, message: &str, max_message_length: usize) -> Result<()> {
        self.transition_to(RunStatus::Failed)?;
        self.error_message = Some(truncate_message(message, max_message_length));
        Ok(())
    }

    /// Copies the source metadata onto the run
    pub fn attach_metadata(&mut self, metadata: &DatasetMetadata) {
        self.dataset_id = Some(metadata.id.clone());
        self.download_uri = Some(metadata.download_uri.clone());
        self.source_updated_at = Some(metadata.updated_at);
        self.size_bytes = Some(metadata.size_bytes);
    }
}

impl Default for SyncRun {
    fn default() -> Self {
        Self::new()
    }
}

/// One record-level failure within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncErrorEntry {
    pub run_id: RunId,
    /// External key of the failing record, if it could be read
    pub oracle_id: Option<String>,
    /// Display name of the failing record, if it could be read
    pub card_name: Option<String>,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl SyncErrorEntry {
    /// Creates a new entry; the message is truncated to `max_message_length`
    pub fn new(run_id: RunId, message: &str, max_message_length: usize) -> Self {
        Self {
            run_id,
            oracle_id: None,
            card_name: None,
            message: truncate_message(message, max_message_length),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_oracle_id(mut self, oracle_id: impl Into<String>) -> Self {
        self.oracle_id = Some(oracle_id.into());
        self
    }

    pub fn with_card_name(mut self, name: &str) -> Self {
        self.card_name = Some(truncate_message(name, MAX_CARD_NAME_LENGTH));
        self
    }
}

/// Aggregate statistics across all recorded runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_runs: u64,
    pub completed_runs: u64,
    pub failed_runs: u64,
    pub cancelled_runs: u64,
    pub total_added: u64,
    pub total_updated: u64,
    /// Average wall-clock duration of completed runs
    pub average_duration_secs: Option<f64>,
    pub last_completed_at: Option<DateTime<Utc>>,
}

/// Truncates to at most `max_chars` characters, on a char boundary.
///
/// NUL characters are dropped first; text columns reject them.
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    message.chars().filter(|c| *c != '\0').take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_new_run_is_pending() {
        let run = SyncRun::new();
        assert_eq!(run.status, RunStatus::Pending);
        assert!(run.is_active());
        assert!(run.completed_at.is_none());
        assert_eq!(run.counters, RunCounters::default());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut run = SyncRun::new();
        run.mark_downloading().unwrap();
        assert!(run.completed_at.is_none());
        run.mark_processing().unwrap();
        assert!(run.completed_at.is_none());
        run.mark_completed().unwrap();
        assert!(run.is_completed());
        assert!(run.completed_at.is_some());
        assert!(run.duration().is_some());
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut run = SyncRun::new();
        assert!(run.mark_processing().is_err());
        assert!(run.mark_completed().is_err());
        assert_eq!(run.status, RunStatus::Pending);

        run.mark_cancelled().unwrap();
        assert!(run.mark_downloading().is_err());
        assert!(run.mark_failed("late", 100).is_err());
        assert_eq!(run.status, RunStatus::Cancelled);
    }

    #[test_case(RunStatus::Pending ; "from pending")]
    #[test_case(RunStatus::Downloading ; "from downloading")]
    #[test_case(RunStatus::Processing ; "from processing")]
    fn test_failure_allowed_from_every_active_status(from: RunStatus) {
        let mut run = SyncRun {
            status: from,
            ..SyncRun::new()
        };
        run.mark_failed("boom", 100).unwrap();
        assert!(run.is_failed());
        assert!(run.completed_at.is_some());
        assert_eq!(run.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_completed_at_iff_terminal() {
        for status in [
            RunStatus::Pending,
            RunStatus::Downloading,
            RunStatus::Processing,
        ] {
            for next in [
                RunStatus::Downloading,
                RunStatus::Processing,
                RunStatus::Completed,
                RunStatus::Failed,
                RunStatus::Cancelled,
            ] {
                let mut run = SyncRun {
                    status,
                    ..SyncRun::new()
                };
                if run.transition_to(next).is_ok() {
                    assert_eq!(run.completed_at.is_some(), run.status.is_terminal());
                }
            }
        }
    }

    #[test]
    fn test_failure_message_truncated() {
        let mut run = SyncRun::new();
        let long = "x".repeat(5000);
        run.mark_failed(&long, MAX_ERROR_MESSAGE_LENGTH).unwrap();
        assert_eq!(
            run.error_message.as_ref().map(|m| m.chars().count()),
            Some(MAX_ERROR_MESSAGE_LENGTH)
        );
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_message("Æther Vial", 3), "Æth");
        assert_eq!(truncate_message("short", 100), "short");
        assert_eq!(truncate_message("", 10), "");
        assert_eq!(truncate_message("Null\0 Rod", 100), "Null Rod");
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            RunStatus::Pending,
            RunStatus::Downloading,
            RunStatus::Processing,
            RunStatus::Completed,
            RunStatus::Failed,
            RunStatus::Cancelled,
        ] {
            assert_eq!(RunStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(RunStatus::from_str("Running").is_err());
    }

    #[test]
    fn test_counters_consistency() {
        let counters = RunCounters {
            total_in_source: 5,
            processed: 4,
            added: 2,
            updated: 1,
            skipped: 1,
            failed: 0,
        };
        assert!(counters.is_consistent());
        assert_eq!(counters.in_flight(), 1);

        let broken = RunCounters {
            processed: 5,
            ..counters
        };
        assert!(!broken.is_consistent());
    }

    #[test]
    fn test_error_entry_builder() {
        let run_id = RunId::new();
        let entry = SyncErrorEntry::new(run_id, &"e".repeat(50), 10)
            .with_oracle_id("0004ebd0-dfd6-4276-b4a6-de0003e94237")
            .with_card_name(&"n".repeat(400));

        assert_eq!(entry.run_id, run_id);
        assert_eq!(entry.message.len(), 10);
        assert_eq!(
            entry.card_name.as_ref().map(|n| n.len()),
            Some(MAX_CARD_NAME_LENGTH)
        );
        assert!(entry.oracle_id.is_some());
    }
}
