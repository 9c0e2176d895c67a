//! Progress and error tracking
//!
//! Keeps the counters of the running sync and buffers record-level failures
//! until a checkpoint has stored them together with the counters. A failed
//! checkpoint leaves the buffer intact for the next attempt.

use super::batch::BatchCounters;
use super::decoder::MalformedRecord;
use crate::core::state::run::{RunCounters, SyncErrorEntry, SyncRun};
use crate::domain::ids::RunId;
use crate::domain::CardRecord;

/// Default number of pulled records between two checkpoints
pub const DEFAULT_CHECKPOINT_INTERVAL: u64 = 5000;

/// Counters and buffered errors of one run
#[derive(Debug)]
pub struct ProgressTracker {
    run_id: RunId,
    counters: RunCounters,
    pending_errors: Vec<SyncErrorEntry>,
    checkpoint_interval: u64,
    pulled_at_checkpoint: u64,
    max_error_message_length: usize,
}

impl ProgressTracker {
    pub fn new(run_id: RunId, checkpoint_interval: u64, max_error_message_length: usize) -> Self {
        Self {
            run_id,
            counters: RunCounters::default(),
            pending_errors: Vec::new(),
            checkpoint_interval: checkpoint_interval.max(1),
            pulled_at_checkpoint: 0,
            max_error_message_length,
        }
    }

    pub fn counters(&self) -> RunCounters {
        self.counters
    }

    /// Errors captured since the last checkpoint
    pub fn pending_errors(&self) -> usize {
        self.pending_errors.len()
    }

    /// A record came off the stream
    pub fn record_pulled(&mut self) {
        self.counters.total_in_source += 1;
    }

    /// A record was dropped before reaching the writer
    pub fn record_skipped(&mut self) {
        self.counters.skipped += 1;
        self.counters.processed += 1;
    }

    /// Settle the records of a flush
    pub fn apply(&mut self, flushed: BatchCounters) {
        self.counters.added += flushed.added;
        self.counters.updated += flushed.updated;
        self.counters.skipped += flushed.skipped;
        self.counters.processed += flushed.settled();
    }

    /// A decoded record failed classification or validation
    pub fn record_failure(&mut self, record: &CardRecord, message: &str) {
        let mut entry = SyncErrorEntry::new(self.run_id, message, self.max_error_message_length)
            .with_card_name(&record.name);
        if let Some(key) = record.oracle_id {
            entry = entry.with_oracle_id(key.to_string());
        }
        self.push_failure(entry);
    }

    /// An element of the array could not be decoded into a record
    pub fn record_malformed(&mut self, malformed: &MalformedRecord) {
        let message = format!("element {}: {}", malformed.index, malformed.message);
        let mut entry = SyncErrorEntry::new(self.run_id, &message, self.max_error_message_length);
        if let Some(key) = &malformed.oracle_id {
            entry = entry.with_oracle_id(key.as_str());
        }
        if let Some(name) = &malformed.name {
            entry = entry.with_card_name(name);
        }
        self.push_failure(entry);
    }

    fn push_failure(&mut self, entry: SyncErrorEntry) {
        tracing::warn!(
            run_id = %self.run_id,
            oracle_id = entry.oracle_id.as_deref().unwrap_or("-"),
            card_name = entry.card_name.as_deref().unwrap_or("-"),
            error = %entry.message,
            "Record failed, continuing"
        );
        self.pending_errors.push(entry);
        self.counters.failed += 1;
        self.counters.processed += 1;
    }

    /// Whether enough records were pulled since the last checkpoint
    pub fn should_checkpoint(&self) -> bool {
        self.counters.total_in_source - self.pulled_at_checkpoint >= self.checkpoint_interval
    }

    /// Copy the counters onto the run and hand out the buffered errors
    ///
    /// The caller persists both together, then calls [`Self::commit_checkpoint`]
    /// with the number of errors it stored.
    pub fn begin_checkpoint(&mut self, run: &mut SyncRun) -> Vec<SyncErrorEntry> {
        run.counters = self.counters;
        self.pending_errors.clone()
    }

    /// The checkpoint was stored: drop the saved errors and restart the interval
    pub fn commit_checkpoint(&mut self, saved_errors: usize) {
        let saved = saved_errors.min(self.pending_errors.len());
        self.pending_errors.drain(..saved);
        self.pulled_at_checkpoint = self.counters.total_in_source;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::card::fixtures::card;
    use uuid::Uuid;

    fn tracker(interval: u64) -> ProgressTracker {
        ProgressTracker::new(RunId::new(), interval, 50)
    }

    #[test]
    fn test_counters_stay_consistent() {
        let mut progress = tracker(100);
        for _ in 0..5 {
            progress.record_pulled();
        }
        progress.record_skipped();
        progress.record_failure(&card(None, "Broken"), "bad");
        progress.apply(BatchCounters {
            added: 2,
            updated: 1,
            skipped: 0,
        });

        let counters = progress.counters();
        assert_eq!(counters.processed, 5);
        assert_eq!(counters.total_in_source, 5);
        assert_eq!(counters.failed, 1);
        assert!(counters.is_consistent());
    }

    #[test]
    fn test_checkpoint_interval() {
        let mut progress = tracker(3);
        let mut run = SyncRun::new();

        progress.record_pulled();
        progress.record_pulled();
        assert!(!progress.should_checkpoint());
        progress.record_pulled();
        assert!(progress.should_checkpoint());

        let errors = progress.begin_checkpoint(&mut run);
        assert!(progress.should_checkpoint());
        progress.commit_checkpoint(errors.len());
        assert!(!progress.should_checkpoint());
        assert_eq!(run.counters.total_in_source, 3);
    }

    #[test]
    fn test_failure_captures_key_and_truncates() {
        let key = Uuid::new_v4();
        let mut progress = tracker(10);
        let mut run = SyncRun::new();

        progress.record_pulled();
        progress.record_failure(&card(Some(key), "Llanowar Elves"), &"e".repeat(500));
        let errors = progress.begin_checkpoint(&mut run);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].oracle_id, Some(key.to_string()));
        assert_eq!(errors[0].card_name.as_deref(), Some("Llanowar Elves"));
        assert_eq!(errors[0].message.chars().count(), 50);
        assert_eq!(progress.pending_errors(), 1);
        progress.commit_checkpoint(errors.len());
        assert_eq!(progress.pending_errors(), 0);
        assert_eq!(run.counters.failed, 1);
    }

    #[test]
    fn test_malformed_element_recorded() {
        let mut progress = tracker(10);
        progress.record_pulled();
        progress.record_malformed(&MalformedRecord {
            index: 7,
            oracle_id: None,
            name: Some("Half a Card".to_string()),
            message: "missing field `scryfall_id`".to_string(),
        });

        assert_eq!(progress.counters().failed, 1);
        assert_eq!(progress.pending_errors(), 1);
        let mut run = SyncRun::new();
        let errors = progress.begin_checkpoint(&mut run);
        assert!(errors[0].message.starts_with("element 7"));
        assert_eq!(errors[0].card_name.as_deref(), Some("Half a Card"));
    }

    #[test]
    fn test_unsaved_errors_survive_a_failed_checkpoint() {
        let mut progress = tracker(10);
        let mut run = SyncRun::new();

        progress.record_pulled();
        progress.record_failure(&card(None, "First"), "bad");
        let first_attempt = progress.begin_checkpoint(&mut run);
        assert_eq!(first_attempt.len(), 1);

        progress.record_pulled();
        progress.record_failure(&card(None, "Second"), "bad");
        let retry = progress.begin_checkpoint(&mut run);
        assert_eq!(retry.len(), 2);
        assert_eq!(retry[0].card_name.as_deref(), Some("First"));

        progress.commit_checkpoint(retry.len());
        assert_eq!(progress.pending_errors(), 0);
        assert_eq!(run.counters.failed, 2);
    }
}
