//! Mutex-guarded in-memory store
//!
//! Implements both [`CardStore`] and [`RunStore`] inside the process. Used
//! for dry runs and as the backend of the pipeline tests, so it mirrors the
//! constraints the PostgreSQL schema enforces: unique external keys, bounded
//! and NUL-free columns, one active run at a time, and errors that belong to
//! an existing run.

use crate::adapters::database::traits::{page_offset, CardStore, KeyIndex, RunStore};
use crate::core::state::run::{RunStats, SyncErrorEntry, SyncRun, MAX_ERROR_MESSAGE_LENGTH};
use crate::domain::ids::{CardId, RunId};
use crate::domain::{CardRecord, CardSyncError, CardUpdate, NewCard, Result, StoredCard};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    cards: HashMap<CardId, StoredCard>,
    runs: Vec<SyncRun>,
    errors: Vec<SyncErrorEntry>,
}

/// In-memory card and run store
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    fail_card_writes: AtomicBool,
    fail_next_checkpoint: AtomicBool,
    fail_next_active_check: AtomicBool,
    schema_applied: AtomicBool,
    largest_write: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| CardSyncError::Database("in-memory store lock poisoned".to_string()))
    }

    fn check_writable(&self, batch_len: usize) -> Result<()> {
        if self.fail_card_writes.load(Ordering::SeqCst) {
            return Err(CardSyncError::Database(
                "simulated card write failure".to_string(),
            ));
        }
        self.largest_write.fetch_max(batch_len, Ordering::SeqCst);
        Ok(())
    }

    /// Stores a card directly, bypassing the pipeline
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn seed_card(&self, record: CardRecord, last_updated_on: DateTime<Utc>) -> Result<CardId> {
        let card = StoredCard {
            id: CardId::new(),
            imported_on: last_updated_on,
            last_updated_on,
            record,
        };
        let id = card.id;
        self.lock()?.cards.insert(id, card);
        Ok(id)
    }

    /// Makes every following card write fail
    pub fn fail_card_writes(&self, fail: bool) {
        self.fail_card_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes the next checkpoint fail without storing anything
    pub fn fail_next_checkpoint(&self) {
        self.fail_next_checkpoint.store(true, Ordering::SeqCst);
    }

    /// Makes the next active-run lookup fail
    pub fn fail_next_active_check(&self) {
        self.fail_next_active_check.store(true, Ordering::SeqCst);
    }

    /// Whether `ensure_schema` has been called
    pub fn schema_applied(&self) -> bool {
        self.schema_applied.load(Ordering::SeqCst)
    }

    /// Largest number of cards received by a single write call
    pub fn largest_write(&self) -> usize {
        self.largest_write.load(Ordering::SeqCst)
    }

    /// Snapshot of all stored cards
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn cards(&self) -> Result<Vec<StoredCard>> {
        Ok(self.lock()?.cards.values().cloned().collect())
    }

    /// Stored card by internal id
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn card(&self, id: CardId) -> Result<Option<StoredCard>> {
        Ok(self.lock()?.cards.get(&id).cloned())
    }

    /// Snapshot of all runs in creation order
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn runs(&self) -> Result<Vec<SyncRun>> {
        Ok(self.lock()?.runs.clone())
    }
}

#[async_trait]
impl CardStore for InMemoryStore {
    async fn test_connection(&self) -> Result<()> {
        self.lock().map(|_| ())
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_applied.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn schema_exists(&self) -> Result<bool> {
        Ok(true)
    }

    async fn load_key_index(&self) -> Result<KeyIndex> {
        let state = self.lock()?;
        Ok(state
            .cards
            .values()
            .filter_map(|card| card.record.oracle_id.map(|key| (key, card.existing())))
            .collect())
    }

    async fn insert_cards(&self, cards: &[NewCard]) -> Result<usize> {
        self.check_writable(cards.len())?;
        check_columns(cards.iter().map(|c| &c.record))?;
        let mut state = self.lock()?;

        let mut keys: HashSet<_> = state
            .cards
            .values()
            .filter_map(|c| c.record.oracle_id)
            .collect();
        for card in cards {
            if state.cards.contains_key(&card.id) {
                return Err(CardSyncError::Database(format!(
                    "duplicate card id {}",
                    card.id
                )));
            }
            if let Some(key) = card.record.oracle_id {
                if !keys.insert(key) {
                    return Err(CardSyncError::Database(format!(
                        "duplicate oracle_id {key}"
                    )));
                }
            }
        }

        for card in cards {
            state
                .cards
                .insert(card.id, StoredCard::from_new(card.clone()));
        }
        Ok(cards.len())
    }

    async fn replace_cards(&self, updates: &[CardUpdate]) -> Result<usize> {
        self.check_writable(updates.len())?;
        check_columns(updates.iter().map(|u| &u.record))?;
        let mut state = self.lock()?;

        let mut applied = 0;
        for update in updates {
            if let Some(card) = state.cards.get_mut(&update.id) {
                card.apply_update(update);
                applied += 1;
            }
        }
        Ok(applied)
    }

    async fn count_cards(&self) -> Result<u64> {
        Ok(self.lock()?.cards.len() as u64)
    }
}

/// Rejects the whole batch like a column constraint violation would
fn check_columns<'a>(records: impl IntoIterator<Item = &'a CardRecord>) -> Result<()> {
    records
        .into_iter()
        .try_for_each(|record| record.check_storage_limits())
        .map_err(CardSyncError::Database)
}

fn save_locked(state: &mut MemoryState, run: &SyncRun) -> Result<()> {
    let slot = state
        .runs
        .iter_mut()
        .find(|r| r.id == run.id)
        .ok_or_else(|| CardSyncError::Database(format!("sync run {} not found", run.id)))?;
    *slot = run.clone();
    Ok(())
}

fn append_locked(state: &mut MemoryState, errors: &[SyncErrorEntry]) -> Result<()> {
    if let Some(orphan) = errors
        .iter()
        .find(|e| !state.runs.iter().any(|r| r.id == e.run_id))
    {
        return Err(CardSyncError::Database(format!(
            "sync run {} not found for error row",
            orphan.run_id
        )));
    }
    state.errors.extend_from_slice(errors);
    Ok(())
}

#[async_trait]
impl RunStore for InMemoryStore {
    async fn has_active_run(&self) -> Result<bool> {
        if self.fail_next_active_check.swap(false, Ordering::SeqCst) {
            return Err(CardSyncError::Database(
                "simulated connection reset".to_string(),
            ));
        }
        Ok(self.lock()?.runs.iter().any(SyncRun::is_active))
    }

    async fn create_run(&self, run: &SyncRun) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(active) = state.runs.iter().find(|r| r.is_active()) {
            return Err(CardSyncError::Conflict(format!(
                "sync run {} is already {}",
                active.id, active.status
            )));
        }
        state.runs.push(run.clone());
        Ok(())
    }

    async fn save_run(&self, run: &SyncRun) -> Result<()> {
        save_locked(&mut *self.lock()?, run)
    }

    async fn append_errors(&self, errors: &[SyncErrorEntry]) -> Result<()> {
        append_locked(&mut *self.lock()?, errors)
    }

    async fn checkpoint(&self, run: &SyncRun, errors: &[SyncErrorEntry]) -> Result<()> {
        if self.fail_next_checkpoint.swap(false, Ordering::SeqCst) {
            return Err(CardSyncError::Database(
                "simulated checkpoint failure".to_string(),
            ));
        }
        let mut state = self.lock()?;
        if !state.runs.iter().any(|r| r.id == run.id) {
            return Err(CardSyncError::Database(format!(
                "sync run {} not found",
                run.id
            )));
        }
        append_locked(&mut state, errors)?;
        save_locked(&mut state, run)
    }

    async fn latest_run(&self) -> Result<Option<SyncRun>> {
        Ok(self
            .lock()?
            .runs
            .iter()
            .max_by_key(|r| r.started_at)
            .cloned())
    }

    async fn get_run(&self, id: RunId) -> Result<Option<SyncRun>> {
        Ok(self.lock()?.runs.iter().find(|r| r.id == id).cloned())
    }

    async fn run_history(&self, page: u32, page_size: u32) -> Result<Vec<SyncRun>> {
        let mut runs = self.lock()?.runs.clone();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs
            .into_iter()
            .skip(page_offset(page, page_size) as usize)
            .take(page_size as usize)
            .collect())
    }

    async fn count_runs(&self) -> Result<u64> {
        Ok(self.lock()?.runs.len() as u64)
    }

    async fn run_errors(&self, run_id: RunId, limit: u32) -> Result<Vec<SyncErrorEntry>> {
        Ok(self
            .lock()?
            .errors
            .iter()
            .filter(|e| e.run_id == run_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn run_stats(&self) -> Result<RunStats> {
        let state = self.lock()?;
        let mut stats = RunStats {
            total_runs: state.runs.len() as u64,
            ..RunStats::default()
        };

        let mut durations = Vec::new();
        for run in &state.runs {
            if run.is_completed() {
                stats.completed_runs += 1;
                if let Some(duration) = run.duration() {
                    durations.push(duration.num_milliseconds() as f64 / 1000.0);
                }
                if stats.last_completed_at < run.completed_at {
                    stats.last_completed_at = run.completed_at;
                }
            } else if run.is_failed() {
                stats.failed_runs += 1;
            } else if run.is_cancelled() {
                stats.cancelled_runs += 1;
            }
            stats.total_added += run.counters.added;
            stats.total_updated += run.counters.updated;
        }

        if !durations.is_empty() {
            stats.average_duration_secs =
                Some(durations.iter().sum::<f64>() / durations.len() as f64);
        }
        Ok(stats)
    }

    async fn fail_stale_runs(&self, cutoff: DateTime<Utc>, message: &str) -> Result<u64> {
        let mut state = self.lock()?;
        let mut marked = 0;
        for run in state
            .runs
            .iter_mut()
            .filter(|r| r.is_active() && r.started_at < cutoff)
        {
            run.mark_failed(message, MAX_ERROR_MESSAGE_LENGTH)?;
            marked += 1;
        }
        Ok(marked)
    }
}
