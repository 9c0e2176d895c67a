//! Persistence traits
//!
//! This module defines the traits that storage adapters must implement to
//! hold cards and the run history.

use crate::core::state::run::{RunStats, SyncErrorEntry, SyncRun};
use crate::domain::ids::{OracleId, RunId};
use crate::domain::{CardUpdate, ExistingCard, NewCard, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// External key → stored identity lookup used by the diff engine
pub type KeyIndex = HashMap<OracleId, ExistingCard>;

/// Card storage trait
///
/// Implemented by the PostgreSQL adapter and the in-memory store.
#[async_trait]
pub trait CardStore: Send + Sync {
    /// Test the storage connection
    ///
    /// # Errors
    ///
    /// Returns an error if the connection test fails.
    async fn test_connection(&self) -> Result<()>;

    /// Create tables and indexes if they do not exist yet
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    async fn ensure_schema(&self) -> Result<()>;

    /// Whether the card tables exist, without creating them
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    async fn schema_exists(&self) -> Result<bool>;

    /// Load the key index of every stored card in one read
    ///
    /// Cards stored without an external key are not part of the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    async fn load_key_index(&self) -> Result<KeyIndex>;

    /// Insert new cards with their faces and related parts
    ///
    /// # Returns
    ///
    /// The number of cards inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; nothing from the batch is kept.
    async fn insert_cards(&self, cards: &[NewCard]) -> Result<usize>;

    /// Apply updates to existing cards
    ///
    /// Child collections of every touched card are deleted, the parents are
    /// reloaded, scalar fields are updated and the children are recreated
    /// from the incoming record. Updates whose id is no longer stored are
    /// not applied.
    ///
    /// # Returns
    ///
    /// The number of cards updated.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; nothing from the batch is kept.
    async fn replace_cards(&self, updates: &[CardUpdate]) -> Result<usize>;

    /// Number of stored cards
    ///
    /// # Errors
    ///
    /// Returns an error if the count cannot be read.
    async fn count_cards(&self) -> Result<u64>;
}

/// Run history storage trait
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Whether any run is Pending, Downloading or Processing
    ///
    /// # Errors
    ///
    /// Returns an error if the check cannot be performed.
    async fn has_active_run(&self) -> Result<bool>;

    /// Persist a new run
    ///
    /// # Errors
    ///
    /// Returns [`CardSyncError::Conflict`](crate::domain::CardSyncError::Conflict)
    /// if another run is active; no row is created in that case.
    async fn create_run(&self, run: &SyncRun) -> Result<()>;

    /// Persist the current state of an existing run
    ///
    /// # Errors
    ///
    /// Returns an error if the run does not exist or the write fails.
    async fn save_run(&self, run: &SyncRun) -> Result<()>;

    /// Persist record-level errors of a run
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn append_errors(&self, errors: &[SyncErrorEntry]) -> Result<()>;

    /// Persist buffered errors and the run counters together
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; neither part is kept then.
    async fn checkpoint(&self, run: &SyncRun, errors: &[SyncErrorEntry]) -> Result<()>;

    /// Most recently started run
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    async fn latest_run(&self) -> Result<Option<SyncRun>>;

    /// Run by id
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    async fn get_run(&self, id: RunId) -> Result<Option<SyncRun>>;

    /// Page of runs, newest first. `page` starts at 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    async fn run_history(&self, page: u32, page_size: u32) -> Result<Vec<SyncRun>>;

    /// Number of recorded runs
    ///
    /// # Errors
    ///
    /// Returns an error if the count cannot be read.
    async fn count_runs(&self) -> Result<u64>;

    /// Record-level errors of one run, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    async fn run_errors(&self, run_id: RunId, limit: u32) -> Result<Vec<SyncErrorEntry>>;

    /// Aggregate statistics across all runs
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    async fn run_stats(&self) -> Result<RunStats>;

    /// Mark active runs started before `cutoff` as Failed
    ///
    /// # Returns
    ///
    /// The number of runs marked.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn fail_stale_runs(&self, cutoff: DateTime<Utc>, message: &str) -> Result<u64>;
}

/// Offset of a 1-based page
pub(crate) fn page_offset(page: u32, page_size: u32) -> u64 {
    u64::from(page.max(1) - 1) * u64::from(page_size)
}
