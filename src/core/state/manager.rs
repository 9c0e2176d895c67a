//! Run manager for the reporting surface
//!
//! This module provides the RunManager used by the status, history and
//! reclaim commands to read and maintain the run history.

use crate::adapters::database::RunStore;
use crate::core::state::run::{RunStats, SyncErrorEntry, SyncRun};
use crate::domain::ids::RunId;
use crate::domain::Result;
use chrono::Utc;
use std::sync::Arc;

/// Message stored on runs marked Failed by [`RunManager::reclaim_stale`]
pub const ABANDONED_RUN_MESSAGE: &str =
    "Run abandoned: no terminal status was recorded, the process likely stopped mid-run";

/// One page of run history
#[derive(Debug, Clone)]
pub struct RunHistoryPage {
    pub runs: Vec<SyncRun>,
    pub page: u32,
    pub page_size: u32,
    /// Number of runs across all pages
    pub total: u64,
}

impl RunHistoryPage {
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.page_size))
    }
}

/// Run manager over a run store
///
/// Read access to the run history plus the operator action that releases
/// the single-flight slot held by a crashed run.
pub struct RunManager {
    /// Run storage backend
    storage: Arc<dyn RunStore + Send + Sync>,
}

impl RunManager {
    pub fn new(storage: Arc<dyn RunStore + Send + Sync>) -> Self {
        Self { storage }
    }

    /// Whether any run holds the single-flight slot
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn is_run_active(&self) -> Result<bool> {
        self.storage.has_active_run().await
    }

    /// Most recently started run
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn latest_run(&self) -> Result<Option<SyncRun>> {
        self.storage.latest_run().await
    }

    /// Run by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_run(&self, id: RunId) -> Result<Option<SyncRun>> {
        self.storage.get_run(id).await
    }

    /// Page of the run history, newest first
    ///
    /// # Arguments
    ///
    /// * `page` - 1-based page number
    /// * `page_size` - Runs per page
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn history(&self, page: u32, page_size: u32) -> Result<RunHistoryPage> {
        let page = page.max(1);
        let runs = self.storage.run_history(page, page_size).await?;
        let total = self.storage.count_runs().await?;
        Ok(RunHistoryPage {
            runs,
            page,
            page_size,
            total,
        })
    }

    /// Record-level errors of a run
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn run_errors(&self, id: RunId, limit: u32) -> Result<Vec<SyncErrorEntry>> {
        self.storage.run_errors(id, limit).await
    }

    /// Aggregate statistics
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn stats(&self) -> Result<RunStats> {
        self.storage.run_stats().await
    }

    /// Mark runs that stayed active longer than `older_than` as Failed
    ///
    /// A crash mid-run leaves the run active and blocks every later start.
    ///
    /// # Returns
    ///
    /// The number of runs reclaimed.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn reclaim_stale(&self, older_than: chrono::Duration) -> Result<u64> {
        let cutoff = Utc::now() - older_than;
        let reclaimed = self
            .storage
            .fail_stale_runs(cutoff, ABANDONED_RUN_MESSAGE)
            .await?;

        if reclaimed > 0 {
            tracing::warn!(reclaimed, cutoff = %cutoff, "Marked abandoned runs as failed");
        } else {
            tracing::info!(cutoff = %cutoff, "No abandoned runs found");
        }
        Ok(reclaimed)
    }
}
