//! Sync coordinator - main orchestrator for a synchronization run
//!
//! Owns the run state machine and the single-flight guard, and drives the
//! dataset stream through decoder, diff engine and batch writer while the
//! progress tracker settles counters and captures record-level failures.

use super::batch::{BatchConfig, BatchWriter};
use super::decoder::{DecodedRecord, RecordDecoder};
use super::diff::{Classification, DiffEngine};
use super::progress::ProgressTracker;
use super::summary::SyncSummary;
use crate::adapters::database::{create_stores, CardStore, RunStore, Stores};
use crate::adapters::dataset::{create_dataset_provider, DatasetProvider};
use crate::config::CardSyncConfig;
use crate::core::state::run::SyncRun;
use crate::domain::{CardRecord, CardSyncError, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Tunables of the pipeline
#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub batch: BatchConfig,
    pub checkpoint_interval: u64,
    pub max_error_message_length: usize,
    pub max_record_bytes: usize,
}

impl SyncSettings {
    /// Build the settings from the loaded configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the batch size is invalid.
    pub fn from_config(config: &CardSyncConfig) -> Result<Self> {
        Ok(Self {
            batch: BatchConfig::new(config.sync.batch_size, config.application.dry_run)?,
            checkpoint_interval: config.sync.checkpoint_interval,
            max_error_message_length: config.sync.max_error_message_length,
            max_record_bytes: config.sync.max_record_bytes,
        })
    }
}

/// Where the decode loop stopped
enum LoopExit {
    Exhausted,
    Cancelled,
}

/// Sync coordinator
pub struct SyncCoordinator {
    settings: SyncSettings,
    provider: Arc<dyn DatasetProvider>,
    cards: Arc<dyn CardStore + Send + Sync>,
    runs: Arc<dyn RunStore + Send + Sync>,
    shutdown: watch::Receiver<bool>,
}

impl SyncCoordinator {
    /// Create a coordinator from configuration
    ///
    /// Connects to the configured storage; see [`Self::from_stores`].
    ///
    /// # Errors
    ///
    /// Returns an error if the provider or the stores cannot be created.
    pub async fn new(config: &CardSyncConfig, shutdown: watch::Receiver<bool>) -> Result<Self> {
        let settings = SyncSettings::from_config(config)?;
        let provider = create_dataset_provider(&config.source)?;
        let stores = create_stores(config).await?;
        Self::from_stores(settings, provider, stores, shutdown).await
    }

    /// Create a coordinator on connected stores
    ///
    /// Applies the schema, except in dry-run mode where the database is only
    /// read: run history is kept in memory, and a database without the card
    /// tables is previewed as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied or inspected.
    pub async fn from_stores(
        settings: SyncSettings,
        provider: Arc<dyn DatasetProvider>,
        stores: Stores,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        if !settings.batch.dry_run {
            stores.cards.ensure_schema().await?;
            return Ok(Self::with_components(
                settings,
                provider,
                stores.cards,
                stores.runs,
                shutdown,
            ));
        }

        tracing::info!(
            "Dry run: schema is not applied, card writes are skipped and runs are kept in memory"
        );
        let cards = if stores.cards.schema_exists().await? {
            stores.cards
        } else {
            tracing::warn!("Dry run on an uninitialized database, every record counts as new");
            Stores::in_memory().0.cards
        };

        Ok(Self::with_components(
            settings,
            provider,
            cards,
            Stores::in_memory().0.runs,
            shutdown,
        ))
    }

    /// Create a coordinator from already built components
    pub fn with_components(
        settings: SyncSettings,
        provider: Arc<dyn DatasetProvider>,
        cards: Arc<dyn CardStore + Send + Sync>,
        runs: Arc<dyn RunStore + Send + Sync>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            settings,
            provider,
            cards,
            runs,
            shutdown,
        }
    }

    /// Run history store used by this coordinator
    pub fn run_store(&self) -> Arc<dyn RunStore + Send + Sync> {
        self.runs.clone()
    }

    /// Whether a run is Pending, Downloading or Processing
    ///
    /// # Errors
    ///
    /// Returns an error if the run store cannot be read.
    pub async fn is_run_active(&self) -> Result<bool> {
        self.runs.has_active_run().await
    }

    fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Execute one synchronization run
    ///
    /// 1. Rejects the call with [`CardSyncError::Conflict`] if a run is active
    /// 2. Persists a new Pending run
    /// 3. Downloading: fetches the dataset metadata and opens the stream
    /// 4. Processing: decode, classify, enqueue, flush, checkpoint
    /// 5. Persists Completed, or Cancelled when shutdown was requested
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the run after the run was marked
    /// Failed. A conflict creates no run.
    pub async fn start_run(&self) -> Result<SyncSummary> {
        let started = Instant::now();

        if self.runs.has_active_run().await? {
            return Err(CardSyncError::Conflict(
                "a synchronization run is already active".to_string(),
            ));
        }

        let mut run = SyncRun::new();
        self.runs.create_run(&run).await?;
        crate::log_sync_start!(run.id, self.provider.name(), self.settings.batch.dry_run);

        let mut progress = ProgressTracker::new(
            run.id,
            self.settings.checkpoint_interval,
            self.settings.max_error_message_length,
        );
        let mut writer = BatchWriter::new(self.cards.clone(), self.settings.batch);

        match self.drive(&mut run, &mut progress, &mut writer).await {
            Ok(discarded) => {
                let summary = SyncSummary::from_run(&run, self.settings.batch.dry_run)
                    .with_duration(started.elapsed())
                    .with_queue_stats(writer.peak_queued(), discarded);
                summary.log_summary();
                Ok(summary)
            }
            Err(error) => {
                writer.discard();
                self.fail_run(&mut run, &mut progress, &error).await;
                Err(error)
            }
        }
    }

    /// Runs the phases after creation; returns the number of discarded records
    async fn drive(
        &self,
        run: &mut SyncRun,
        progress: &mut ProgressTracker,
        writer: &mut BatchWriter,
    ) -> Result<usize> {
        run.mark_downloading()?;
        self.runs.save_run(run).await?;

        let metadata = self.provider.dataset_metadata().await?;
        tracing::info!(
            run_id = %run.id,
            dataset_id = %metadata.id,
            updated_at = %metadata.updated_at,
            size_bytes = metadata.size_bytes,
            "Fetched dataset metadata"
        );
        run.attach_metadata(&metadata);
        self.runs.save_run(run).await?;

        let stream = self.provider.open_dataset(&metadata.download_uri).await?;

        run.mark_processing()?;
        self.runs.save_run(run).await?;

        let mut diff = DiffEngine::load(self.cards.as_ref()).await?;
        let mut decoder = RecordDecoder::<CardRecord>::new(stream, self.settings.max_record_bytes);

        let exit = loop {
            if self.is_cancelled() {
                break LoopExit::Cancelled;
            }

            let Some(decoded) = decoder.next_record().await? else {
                break LoopExit::Exhausted;
            };
            progress.record_pulled();

            match decoded {
                DecodedRecord::Record(record) => {
                    self.route(record, &mut diff, writer, progress).await?;
                }
                DecodedRecord::Malformed(malformed) => progress.record_malformed(&malformed),
            }

            if progress.should_checkpoint() {
                self.checkpoint(run, progress, writer).await?;
            }
        };

        match exit {
            LoopExit::Exhausted => {
                progress.apply(writer.flush_all().await?);
                let errors = progress.begin_checkpoint(run);

                let mut finished = run.clone();
                finished.mark_completed()?;
                self.runs.checkpoint(&finished, &errors).await?;
                progress.commit_checkpoint(errors.len());
                *run = finished;
                Ok(0)
            }
            LoopExit::Cancelled => {
                let discarded = writer.discard();
                tracing::warn!(
                    run_id = %run.id,
                    discarded,
                    "Cancellation requested, stopping run"
                );
                let errors = progress.begin_checkpoint(run);

                let mut finished = run.clone();
                finished.mark_cancelled()?;
                self.runs.checkpoint(&finished, &errors).await?;
                progress.commit_checkpoint(errors.len());
                *run = finished;
                Ok(discarded)
            }
        }
    }

    /// Validate, classify and enqueue one decoded record
    async fn route(
        &self,
        record: CardRecord,
        diff: &mut DiffEngine,
        writer: &mut BatchWriter,
        progress: &mut ProgressTracker,
    ) -> Result<()> {
        if let Err(message) = record.validate() {
            progress.record_failure(&record, &message);
            return Ok(());
        }

        let flushed = match diff.classify(&record) {
            Classification::Skip => {
                tracing::trace!(name = %record.name, "Duplicate key in this run, skipping");
                progress.record_skipped();
                None
            }
            Classification::Insert => writer.enqueue_insert(record).await?,
            Classification::Update { card_id } => writer.enqueue_update(card_id, record).await?,
        };

        if let Some(counters) = flushed {
            progress.apply(counters);
        }
        Ok(())
    }

    /// Flush both queues, then persist counters and buffered errors
    async fn checkpoint(
        &self,
        run: &mut SyncRun,
        progress: &mut ProgressTracker,
        writer: &mut BatchWriter,
    ) -> Result<()> {
        progress.apply(writer.flush_all().await?);
        let errors = progress.begin_checkpoint(run);
        self.runs.checkpoint(run, &errors).await?;
        progress.commit_checkpoint(errors.len());

        crate::log_checkpoint!(run.id, run.counters);
        Ok(())
    }

    /// Mark the run Failed and persist what is known about it
    ///
    /// Persistence errors here are logged; the original error is what the
    /// caller gets.
    async fn fail_run(&self, run: &mut SyncRun, progress: &mut ProgressTracker, error: &CardSyncError) {
        crate::log_error_with_context!(error, "Sync run failed");

        let errors = progress.begin_checkpoint(run);
        if let Err(e) = run.mark_failed(&error.to_string(), self.settings.max_error_message_length) {
            tracing::error!(run_id = %run.id, error = %e, "Could not mark run as failed");
            return;
        }

        match self.runs.checkpoint(run, &errors).await {
            Ok(()) => progress.commit_checkpoint(errors.len()),
            Err(e) => tracing::error!(
                run_id = %run.id,
                error = %e,
                unsaved_errors = errors.len(),
                "Failed to persist failed run; it stays active until reclaimed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::dataset::FileDatasetProvider;
    use crate::adapters::memory::InMemoryStore;
    use crate::core::state::run::RunStatus;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn settings(batch_size: usize) -> SyncSettings {
        SyncSettings {
            batch: BatchConfig::new(batch_size, false).unwrap(),
            checkpoint_interval: 5,
            max_error_message_length: 200,
            max_record_bytes: 64 * 1024,
        }
    }

    fn dataset(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn coordinator(
        file: &NamedTempFile,
        store: &Arc<InMemoryStore>,
        shutdown: watch::Receiver<bool>,
    ) -> SyncCoordinator {
        SyncCoordinator::with_components(
            settings(2),
            Arc::new(FileDatasetProvider::with_chunk_size(file.path(), 7)),
            store.clone(),
            store.clone(),
            shutdown,
        )
    }

    fn card_json(oracle_id: &str, name: &str) -> String {
        format!(
            r#"{{"id":"{}","oracle_id":"{oracle_id}","name":"{name}","cmc":1,"colors":[],"color_identity":[],"legalities":{{}},"prices":{{}}}}"#,
            uuid::Uuid::new_v4()
        )
    }

    #[tokio::test]
    async fn test_run_completes_and_persists_counters() {
        let a = uuid::Uuid::new_v4().to_string();
        let b = uuid::Uuid::new_v4().to_string();
        let file = dataset(&format!("[{},{}]", card_json(&a, "A"), card_json(&b, "B")));
        let store = Arc::new(InMemoryStore::new());
        let (_tx, rx) = watch::channel(false);

        let summary = coordinator(&file, &store, rx).start_run().await.unwrap();

        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(summary.counters.added, 2);
        assert_eq!(summary.counters.processed, 2);
        let runs = store.runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].completed_at.is_some());
        assert!(runs[0].counters.is_consistent());
        assert!(runs[0].dataset_id.is_some());
    }

    #[tokio::test]
    async fn test_cancelled_before_first_record() {
        let a = uuid::Uuid::new_v4().to_string();
        let file = dataset(&format!("[{}]", card_json(&a, "A")));
        let store = Arc::new(InMemoryStore::new());
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let summary = coordinator(&file, &store, rx).start_run().await.unwrap();

        assert!(summary.is_cancelled());
        assert_eq!(summary.counters.total_in_source, 0);
        assert_eq!(store.count_cards().await.unwrap(), 0);
        assert!(!store.has_active_run().await.unwrap());
    }

    #[tokio::test]
    async fn test_broken_container_fails_run() {
        let file = dataset(r#"{"object":"error"}"#);
        let store = Arc::new(InMemoryStore::new());
        let (_tx, rx) = watch::channel(false);

        let result = coordinator(&file, &store, rx).start_run().await;

        assert!(matches!(result, Err(CardSyncError::Decode(_))));
        let runs = store.runs().unwrap();
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert!(runs[0].completed_at.is_some());
        assert!(runs[0].error_message.is_some());
    }

    #[tokio::test]
    async fn test_invalid_record_is_counted_as_failed() {
        let a = uuid::Uuid::new_v4().to_string();
        let b = uuid::Uuid::new_v4().to_string();
        let file = dataset(&format!("[{},{}]", card_json(&a, "A"), card_json(&b, "  ")));
        let store = Arc::new(InMemoryStore::new());
        let (_tx, rx) = watch::channel(false);

        let summary = coordinator(&file, &store, rx).start_run().await.unwrap();

        assert_eq!(summary.counters.added, 1);
        assert_eq!(summary.counters.failed, 1);
        let errors = store.run_errors(summary.run_id, 10).await.unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].oracle_id.as_deref(), Some(b.as_str()));
    }

    #[tokio::test]
    async fn test_errors_survive_failed_final_checkpoint() {
        let a = uuid::Uuid::new_v4().to_string();
        let file = dataset(&format!(
            r#"[{},{{"id":"not-a-uuid","name":"Broken"}}]"#,
            card_json(&a, "A")
        ));
        let store = Arc::new(InMemoryStore::new());
        store.fail_next_checkpoint();
        let (_tx, rx) = watch::channel(false);

        let mut wide_interval = settings(2);
        wide_interval.checkpoint_interval = 1000;
        let result = SyncCoordinator::with_components(
            wide_interval,
            Arc::new(FileDatasetProvider::with_chunk_size(file.path(), 7)),
            store.clone(),
            store.clone(),
            rx,
        )
        .start_run()
        .await;

        assert!(matches!(result, Err(CardSyncError::Database(_))));
        let runs = store.runs().unwrap();
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert_eq!(runs[0].counters.failed, 1);
        let errors = store.run_errors(runs[0].id, 10).await.unwrap();
        assert_eq!(errors.len() as u64, runs[0].counters.failed);
        assert!(errors[0].message.starts_with("element 1"));
    }

    #[tokio::test]
    async fn test_dry_run_leaves_schema_alone() {
        let (stores, store) = Stores::in_memory();
        let file = dataset("[]");
        let (_tx, rx) = watch::channel(false);
        let mut dry = settings(2);
        dry.batch = BatchConfig::new(2, true).unwrap();

        let coordinator = SyncCoordinator::from_stores(
            dry,
            Arc::new(FileDatasetProvider::new(file.path())),
            stores.clone(),
            rx.clone(),
        )
        .await
        .unwrap();
        assert!(!store.schema_applied());
        coordinator.start_run().await.unwrap();
        assert!(store.runs().unwrap().is_empty());

        SyncCoordinator::from_stores(
            settings(2),
            Arc::new(FileDatasetProvider::new(file.path())),
            stores,
            rx,
        )
        .await
        .unwrap();
        assert!(store.schema_applied());
    }
}
