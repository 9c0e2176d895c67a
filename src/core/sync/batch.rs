//! Batch writer
//!
//! Buffers classified records into bounded insert and update queues and
//! writes each queue in one storage call when it fills up. Every flush
//! returns the counters it produced; nothing is accumulated behind the
//! caller's back.

use crate::adapters::database::CardStore;
use crate::domain::ids::CardId;
use crate::domain::{CardRecord, CardSyncError, CardUpdate, NewCard, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Default number of records per storage write
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Batch writer configuration
#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    /// Records per queue before it is written
    pub batch_size: usize,
    /// Count writes without performing them
    pub dry_run: bool,
}

impl BatchConfig {
    /// Create a batch configuration
    ///
    /// # Errors
    ///
    /// Returns an error if `batch_size` is zero.
    pub fn new(batch_size: usize, dry_run: bool) -> Result<Self> {
        if batch_size == 0 {
            return Err(CardSyncError::Configuration(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            batch_size,
            dry_run,
        })
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            dry_run: false,
        }
    }
}

/// Outcome counters of one or more flushes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounters {
    pub added: u64,
    pub updated: u64,
    pub skipped: u64,
}

impl BatchCounters {
    /// Records settled by the flush
    pub fn settled(&self) -> u64 {
        self.added + self.updated + self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.settled() == 0
    }

    /// Merge another result into this one
    pub fn merge(&mut self, other: BatchCounters) {
        self.added += other.added;
        self.updated += other.updated;
        self.skipped += other.skipped;
    }
}

/// Bounded insert/update queues in front of a [`CardStore`]
pub struct BatchWriter {
    cards: Arc<dyn CardStore + Send + Sync>,
    config: BatchConfig,
    pending_inserts: Vec<NewCard>,
    pending_updates: Vec<CardUpdate>,
    peak_queued: usize,
}

impl BatchWriter {
    pub fn new(cards: Arc<dyn CardStore + Send + Sync>, config: BatchConfig) -> Self {
        Self {
            cards,
            config,
            pending_inserts: Vec::with_capacity(config.batch_size),
            pending_updates: Vec::with_capacity(config.batch_size),
            peak_queued: 0,
        }
    }

    /// Records currently buffered in both queues
    pub fn queued(&self) -> usize {
        self.pending_inserts.len() + self.pending_updates.len()
    }

    /// Largest number of records buffered at any one time
    pub fn peak_queued(&self) -> usize {
        self.peak_queued
    }

    fn note_queued(&mut self) {
        self.peak_queued = self.peak_queued.max(self.queued());
    }

    /// Queue a new card, writing the insert queue once it is full
    ///
    /// # Returns
    ///
    /// The counters of the flush, if one happened.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub async fn enqueue_insert(&mut self, record: CardRecord) -> Result<Option<BatchCounters>> {
        self.pending_inserts.push(NewCard::from_record(record));
        self.note_queued();

        if self.pending_inserts.len() >= self.config.batch_size {
            return self.flush_inserts().await.map(Some);
        }
        Ok(None)
    }

    /// Queue an update of a stored card, writing the update queue once it is full
    ///
    /// # Returns
    ///
    /// The counters of the flush, if one happened.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub async fn enqueue_update(
        &mut self,
        card_id: CardId,
        record: CardRecord,
    ) -> Result<Option<BatchCounters>> {
        self.pending_updates.push(CardUpdate::new(card_id, record));
        self.note_queued();

        if self.pending_updates.len() >= self.config.batch_size {
            return self.flush_updates().await.map(Some);
        }
        Ok(None)
    }

    /// Write the insert queue
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. The queue is emptied either way.
    pub async fn flush_inserts(&mut self) -> Result<BatchCounters> {
        let batch = std::mem::take(&mut self.pending_inserts);
        if batch.is_empty() {
            return Ok(BatchCounters::default());
        }

        let started = Instant::now();
        let inserted = if self.config.dry_run {
            batch.len()
        } else {
            self.cards.insert_cards(&batch).await?
        };

        let counters = BatchCounters {
            added: inserted as u64,
            updated: 0,
            skipped: batch.len().saturating_sub(inserted) as u64,
        };
        crate::log_batch_flush!("insert", batch.len(), counters, started.elapsed());
        Ok(counters)
    }

    /// Write the update queue
    ///
    /// Entries that target an id already present earlier in the queue are
    /// dropped and counted as skipped. Updates the store could not apply
    /// because the card vanished are counted as skipped too.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. The queue is emptied either way.
    pub async fn flush_updates(&mut self) -> Result<BatchCounters> {
        let batch = std::mem::take(&mut self.pending_updates);
        if batch.is_empty() {
            return Ok(BatchCounters::default());
        }

        let total = batch.len();
        let unique = dedupe_by_id(batch);
        let duplicates = total - unique.len();

        let started = Instant::now();
        let applied = if self.config.dry_run {
            unique.len()
        } else {
            self.cards.replace_cards(&unique).await?
        };

        let vanished = unique.len().saturating_sub(applied);
        if vanished > 0 {
            tracing::warn!(
                vanished,
                "Cards removed from storage during the run were not updated"
            );
        }

        let counters = BatchCounters {
            added: 0,
            updated: applied as u64,
            skipped: (duplicates + vanished) as u64,
        };
        crate::log_batch_flush!("update", total, counters, started.elapsed());
        Ok(counters)
    }

    /// Write both queues
    ///
    /// # Errors
    ///
    /// Returns an error if either write fails.
    pub async fn flush_all(&mut self) -> Result<BatchCounters> {
        let mut counters = self.flush_inserts().await?;
        counters.merge(self.flush_updates().await?);
        Ok(counters)
    }

    /// Drop both queues without writing
    ///
    /// # Returns
    ///
    /// The number of records dropped.
    pub fn discard(&mut self) -> usize {
        let dropped = self.queued();
        self.pending_inserts = Vec::new();
        self.pending_updates = Vec::new();
        dropped
    }
}

/// Keeps the first update per card id, preserving queue order
fn dedupe_by_id(batch: Vec<CardUpdate>) -> Vec<CardUpdate> {
    let mut seen = HashSet::with_capacity(batch.len());
    batch
        .into_iter()
        .filter(|update| seen.insert(update.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::card::fixtures::card;
    use chrono::Utc;
    use uuid::Uuid;

    fn writer(store: &Arc<InMemoryStore>, batch_size: usize, dry_run: bool) -> BatchWriter {
        let cards: Arc<dyn CardStore + Send + Sync> = store.clone();
        BatchWriter::new(cards, BatchConfig::new(batch_size, dry_run).unwrap())
    }

    #[test]
    fn test_batch_config_rejects_zero() {
        assert!(BatchConfig::new(0, false).is_err());
        assert_eq!(BatchConfig::default().batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_counters_merge() {
        let mut a = BatchCounters {
            added: 2,
            updated: 1,
            skipped: 0,
        };
        a.merge(BatchCounters {
            added: 1,
            updated: 0,
            skipped: 3,
        });
        assert_eq!(a.added, 3);
        assert_eq!(a.updated, 1);
        assert_eq!(a.skipped, 3);
        assert_eq!(a.settled(), 7);
        assert!(BatchCounters::default().is_empty());
    }

    #[tokio::test]
    async fn test_insert_queue_flushes_when_full() {
        let store = Arc::new(InMemoryStore::new());
        let mut writer = writer(&store, 3, false);

        for name in ["a", "b"] {
            let flushed = writer
                .enqueue_insert(card(Some(Uuid::new_v4()), name))
                .await
                .unwrap();
            assert!(flushed.is_none());
        }
        let flushed = writer
            .enqueue_insert(card(Some(Uuid::new_v4()), "c"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(flushed.added, 3);
        assert_eq!(writer.queued(), 0);
        assert_eq!(writer.peak_queued(), 3);
        assert_eq!(store.count_cards().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_flush_dedupes_by_id() {
        let store = Arc::new(InMemoryStore::new());
        let key = Uuid::new_v4();
        let id = store
            .seed_card(card(Some(key), "Old Name"), Utc::now())
            .unwrap();
        let mut writer = writer(&store, 10, false);

        writer.enqueue_update(id, card(Some(key), "New Name")).await.unwrap();
        writer.enqueue_update(id, card(Some(key), "Newer Name")).await.unwrap();
        let counters = writer.flush_updates().await.unwrap();

        assert_eq!(counters.updated, 1);
        assert_eq!(counters.skipped, 1);
        let stored = store.card(id).unwrap().unwrap();
        assert_eq!(stored.record.name, "New Name");
    }

    #[tokio::test]
    async fn test_update_of_vanished_card_is_skipped() {
        let store = Arc::new(InMemoryStore::new());
        let mut writer = writer(&store, 10, false);

        writer
            .enqueue_update(CardId::new(), card(Some(Uuid::new_v4()), "Ghost"))
            .await
            .unwrap();
        let counters = writer.flush_updates().await.unwrap();

        assert_eq!(counters.updated, 0);
        assert_eq!(counters.skipped, 1);
    }

    #[tokio::test]
    async fn test_dry_run_counts_without_writing() {
        let store = Arc::new(InMemoryStore::new());
        let mut writer = writer(&store, 10, true);

        writer.enqueue_insert(card(None, "Token")).await.unwrap();
        writer
            .enqueue_update(CardId::new(), card(Some(Uuid::new_v4()), "Elf"))
            .await
            .unwrap();
        let counters = writer.flush_all().await.unwrap();

        assert_eq!(counters.added, 1);
        assert_eq!(counters.updated, 1);
        assert_eq!(store.count_cards().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_flush_empties_queue() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_card_writes(true);
        let mut writer = writer(&store, 10, false);

        writer.enqueue_insert(card(None, "Token")).await.unwrap();
        assert!(writer.flush_inserts().await.is_err());
        assert_eq!(writer.queued(), 0);
    }

    #[tokio::test]
    async fn test_discard_drops_both_queues() {
        let store = Arc::new(InMemoryStore::new());
        let mut writer = writer(&store, 10, false);

        writer.enqueue_insert(card(None, "Token")).await.unwrap();
        writer
            .enqueue_update(CardId::new(), card(Some(Uuid::new_v4()), "Elf"))
            .await
            .unwrap();

        assert_eq!(writer.discard(), 2);
        assert_eq!(writer.queued(), 0);
        assert_eq!(store.count_cards().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_queues_stay_bounded() {
        let store = Arc::new(InMemoryStore::new());
        let mut writer = writer(&store, 4, false);

        for i in 0..50 {
            writer
                .enqueue_insert(card(Some(Uuid::new_v4()), &format!("card {i}")))
                .await
                .unwrap();
            assert!(writer.queued() <= 4);
        }
        writer.flush_all().await.unwrap();

        assert!(writer.peak_queued() <= 4);
        assert!(store.largest_write() <= 4);
        assert_eq!(store.count_cards().await.unwrap(), 50);
    }
}
