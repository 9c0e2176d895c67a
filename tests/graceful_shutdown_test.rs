//! Integration tests for graceful shutdown
//!
//! These tests verify that:
//! - The shutdown flag reaches every receiver
//! - A run stopped by shutdown ends Cancelled with its history intact
//! - The scheduler stops promptly and never starts a run after shutdown

use cardsync::adapters::database::{CardStore, RunStore};
use cardsync::adapters::dataset::FileDatasetProvider;
use cardsync::adapters::memory::InMemoryStore;
use cardsync::core::state::RunStatus;
use cardsync::core::sync::{BatchConfig, Scheduler, SyncCoordinator, SyncSettings};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::sync::watch;

fn dataset(count: usize) -> NamedTempFile {
    let elements: Vec<String> = (0..count)
        .map(|i| {
            format!(
                r#"{{"id":"{}","oracle_id":"{}","name":"Shutdown Card {i}","cmc":0}}"#,
                uuid::Uuid::new_v4(),
                uuid::Uuid::new_v4()
            )
        })
        .collect();
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[{}]", elements.join(",")).unwrap();
    file
}

fn coordinator(
    file: &NamedTempFile,
    store: &Arc<InMemoryStore>,
    shutdown: watch::Receiver<bool>,
) -> SyncCoordinator {
    SyncCoordinator::with_components(
        SyncSettings {
            batch: BatchConfig::new(4, false).unwrap(),
            checkpoint_interval: 10,
            max_error_message_length: 500,
            max_record_bytes: 16 * 1024,
        },
        Arc::new(FileDatasetProvider::new(file.path())),
        store.clone(),
        store.clone(),
        shutdown,
    )
}

#[tokio::test]
async fn test_shutdown_signal_propagation() {
    let (shutdown_tx, shutdown_rx1) = watch::channel(false);
    let shutdown_rx2 = shutdown_rx1.clone();

    assert!(!*shutdown_rx1.borrow());
    assert!(!*shutdown_rx2.borrow());

    shutdown_tx.send(true).unwrap();

    assert!(*shutdown_rx1.borrow());
    assert!(*shutdown_rx2.borrow());
}

#[tokio::test]
async fn test_run_started_after_shutdown_is_cancelled() {
    let file = dataset(20);
    let store = Arc::new(InMemoryStore::new());
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let summary = coordinator(&file, &store, rx).start_run().await.unwrap();

    assert_eq!(summary.status, RunStatus::Cancelled);
    assert_eq!(store.count_cards().await.unwrap(), 0);

    let run = store.get_run(summary.run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Cancelled);
    assert!(run.completed_at.is_some());
    assert!(run.counters.is_consistent());
}

#[tokio::test]
async fn test_cancelled_run_does_not_block_the_next_one() {
    let file = dataset(20);
    let store = Arc::new(InMemoryStore::new());

    let (tx, rx) = watch::channel(true);
    coordinator(&file, &store, rx).start_run().await.unwrap();
    drop(tx);

    let (_tx, rx) = watch::channel(false);
    let summary = coordinator(&file, &store, rx).start_run().await.unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.counters.added, 20);
    assert_eq!(store.count_runs().await.unwrap(), 2);
}

#[tokio::test]
async fn test_scheduler_stops_on_shutdown_without_running() {
    let file = dataset(5);
    let store = Arc::new(InMemoryStore::new());
    let (tx, rx) = watch::channel(false);

    let scheduler = Scheduler::new(
        Arc::new(coordinator(&file, &store, rx.clone())),
        Duration::from_secs(3600),
        false,
        rx,
    );
    let handle = tokio::spawn(scheduler.run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(true).unwrap();

    let stats = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.ticks, 0);
    assert_eq!(store.count_runs().await.unwrap(), 0);
}
