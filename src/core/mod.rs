//! Core business logic for cardsync.
//!
//! # Modules
//!
//! - [`sync`] - The streaming pipeline and its orchestration
//! - [`state`] - Run state machine and run history access
//!
//! # Sync Workflow
//!
//! 1. **Guard**: refuse to start while another run is active
//! 2. **Download**: fetch dataset metadata and open the byte stream
//! 3. **Decode**: pull one array element at a time
//! 4. **Diff**: classify each record as insert, update or skip by its external key
//! 5. **Batch**: write bounded insert and update queues
//! 6. **Checkpoint**: persist counters and record errors periodically
//! 7. **Finish**: persist Completed, Cancelled or Failed
//!
//! # Example
//!
//! ```rust,no_run
//! use cardsync::config::load_config;
//! use cardsync::core::sync::SyncCoordinator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("cardsync.toml")?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let coordinator = SyncCoordinator::new(&config, shutdown_rx).await?;
//! let summary = coordinator.start_run().await?;
//!
//! println!("Added: {}", summary.counters.added);
//! println!("Updated: {}", summary.counters.updated);
//! println!("Failed: {}", summary.counters.failed);
//! # Ok(())
//! # }
//! ```

pub mod state;
pub mod sync;
