// Cardsync - Scryfall bulk data synchronizer
// Copyright (c) 2025 Cardsync Contributors
// Licensed under the MIT License

//! # cardsync - Scryfall bulk data synchronizer
//!
//! cardsync keeps a PostgreSQL copy of the Scryfall bulk card dataset up to
//! date. It streams the published JSON array, diffs every card against what
//! is stored by its oracle id, and writes inserts and updates in bounded
//! batches while recording an auditable history of every run.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - The sync pipeline and the run state machine
//! - [`adapters`] - Dataset providers and storage backends
//! - [`domain`] - Card model, identifiers and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cardsync::config::load_config;
//! use cardsync::core::sync::SyncCoordinator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("cardsync.toml")?;
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//!     let coordinator = SyncCoordinator::new(&config, shutdown_rx).await?;
//!     let summary = coordinator.start_run().await?;
//!
//!     println!("{} added, {} updated", summary.counters.added, summary.counters.updated);
//!     Ok(())
//! }
//! ```
//!
//! ## One run at a time
//!
//! Only one run may be Pending, Downloading or Processing. A second start is
//! rejected with [`domain::CardSyncError::Conflict`] and leaves no trace in
//! the history:
//!
//! ```rust,no_run
//! # use cardsync::core::sync::SyncCoordinator;
//! # async fn example(coordinator: SyncCoordinator) {
//! match coordinator.start_run().await {
//!     Err(e) if e.is_conflict() => println!("already running"),
//!     Err(e) => eprintln!("run failed: {e}"),
//!     Ok(summary) => summary.log_summary(),
//! }
//! # }
//! ```
//!
//! ## Bad records
//!
//! A card that cannot be decoded or validated is recorded as a sync error
//! and counted in `failed`; the run continues. A broken dataset container or
//! a failed storage write aborts the run, which is then marked Failed.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
