//! External system integrations for cardsync.
//!
//! This module provides adapters for integrating with external systems:
//!
//! - [`dataset`] - Bulk dataset providers (Scryfall API, local file)
//! - [`database`] - Storage abstraction layer (trait-based)
//! - [`postgresql`] - PostgreSQL implementation
//! - [`memory`] - In-process implementation for dry runs and tests
//!
//! # Design Pattern
//!
//! Adapters isolate external dependencies behind traits so the pipeline can
//! run against any provider and any store. Both trait families are created by
//! factories that read the configuration.
//!
//! # Dataset Providers
//!
//! ```rust,no_run
//! use cardsync::adapters::dataset::{DatasetProvider, ScryfallClient};
//! use cardsync::config::SourceConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ScryfallClient::new(&SourceConfig::default())?;
//! let metadata = client.dataset_metadata().await?;
//! println!("{} bytes, updated {}", metadata.size_bytes, metadata.updated_at);
//! # Ok(())
//! # }
//! ```
//!
//! # Storage
//!
//! ```rust,no_run
//! use cardsync::adapters::database::create_stores;
//! use cardsync::config::load_config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("cardsync.toml")?;
//! let stores = create_stores(&config).await?;
//! stores.cards.ensure_schema().await?;
//! println!("{} cards stored", stores.cards.count_cards().await?);
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod dataset;
pub mod memory;
pub mod postgresql;
