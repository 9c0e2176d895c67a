//! Storage factory
//!
//! This module creates the card and run stores from configuration.

use crate::adapters::database::traits::{CardStore, RunStore};
use crate::adapters::memory::InMemoryStore;
use crate::adapters::postgresql::adapter::PostgreSQLAdapter;
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::config::schema::{CardSyncConfig, DatabaseTarget};
use crate::domain::{CardSyncError, Result};
use std::sync::Arc;

/// Card and run stores backed by the same connection pool
#[derive(Clone)]
pub struct Stores {
    pub cards: Arc<dyn CardStore + Send + Sync>,
    pub runs: Arc<dyn RunStore + Send + Sync>,
}

impl Stores {
    /// Both stores on one in-memory backend
    pub fn in_memory() -> (Self, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (
            Self {
                cards: store.clone() as Arc<dyn CardStore + Send + Sync>,
                runs: store.clone() as Arc<dyn RunStore + Send + Sync>,
            },
            store,
        )
    }
}

/// Create both stores from the same underlying client
///
/// # Errors
///
/// Returns an error if the configured database cannot be reached.
pub async fn create_stores(config: &CardSyncConfig) -> Result<Stores> {
    match config.database_target {
        DatabaseTarget::PostgreSQL => {
            let pg_config = config.postgresql.as_ref().ok_or_else(|| {
                CardSyncError::Configuration(
                    "postgresql configuration is required when database_target = 'postgresql'"
                        .to_string(),
                )
            })?;

            tracing::info!("Creating PostgreSQL card and run stores");
            let client = Arc::new(PostgreSQLClient::new(pg_config.clone()).await?);
            let adapter = Arc::new(PostgreSQLAdapter::new_with_arc(client));

            Ok(Stores {
                cards: adapter.clone() as Arc<dyn CardStore + Send + Sync>,
                runs: adapter as Arc<dyn RunStore + Send + Sync>,
            })
        }
        DatabaseTarget::Memory => {
            tracing::warn!("Using in-memory storage, nothing is kept after exit");
            Ok(Stores::in_memory().0)
        }
    }
}
