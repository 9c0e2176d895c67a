//! Configuration management for cardsync.
//!
//! # Overview
//!
//! cardsync reads a TOML configuration file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `CARDSYNC_<SECTION>_<KEY>` overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry-run switch
//! - [`SourceConfig`] - Where the bulk dataset comes from
//! - [`SyncConfig`] - Batch size, checkpoint interval, error truncation
//! - [`PostgreSQLConfig`] - Database connection
//! - [`ScheduleConfig`] - Daemon interval
//! - [`LoggingConfig`] - Rolling JSON log files
//!
//! # Example Configuration
//!
//! ```toml
//! environment = "production"
//! database_target = "postgresql"
//!
//! [application]
//! log_level = "info"
//!
//! [source]
//! kind = "scryfall"
//! bulk_data_type = "oracle-cards"
//! user_agent = "cardsync/1.0 (ops@example.com)"
//!
//! [sync]
//! batch_size = 1000
//! checkpoint_interval = 5000
//!
//! [postgresql]
//! connection_string = "${CARDSYNC_PG_CONNECTION}"
//!
//! [schedule]
//! interval_hours = 24
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, load_config_from_str};
pub use schema::{
    ApplicationConfig, CardSyncConfig, DatabaseTarget, Environment, LoggingConfig,
    PostgreSQLConfig, ScheduleConfig, SourceConfig, SourceKind, SyncConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
