//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Configurable log levels, overridable through `RUST_LOG`
//! - Console output for interactive use
//! - JSON lines in rolling local files
//!
//! # Example
//!
//! ```no_run
//! use cardsync::logging::init_logging;
//! use cardsync::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of a sync run
///
/// # Example
///
/// ```no_run
/// use cardsync::log_sync_start;
/// use cardsync::domain::RunId;
///
/// let run_id = RunId::new();
/// log_sync_start!(run_id, "scryfall", false);
/// ```
#[macro_export]
macro_rules! log_sync_start {
    ($run_id:expr, $provider:expr, $dry_run:expr) => {
        tracing::info!(
            run_id = %$run_id,
            provider = $provider,
            dry_run = $dry_run,
            "Starting sync run"
        );
    };
}

/// Log a batch written to storage
///
/// `$counters` is a [`BatchCounters`](crate::core::sync::BatchCounters).
#[macro_export]
macro_rules! log_batch_flush {
    ($kind:expr, $size:expr, $counters:expr, $duration:expr) => {
        tracing::debug!(
            kind = $kind,
            size = $size,
            added = $counters.added,
            updated = $counters.updated,
            skipped = $counters.skipped,
            duration_ms = $duration.as_millis() as u64,
            "Flushed batch"
        );
    };
}

/// Log a persisted checkpoint
#[macro_export]
macro_rules! log_checkpoint {
    ($run_id:expr, $counters:expr) => {
        tracing::info!(
            run_id = %$run_id,
            total_in_source = $counters.total_in_source,
            processed = $counters.processed,
            added = $counters.added,
            updated = $counters.updated,
            skipped = $counters.skipped,
            failed = $counters.failed,
            "Checkpoint saved"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use cardsync::log_error_with_context;
/// use cardsync::domain::CardSyncError;
///
/// let error = CardSyncError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}
