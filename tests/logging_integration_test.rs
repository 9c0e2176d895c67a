//! Integration tests for logging functionality
//!
//! A process has a single global subscriber, so everything that installs one
//! lives in one test.

use cardsync::config::LoggingConfig;
use cardsync::domain::CardSyncError;
use cardsync::logging::init_logging;
use tempfile::TempDir;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(!config.local_enabled);
    assert_eq!(config.local_rotation, "daily");
}

#[test]
fn test_invalid_level_is_rejected_before_install() {
    let result = init_logging("verbose", &LoggingConfig::default());
    assert!(matches!(result, Err(CardSyncError::Configuration(_))));
}

#[test]
fn test_file_logging_creates_directory_and_installs_once() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs").join("cardsync");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "never".to_string(),
    };
    assert!(!log_path.exists());

    let guard = init_logging("debug", &config).unwrap();
    assert!(log_path.is_dir());
    tracing::info!(run_id = "test", "written to the rolling file");

    let second = init_logging("info", &LoggingConfig::default());
    assert!(matches!(second, Err(CardSyncError::Configuration(_))));

    drop(guard);
}
