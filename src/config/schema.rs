//! Configuration schema types
//!
//! This module defines the configuration structure for cardsync.

use crate::config::SecretString;
use serde::{Deserialize, Serialize};

/// Database target selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseTarget {
    /// PostgreSQL database
    PostgreSQL,
    /// Process-local store, nothing survives the process
    Memory,
}

/// Runtime environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment
    #[default]
    Development,
    /// Staging environment
    Staging,
    /// Production environment
    Production,
}

/// Where the bulk dataset comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Scryfall bulk-data API
    #[default]
    Scryfall,
    /// A JSON file on local disk
    File,
}

/// Main cardsync configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardSyncConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: Environment,

    /// Dataset source
    #[serde(default)]
    pub source: SourceConfig,

    /// Pipeline settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Database target (postgresql or memory)
    pub database_target: DatabaseTarget,

    /// PostgreSQL configuration (required if database_target = postgresql)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgresql: Option<PostgreSQLConfig>,

    /// Scheduled trigger settings
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CardSyncConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.source.validate(&self.environment)?;
        self.sync.validate()?;

        // Only the active database section is validated
        match self.database_target {
            DatabaseTarget::PostgreSQL => {
                if let Some(ref config) = self.postgresql {
                    config.validate()?;
                } else {
                    return Err(
                        "postgresql configuration is required when database_target = 'postgresql'"
                            .to_string(),
                    );
                }
            }
            DatabaseTarget::Memory => {
                if self.environment == Environment::Production {
                    return Err(
                        "database_target = 'memory' is not allowed in production".to_string()
                    );
                }
            }
        }

        self.schedule.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dry run mode (count card writes without performing them)
    #[serde(default)]
    pub dry_run: bool,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

/// Dataset source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,

    /// Base URL of the bulk-data API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bulk dataset type to synchronize
    #[serde(default = "default_bulk_data_type")]
    pub bulk_data_type: String,

    /// User-Agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for the metadata request
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default = "default_true")]
    pub tls_verify: bool,

    /// Dataset path (required if kind = file)
    #[serde(default)]
    pub file_path: Option<String>,
}

impl SourceConfig {
    fn validate(&self, environment: &Environment) -> Result<(), String> {
        match self.kind {
            SourceKind::Scryfall => {
                let url = url::Url::parse(&self.base_url)
                    .map_err(|e| format!("source.base_url is not a valid URL: {e}"))?;
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err("source.base_url must start with http:// or https://".to_string());
                }

                if self.bulk_data_type.trim().is_empty() {
                    return Err("source.bulk_data_type cannot be empty".to_string());
                }

                if self.user_agent.trim().is_empty() {
                    return Err("source.user_agent cannot be empty".to_string());
                }

                if self.timeout_seconds == 0 || self.timeout_seconds > 600 {
                    return Err(format!(
                        "source.timeout_seconds must be between 1 and 600, got {}",
                        self.timeout_seconds
                    ));
                }

                if *environment == Environment::Production && !self.tls_verify {
                    return Err(
                        "TLS certificate verification cannot be disabled in production environments"
                            .to_string(),
                    );
                }
            }
            SourceKind::File => {
                if self
                    .file_path
                    .as_ref()
                    .map_or(true, |p| p.trim().is_empty())
                {
                    return Err("source.file_path is required when source.kind = 'file'".to_string());
                }
            }
        }
        Ok(())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Scryfall,
            base_url: default_base_url(),
            bulk_data_type: default_bulk_data_type(),
            user_agent: default_user_agent(),
            timeout_seconds: default_timeout_seconds(),
            tls_verify: true,
            file_path: None,
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Bound of each write queue
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Records between progress checkpoints
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,

    /// Truncation length for stored error messages
    #[serde(default = "default_max_error_message_length")]
    pub max_error_message_length: usize,

    /// Largest single dataset element accepted
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,

    /// Age after which an active run counts as abandoned
    #[serde(default = "default_stale_run_minutes")]
    pub stale_run_minutes: u64,
}

impl SyncConfig {
    fn validate(&self) -> Result<(), String> {
        if !(1..=10_000).contains(&self.batch_size) {
            return Err(format!(
                "sync.batch_size must be between 1 and 10000, got {}",
                self.batch_size
            ));
        }

        if self.checkpoint_interval == 0 {
            return Err("sync.checkpoint_interval must be > 0".to_string());
        }

        if !(100..=2000).contains(&self.max_error_message_length) {
            return Err(format!(
                "sync.max_error_message_length must be between 100 and 2000, got {}",
                self.max_error_message_length
            ));
        }

        if self.max_record_bytes < 1024 {
            return Err(format!(
                "sync.max_record_bytes must be at least 1024, got {}",
                self.max_record_bytes
            ));
        }

        if self.stale_run_minutes == 0 {
            return Err("sync.stale_run_minutes must be > 0".to_string());
        }

        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            checkpoint_interval: default_checkpoint_interval(),
            max_error_message_length: default_max_error_message_length(),
            max_record_bytes: default_max_record_bytes(),
            stale_run_minutes: default_stale_run_minutes(),
        }
    }
}

/// PostgreSQL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgreSQLConfig {
    pub connection_string: SecretString,

    #[serde(default = "default_pg_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_pg_connection_timeout_seconds")]
    pub connection_timeout_seconds: u64,

    #[serde(default = "default_pg_statement_timeout_seconds")]
    pub statement_timeout_seconds: u64,

    /// disable, prefer or require
    #[serde(default = "default_pg_ssl_mode")]
    pub ssl_mode: String,
}

impl PostgreSQLConfig {
    fn validate(&self) -> Result<(), String> {
        use secrecy::ExposeSecret;

        let conn_str = self.connection_string.expose_secret();

        if conn_str.is_empty() {
            return Err("postgresql.connection_string cannot be empty".to_string());
        }

        if !conn_str.starts_with("postgresql://") && !conn_str.starts_with("postgres://") {
            return Err(
                "postgresql.connection_string must start with postgresql:// or postgres://"
                    .to_string(),
            );
        }

        if self.max_connections == 0 || self.max_connections > 100 {
            return Err(format!(
                "postgresql.max_connections must be between 1 and 100, got {}",
                self.max_connections
            ));
        }

        let valid_ssl_modes = ["disable", "prefer", "require"];
        if !valid_ssl_modes.contains(&self.ssl_mode.as_str()) {
            return Err(format!(
                "postgresql.ssl_mode must be one of: {}, got '{}'",
                valid_ssl_modes.join(", "),
                self.ssl_mode
            ));
        }

        Ok(())
    }
}

/// Scheduled trigger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Hours between scheduled runs
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,

    /// Start a run immediately when the daemon starts
    #[serde(default)]
    pub run_on_start: bool,
}

impl ScheduleConfig {
    fn validate(&self) -> Result<(), String> {
        if self.interval_hours == 0 || self.interval_hours > 168 {
            return Err(format!(
                "schedule.interval_hours must be between 1 and 168, got {}",
                self.interval_hours
            ));
        }
        Ok(())
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_hours: default_interval_hours(),
            run_on_start: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write JSON logs to rolling files
    #[serde(default)]
    pub local_enabled: bool,

    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// daily, hourly or never
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "logging.local_rotation must be one of: {}, got '{}'",
                valid_rotations.join(", "),
                self.local_rotation
            ));
        }

        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local_enabled = true".to_string());
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://api.scryfall.com".to_string()
}

fn default_bulk_data_type() -> String {
    "oracle-cards".to_string()
}

fn default_user_agent() -> String {
    format!("cardsync/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_batch_size() -> usize {
    1000
}

fn default_checkpoint_interval() -> u64 {
    5000
}

fn default_max_error_message_length() -> usize {
    2000
}

fn default_max_record_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_stale_run_minutes() -> u64 {
    360
}

fn default_interval_hours() -> u64 {
    24
}

fn default_local_path() -> String {
    "/var/log/cardsync".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

fn default_pg_max_connections() -> usize {
    10
}

fn default_pg_connection_timeout_seconds() -> u64 {
    30
}

fn default_pg_statement_timeout_seconds() -> u64 {
    60
}

fn default_pg_ssl_mode() -> String {
    "prefer".to_string()
}
