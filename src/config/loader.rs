//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{CardSyncConfig, DatabaseTarget, SourceKind};
use super::secret::secret_string;
use crate::domain::errors::CardSyncError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (`${VAR}` syntax)
/// 3. Parses the TOML into [`CardSyncConfig`]
/// 4. Applies environment variable overrides (`CARDSYNC_*` prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`CardSyncError::Configuration`] if the file is missing or
/// unreadable, a referenced variable is unset, parsing fails, an override
/// cannot be parsed, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use cardsync::config::load_config;
///
/// let config = load_config("cardsync.toml")?;
/// println!("batch size: {}", config.sync.batch_size);
/// # Ok::<(), cardsync::domain::CardSyncError>(())
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<CardSyncConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(CardSyncError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        CardSyncError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_from_str(&contents)
}

/// Same as [`load_config`] for configuration text already in memory
///
/// # Errors
///
/// See [`load_config`].
pub fn load_config_from_str(contents: &str) -> Result<CardSyncConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: CardSyncConfig = toml::from_str(&contents)
        .map_err(|e| CardSyncError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        CardSyncError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format `${VAR_NAME}`
///
/// Comment lines are passed through untouched.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| CardSyncError::Configuration(format!("Invalid placeholder pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let processed = re.replace_all(line, |caps: &regex::Captures<'_>| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        result.push_str(&processed);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(CardSyncError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Reads and parses an override variable, `None` when it is unset
fn env_override<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            CardSyncError::Configuration(format!("Invalid value '{raw}' for {name}: {e}"))
        }),
        Err(_) => Ok(None),
    }
}

/// Applies environment variable overrides using the `CARDSYNC_*` prefix
///
/// Variables follow the pattern `CARDSYNC_<SECTION>_<KEY>`, for example
/// `CARDSYNC_SYNC_BATCH_SIZE` or `CARDSYNC_SOURCE_FILE_PATH`.
fn apply_env_overrides(config: &mut CardSyncConfig) -> Result<()> {
    // Application overrides
    if let Some(val) = env_override::<String>("CARDSYNC_APPLICATION_LOG_LEVEL")? {
        config.application.log_level = val;
    }
    if let Some(val) = env_override("CARDSYNC_APPLICATION_DRY_RUN")? {
        config.application.dry_run = val;
    }

    // Source overrides
    if let Some(val) = env_override::<String>("CARDSYNC_SOURCE_KIND")? {
        config.source.kind = match val.to_lowercase().as_str() {
            "scryfall" => SourceKind::Scryfall,
            "file" => SourceKind::File,
            other => {
                return Err(CardSyncError::Configuration(format!(
                    "Invalid value '{other}' for CARDSYNC_SOURCE_KIND: expected scryfall or file"
                )))
            }
        };
    }
    if let Some(val) = env_override("CARDSYNC_SOURCE_BASE_URL")? {
        config.source.base_url = val;
    }
    if let Some(val) = env_override("CARDSYNC_SOURCE_BULK_DATA_TYPE")? {
        config.source.bulk_data_type = val;
    }
    if let Some(val) = env_override("CARDSYNC_SOURCE_USER_AGENT")? {
        config.source.user_agent = val;
    }
    if let Some(val) = env_override("CARDSYNC_SOURCE_TLS_VERIFY")? {
        config.source.tls_verify = val;
    }
    if let Some(val) = env_override::<String>("CARDSYNC_SOURCE_FILE_PATH")? {
        config.source.file_path = Some(val);
    }

    // Sync overrides
    if let Some(val) = env_override("CARDSYNC_SYNC_BATCH_SIZE")? {
        config.sync.batch_size = val;
    }
    if let Some(val) = env_override("CARDSYNC_SYNC_CHECKPOINT_INTERVAL")? {
        config.sync.checkpoint_interval = val;
    }
    if let Some(val) = env_override("CARDSYNC_SYNC_STALE_RUN_MINUTES")? {
        config.sync.stale_run_minutes = val;
    }

    if let Some(val) = env_override::<String>("CARDSYNC_DATABASE_TARGET")? {
        config.database_target = match val.to_lowercase().as_str() {
            "postgresql" => DatabaseTarget::PostgreSQL,
            "memory" => DatabaseTarget::Memory,
            other => {
                return Err(CardSyncError::Configuration(format!(
                    "Invalid value '{other}' for CARDSYNC_DATABASE_TARGET: expected postgresql or memory"
                )))
            }
        };
    }

    // PostgreSQL overrides (only if PostgreSQL is configured)
    if let Some(ref mut pg_config) = config.postgresql {
        if let Some(val) = env_override("CARDSYNC_POSTGRESQL_CONNECTION_STRING")? {
            pg_config.connection_string = secret_string(val);
        }
        if let Some(val) = env_override("CARDSYNC_POSTGRESQL_MAX_CONNECTIONS")? {
            pg_config.max_connections = val;
        }
    }

    // Schedule overrides
    if let Some(val) = env_override("CARDSYNC_SCHEDULE_INTERVAL_HOURS")? {
        config.schedule.interval_hours = val;
    }

    // Logging overrides
    if let Some(val) = env_override("CARDSYNC_LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = val;
    }
    if let Some(val) = env_override("CARDSYNC_LOGGING_LOCAL_PATH")? {
        config.logging.local_path = val;
    }

    Ok(())
}
