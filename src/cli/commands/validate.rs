//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the cardsync configuration file.

use crate::config::load_config;
use crate::config::schema::{DatabaseTarget, SourceKind};
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // Loading also validates
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Environment: {:?}", config.environment);
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);

        match config.source.kind {
            SourceKind::Scryfall => {
                println!("  Source: Scryfall API ({})", config.source.base_url);
                println!("  Bulk Data Type: {}", config.source.bulk_data_type);
            }
            SourceKind::File => {
                println!(
                    "  Source: local file ({})",
                    config.source.file_path.as_deref().unwrap_or("-")
                );
            }
        }

        match config.database_target {
            DatabaseTarget::PostgreSQL => {
                if let Some(ref pg_config) = config.postgresql {
                    use secrecy::ExposeSecret;
                    println!("  Database Target: PostgreSQL");
                    println!(
                        "  PostgreSQL Host: {}",
                        pg_config
                            .connection_string
                            .expose_secret()
                            .as_str()
                            .rsplit_once('@')
                            .map(|(_, host)| host)
                            .unwrap_or("***")
                    );
                    println!("  Max Connections: {}", pg_config.max_connections);
                    println!("  SSL Mode: {}", pg_config.ssl_mode);
                }
            }
            DatabaseTarget::Memory => {
                println!("  Database Target: in-memory (nothing is kept after exit)");
            }
        }

        println!("  Batch Size: {}", config.sync.batch_size);
        println!("  Checkpoint Interval: {}", config.sync.checkpoint_interval);
        println!("  Schedule: every {}h", config.schedule.interval_hours);
        println!();
        Ok(0)
    }
}
