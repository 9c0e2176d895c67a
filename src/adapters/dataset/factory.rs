//! Dataset provider factory

use super::file::FileDatasetProvider;
use super::scryfall::ScryfallClient;
use super::traits::DatasetProvider;
use crate::config::{SourceConfig, SourceKind};
use crate::domain::{CardSyncError, Result};
use std::sync::Arc;

/// Creates the dataset provider selected by `source.kind`
///
/// # Errors
///
/// Returns an error if the provider cannot be constructed.
pub fn create_dataset_provider(config: &SourceConfig) -> Result<Arc<dyn DatasetProvider>> {
    match config.kind {
        SourceKind::Scryfall => {
            tracing::info!(
                base_url = %config.base_url,
                bulk_data_type = %config.bulk_data_type,
                "Using Scryfall dataset provider"
            );
            Ok(Arc::new(ScryfallClient::new(config)?))
        }
        SourceKind::File => {
            let path = config.file_path.as_deref().ok_or_else(|| {
                CardSyncError::Configuration(
                    "source.file_path is required when source.kind = 'file'".to_string(),
                )
            })?;
            tracing::info!(path = %path, "Using local file dataset provider");
            Ok(Arc::new(FileDatasetProvider::new(path)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_kind_without_path_fails() {
        let config = SourceConfig {
            kind: SourceKind::File,
            ..SourceConfig::default()
        };
        assert!(create_dataset_provider(&config).is_err());
    }

    #[test]
    fn test_provider_names() {
        let scryfall = create_dataset_provider(&SourceConfig::default()).unwrap();
        assert_eq!(scryfall.name(), "scryfall");

        let file = create_dataset_provider(&SourceConfig {
            kind: SourceKind::File,
            file_path: Some("/tmp/oracle-cards.json".to_string()),
            ..SourceConfig::default()
        })
        .unwrap();
        assert_eq!(file.name(), "file");
    }
}
