//! Dataset provider abstraction
//!
//! A provider describes the current bulk dataset and hands out its bytes as a
//! stream. The pipeline reads the stream sequentially and never asks twice.

use crate::domain::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Sequential byte chunks of a dataset download
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// Metadata describing the published dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Source identifier of the dataset
    pub id: String,

    /// Dataset kind (e.g. `oracle_cards`)
    pub kind: String,

    /// When the source last regenerated the dataset
    pub updated_at: DateTime<Utc>,

    /// Where the dataset bytes can be fetched from
    pub download_uri: String,

    /// Reported size in bytes
    pub size_bytes: u64,

    /// Reported content type
    pub content_type: String,
}

/// Dataset provider trait
///
/// Implemented by the Scryfall HTTP client and the local file provider.
#[async_trait]
pub trait DatasetProvider: Send + Sync {
    /// Fetch the metadata of the current dataset
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be fetched or parsed.
    async fn dataset_metadata(&self) -> Result<DatasetMetadata>;

    /// Open the dataset for sequential reading
    ///
    /// # Arguments
    ///
    /// * `download_uri` - Location taken from [`DatasetMetadata::download_uri`]
    ///
    /// # Errors
    ///
    /// Returns an error if the download cannot be started. Errors while
    /// reading surface as items of the returned stream.
    async fn open_dataset(&self, download_uri: &str) -> Result<ByteStream>;

    /// Short provider name for logging
    fn name(&self) -> &str;
}
