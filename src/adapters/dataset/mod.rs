//! Dataset providers
//!
//! This module provides the sources a run can pull the bulk dataset from.

pub mod factory;
pub mod file;
pub mod scryfall;
pub mod traits;

pub use factory::create_dataset_provider;
pub use file::FileDatasetProvider;
pub use scryfall::ScryfallClient;
pub use traits::{ByteStream, DatasetMetadata, DatasetProvider};
