//! Local file dataset provider
//!
//! Serves a previously downloaded bulk file. Used for offline runs and for
//! replaying a known dataset.

use super::traits::{ByteStream, DatasetMetadata, DatasetProvider};
use crate::domain::{CardSyncError, ProviderError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

/// Default read size for file chunks
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Dataset provider reading a JSON file from disk
pub struct FileDatasetProvider {
    path: PathBuf,
    chunk_size: usize,
}

impl FileDatasetProvider {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_chunk_size(path, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(path: impl AsRef<Path>, chunk_size: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn not_found(path: &Path, e: std::io::Error) -> CardSyncError {
    if e.kind() == std::io::ErrorKind::NotFound {
        CardSyncError::Provider(ProviderError::DatasetNotFound(path.display().to_string()))
    } else {
        CardSyncError::Io(format!("{}: {e}", path.display()))
    }
}

#[async_trait]
impl DatasetProvider for FileDatasetProvider {
    async fn dataset_metadata(&self) -> Result<DatasetMetadata> {
        let meta = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| not_found(&self.path, e))?;

        if !meta.is_file() {
            return Err(CardSyncError::Provider(ProviderError::DatasetNotFound(
                format!("{} is not a regular file", self.path.display()),
            )));
        }

        let updated_at: DateTime<Utc> = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let id = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string());

        Ok(DatasetMetadata {
            id,
            kind: "file".to_string(),
            updated_at,
            download_uri: self.path.display().to_string(),
            size_bytes: meta.len(),
            content_type: "application/json".to_string(),
        })
    }

    async fn open_dataset(&self, download_uri: &str) -> Result<ByteStream> {
        let path = PathBuf::from(download_uri);
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| not_found(&path, e))?;
        let chunk_size = self.chunk_size;

        let stream = futures::stream::try_unfold(file, move |mut file| async move {
            let mut buf = vec![0u8; chunk_size];
            let n = file.read(&mut buf).await.map_err(|e| {
                CardSyncError::Provider(ProviderError::StreamInterrupted(e.to_string()))
            })?;
            if n == 0 {
                return Ok::<_, CardSyncError>(None);
            }
            buf.truncate(n);
            Ok(Some((buf, file)))
        });

        Ok(stream.boxed())
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_metadata_reports_size() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[]").unwrap();

        let provider = FileDatasetProvider::new(file.path());
        let metadata = provider.dataset_metadata().await.unwrap();

        assert_eq!(metadata.size_bytes, 2);
        assert_eq!(metadata.download_uri, file.path().display().to_string());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let provider = FileDatasetProvider::new("/nonexistent/oracle-cards.json");
        let err = provider.dataset_metadata().await.unwrap_err();

        assert!(matches!(
            err,
            CardSyncError::Provider(ProviderError::DatasetNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stream_yields_small_chunks() {
        let mut file = NamedTempFile::new().unwrap();
        let body = br#"[{"name":"Llanowar Elves"},{"name":"Static Orb"}]"#;
        file.write_all(body).unwrap();

        let provider = FileDatasetProvider::with_chunk_size(file.path(), 7);
        let uri = file.path().display().to_string();
        let chunks: Vec<Vec<u8>> = provider
            .open_dataset(&uri)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert!(chunks.iter().all(|c| c.len() <= 7));
        assert_eq!(chunks.concat(), body.to_vec());
    }
}
