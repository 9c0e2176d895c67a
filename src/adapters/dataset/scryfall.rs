//! Scryfall bulk-data client
//!
//! Fetches the metadata of a bulk dataset from `{base_url}/bulk-data/{type}`
//! and streams the file behind its `download_uri`.

use super::traits::{ByteStream, DatasetMetadata, DatasetProvider};
use crate::config::SourceConfig;
use crate::domain::{CardSyncError, ProviderError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::{Client, ClientBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Bulk-data object as returned by the Scryfall API
#[derive(Debug, Deserialize)]
struct BulkDataResponse {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    updated_at: DateTime<Utc>,
    download_uri: String,
    #[serde(default)]
    size: u64,
    #[serde(default = "default_content_type")]
    content_type: String,
}

fn default_content_type() -> String {
    "application/json".to_string()
}

impl From<BulkDataResponse> for DatasetMetadata {
    fn from(response: BulkDataResponse) -> Self {
        Self {
            id: response.id,
            kind: response.kind,
            updated_at: response.updated_at,
            download_uri: response.download_uri,
            size_bytes: response.size,
            content_type: response.content_type,
        }
    }
}

/// HTTP dataset provider backed by the Scryfall API
pub struct ScryfallClient {
    base_url: String,
    bulk_data_type: String,
    metadata_timeout: Duration,
    client: Client,
}

impl ScryfallClient {
    /// Creates a new client from the source configuration
    ///
    /// The metadata request is bounded by `timeout_seconds`; the download
    /// itself is only bounded at connect time since it runs for minutes.
    ///
    /// # Errors
    ///
    /// Returns [`CardSyncError::Configuration`] if the HTTP client cannot be built.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let mut client_builder = ClientBuilder::new()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(Duration::from_secs(30));

        if !config.tls_verify {
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder.build().map_err(|e| {
            CardSyncError::Configuration(format!("Failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bulk_data_type: config.bulk_data_type.clone(),
            metadata_timeout: Duration::from_secs(config.timeout_seconds),
            client,
        })
    }

    fn metadata_url(&self) -> String {
        format!("{}/bulk-data/{}", self.base_url, self.bulk_data_type)
    }

    fn send_error(e: reqwest::Error) -> CardSyncError {
        if e.is_timeout() {
            CardSyncError::Provider(ProviderError::Timeout(e.to_string()))
        } else {
            CardSyncError::Provider(ProviderError::ConnectionFailed(e.to_string()))
        }
    }

    /// Maps a non-success status to a provider error
    async fn check_status(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = match status {
            StatusCode::NOT_FOUND => ProviderError::DatasetNotFound(format!("{what}: {body}")),
            s if s.is_server_error() => ProviderError::ServerError {
                status: s.as_u16(),
                message: body,
            },
            s => ProviderError::ClientError {
                status: s.as_u16(),
                message: body,
            },
        };
        Err(CardSyncError::Provider(error))
    }
}

#[async_trait]
impl DatasetProvider for ScryfallClient {
    async fn dataset_metadata(&self) -> Result<DatasetMetadata> {
        let url = self.metadata_url();
        tracing::debug!(url = %url, "Fetching bulk data metadata");

        let response = self
            .client
            .get(&url)
            .timeout(self.metadata_timeout)
            .send()
            .await
            .map_err(Self::send_error)?;

        let response = Self::check_status(response, &self.bulk_data_type).await?;

        let bulk: BulkDataResponse = response.json().await.map_err(|e| {
            CardSyncError::Provider(ProviderError::InvalidResponse(e.to_string()))
        })?;

        url::Url::parse(&bulk.download_uri).map_err(|e| {
            CardSyncError::Provider(ProviderError::InvalidResponse(format!(
                "download_uri '{}' is not a valid URL: {e}",
                bulk.download_uri
            )))
        })?;

        Ok(bulk.into())
    }

    async fn open_dataset(&self, download_uri: &str) -> Result<ByteStream> {
        tracing::debug!(uri = %download_uri, "Opening dataset download");

        let response = self
            .client
            .get(download_uri)
            .send()
            .await
            .map_err(Self::send_error)?;

        let response = Self::check_status(response, download_uri).await?;

        let stream = response.bytes_stream().map(|chunk| {
            chunk.map(|bytes| bytes.to_vec()).map_err(|e| {
                CardSyncError::Provider(ProviderError::StreamInterrupted(e.to_string()))
            })
        });

        Ok(stream.boxed())
    }

    fn name(&self) -> &str {
        "scryfall"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn source_for(server: &mockito::Server) -> SourceConfig {
        SourceConfig {
            base_url: server.url(),
            ..SourceConfig::default()
        }
    }

    fn metadata_body(download_uri: &str) -> String {
        serde_json::json!({
            "object": "bulk_data",
            "id": "27bf3214-1271-490b-bdfe-c0be6c23d02e",
            "type": "oracle_cards",
            "updated_at": "2025-03-14T09:02:31.223+00:00",
            "uri": "https://api.scryfall.com/bulk-data/27bf3214-1271-490b-bdfe-c0be6c23d02e",
            "name": "Oracle Cards",
            "size": 161_024_512,
            "download_uri": download_uri,
            "content_type": "application/json",
            "content_encoding": "gzip"
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_dataset_metadata_parses_bulk_object() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/bulk-data/oracle-cards")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(metadata_body("https://data.example.com/oracle-cards.json"))
            .create_async()
            .await;

        let client = ScryfallClient::new(&source_for(&server)).unwrap();
        let metadata = client.dataset_metadata().await.unwrap();

        mock.assert_async().await;
        assert_eq!(metadata.kind, "oracle_cards");
        assert_eq!(metadata.size_bytes, 161_024_512);
        assert_eq!(
            metadata.download_uri,
            "https://data.example.com/oracle-cards.json"
        );
    }

    #[tokio::test]
    async fn test_dataset_metadata_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/bulk-data/oracle-cards")
            .with_status(404)
            .with_body(r#"{"object":"error","status":404}"#)
            .create_async()
            .await;

        let client = ScryfallClient::new(&source_for(&server)).unwrap();
        let err = client.dataset_metadata().await.unwrap_err();

        assert!(matches!(
            err,
            CardSyncError::Provider(ProviderError::DatasetNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_dataset_metadata_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/bulk-data/oracle-cards")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let client = ScryfallClient::new(&source_for(&server)).unwrap();
        let err = client.dataset_metadata().await.unwrap_err();

        assert!(matches!(
            err,
            CardSyncError::Provider(ProviderError::ServerError { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_dataset_metadata_rejects_bad_download_uri() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/bulk-data/oracle-cards")
            .with_status(200)
            .with_body(metadata_body("not a url"))
            .create_async()
            .await;

        let client = ScryfallClient::new(&source_for(&server)).unwrap();
        let err = client.dataset_metadata().await.unwrap_err();

        assert!(matches!(
            err,
            CardSyncError::Provider(ProviderError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_open_dataset_streams_body() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"[{"name":"Static Orb"}]"#;
        let _mock = server
            .mock("GET", "/files/oracle-cards.json")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let client = ScryfallClient::new(&source_for(&server)).unwrap();
        let uri = format!("{}/files/oracle-cards.json", server.url());
        let chunks: Vec<Vec<u8>> = client
            .open_dataset(&uri)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(chunks.concat(), body.as_bytes());
    }

    #[test]
    fn test_metadata_url_trims_trailing_slash() {
        let config = SourceConfig {
            base_url: "https://api.scryfall.com/".to_string(),
            ..SourceConfig::default()
        };
        let client = ScryfallClient::new(&config).unwrap();
        assert_eq!(
            client.metadata_url(),
            "https://api.scryfall.com/bulk-data/oracle-cards"
        );
    }
}
