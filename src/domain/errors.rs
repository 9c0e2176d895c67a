//! Domain error types
//!
//! This module defines the error hierarchy for cardsync.
//! All errors are domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main cardsync error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum CardSyncError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Dataset provider errors (metadata fetch, download stream)
    #[error("Dataset provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Dataset stream decoding errors (the container, not a single record)
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(String),

    /// A synchronization run is already active
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Run state management errors
    #[error("State management error: {0}")]
    State(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl CardSyncError {
    /// Whether this error is the single-flight guard rejecting a run
    pub fn is_conflict(&self) -> bool {
        matches!(self, CardSyncError::Conflict(_))
    }

    /// Whether this error came from reaching an external system
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            CardSyncError::Provider(ProviderError::ConnectionFailed(_))
                | CardSyncError::Provider(ProviderError::Timeout(_))
                | CardSyncError::Database(_)
        )
    }
}

/// Dataset provider errors
///
/// Errors that occur when talking to the bulk data API or reading the
/// downloaded dataset. These don't expose the HTTP client's types.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Failed to connect to the provider
    #[error("Failed to connect to dataset provider: {0}")]
    ConnectionFailed(String),

    /// Invalid response from the provider
    #[error("Invalid response from dataset provider: {0}")]
    InvalidResponse(String),

    /// Requested dataset does not exist
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    /// Server error (5xx)
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Client error (4xx)
    #[error("Client error: {status} - {message}")]
    ClientError { status: u16, message: String },

    /// Timeout
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// The byte stream broke off while reading
    #[error("Dataset stream interrupted: {0}")]
    StreamInterrupted(String),
}

/// Errors in the structure of the dataset container
///
/// These are fatal for a run: once the container is broken there is no
/// reliable way to find the next record boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The stream does not start with a JSON array
    #[error("Expected '[' at byte {offset}, found {found}")]
    NotAnArray { offset: u64, found: String },

    /// Unexpected byte between elements
    #[error("Expected ',' or ']' at byte {offset}, found {found}")]
    UnexpectedToken { offset: u64, found: String },

    /// A comma directly followed by the closing bracket
    #[error("Trailing comma before ']' at byte {offset}")]
    TrailingComma { offset: u64 },

    /// Non-whitespace after the closing bracket
    #[error("Unexpected data after end of array at byte {offset}")]
    TrailingData { offset: u64 },

    /// The stream ended before the array was closed
    #[error("Stream ended inside the array after {elements} element(s)")]
    UnexpectedEof { elements: u64 },

    /// A single element exceeded the configured size bound
    #[error("Element {index} exceeds the maximum record size of {limit} bytes")]
    RecordTooLarge { index: u64, limit: usize },
}

// Conversion from std::io::Error
impl From<std::io::Error> for CardSyncError {
    fn from(err: std::io::Error) -> Self {
        CardSyncError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for CardSyncError {
    fn from(err: serde_json::Error) -> Self {
        CardSyncError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for CardSyncError {
    fn from(err: toml::de::Error) -> Self {
        CardSyncError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CardSyncError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_provider_error_conversion() {
        let provider_err = ProviderError::ConnectionFailed("Network error".to_string());
        let err: CardSyncError = provider_err.into();
        assert!(matches!(err, CardSyncError::Provider(_)));
        assert!(err.is_connection());
    }

    #[test]
    fn test_decode_error_conversion() {
        let decode_err = DecodeError::UnexpectedEof { elements: 3 };
        let err: CardSyncError = decode_err.into();
        assert!(matches!(err, CardSyncError::Decode(_)));
        assert!(err.to_string().contains("3 element(s)"));
    }

    #[test]
    fn test_conflict_detection() {
        let err = CardSyncError::Conflict("A synchronization run is already active".to_string());
        assert!(err.is_conflict());
        assert!(!err.is_connection());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: CardSyncError = io_err.into();
        assert!(matches!(err, CardSyncError::Io(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: CardSyncError = json_err.into();
        assert!(matches!(err, CardSyncError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: CardSyncError = toml_err.into();
        assert!(matches!(err, CardSyncError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_errors_implement_std_error() {
        let err = CardSyncError::Validation("Test error".to_string());
        let _: &dyn std::error::Error = &err;

        let err = ProviderError::Timeout("30s".to_string());
        let _: &dyn std::error::Error = &err;
    }
}
