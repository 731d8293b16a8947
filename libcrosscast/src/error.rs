//! Error types for Crosscast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrosscastError>;

#[derive(Error, Debug)]
pub enum CrosscastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Import failed: {0}")]
    Import(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CrosscastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CrosscastError::InvalidInput(_)
            | CrosscastError::Validation(_)
            | CrosscastError::Import(_) => 3,
            CrosscastError::Platform(PlatformError::Authentication(_)) => 2,
            CrosscastError::Platform(_) => 1,
            CrosscastError::Media(_) => 1,
            CrosscastError::Config(_) => 2,
            CrosscastError::Storage(_) => 2,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Failures of the durable key-value store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database operation failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Media upload failed: {0}")]
    Upload(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    /// Structured error reported by the platform itself (as opposed to transport failures)
    #[error("{step} rejected by platform (code {code}): {message}")]
    Api {
        step: String,
        code: i64,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Platform not configured: {0}")]
    NotConfigured(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediaError {
    #[error("Unsupported media type '{0}': only images can be attached")]
    UnsupportedType(String),

    #[error("File is {size} bytes; the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("Could not decode image: {0}")]
    Decode(String),

    #[error("Could not encode image: {0}")]
    Encode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_validation() {
        let error = CrosscastError::Validation("No content to post".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_import() {
        let error = CrosscastError::Import("missing key: tumblr".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_authentication_error() {
        let error = CrosscastError::Platform(PlatformError::Authentication(
            "bad app password".to_string(),
        ));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_other_platform_errors() {
        let posting = CrosscastError::Platform(PlatformError::Posting("x".to_string()));
        let network = CrosscastError::Platform(PlatformError::Network("x".to_string()));
        let api = CrosscastError::Platform(PlatformError::Api {
            step: "publish".to_string(),
            code: 100,
            message: "x".to_string(),
        });
        assert_eq!(posting.exit_code(), 1);
        assert_eq!(network.exit_code(), 1);
        assert_eq!(api.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_storage_error() {
        let error = CrosscastError::Storage(StorageError::Unavailable("disk full".to_string()));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_error_message_formatting_validation() {
        let error = CrosscastError::Validation("Please enter some content".to_string());
        assert_eq!(error.to_string(), "Validation failed: Please enter some content");
    }

    #[test]
    fn test_api_error_formatting_is_distinct_from_network() {
        let api = PlatformError::Api {
            step: "Instagram publish".to_string(),
            code: 9007,
            message: "Media ID is not available".to_string(),
        };
        let network = PlatformError::Network("connection reset".to_string());

        assert_eq!(
            api.to_string(),
            "Instagram publish rejected by platform (code 9007): Media ID is not available"
        );
        assert!(network.to_string().starts_with("Network error"));
    }

    #[test]
    fn test_media_error_too_large_formatting() {
        let error = MediaError::TooLarge {
            size: 6_000_000,
            limit: 5_242_880,
        };
        assert_eq!(
            error.to_string(),
            "File is 6000000 bytes; the limit is 5242880 bytes"
        );
    }

    #[test]
    fn test_error_conversion_from_platform_error() {
        let platform_error = PlatformError::Upload("blob rejected".to_string());
        let error: CrosscastError = platform_error.into();

        match error {
            CrosscastError::Platform(PlatformError::Upload(msg)) => {
                assert_eq!(msg, "blob rejected");
            }
            _ => panic!("Expected CrosscastError::Platform"),
        }
    }

    #[test]
    fn test_storage_serialization_error_names_key() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = StorageError::Serialization {
            key: "scheduled".to_string(),
            source,
        };
        assert!(error.to_string().contains("'scheduled'"));
    }
}
