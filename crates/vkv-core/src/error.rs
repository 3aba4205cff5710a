//! Error types for vkv-core

use thiserror::Error;

/// Result type alias using vkv-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by a [`Storage`](crate::storage::Storage) implementation.
///
/// Decryption failures are kept apart from "absent" so that rotated or
/// corrupted key material surfaces instead of looking like missing data.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The underlying storage failed
    #[error("storage failure: {message}")]
    Backend { message: String },

    /// The storage currently refuses writes
    #[error("cannot write to readonly storage")]
    ReadOnly,

    /// Stored bytes could not be decrypted with the current key material
    #[error("failed to decrypt {key}: {message}")]
    Decryption { key: String, message: String },

    /// Key rejected before reaching the storage
    #[error("invalid storage key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Create a backend failure
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Create a decryption failure for a physical key
    pub fn decryption(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decryption {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an invalid key error
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is the read-only condition
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::ReadOnly)
    }
}

/// Core error types for vkv
#[derive(Error, Debug)]
pub enum Error {
    /// Storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration value
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Invalid key material
    #[error("Invalid key material: {message}")]
    InvalidKey { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid key material error
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Whether the error is the storage read-only condition
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_read_only())
    }
}
