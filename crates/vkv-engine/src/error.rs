//! Error types for vkv-engine

use thiserror::Error;
use vkv_core::StorageError;

/// Result type alias using vkv-engine's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Hard faults raised by the engine.
///
/// Invalid caller input is not an error: it is reported through
/// [`Response::error`](crate::Response::error).
#[derive(Error, Debug)]
pub enum Error {
    /// Core failure (configuration, key material, storage)
    #[error(transparent)]
    Core(#[from] vkv_core::Error),

    /// Persisted state that cannot be decoded or is inconsistent
    #[error("corrupt record for {key}: {message}")]
    Corrupt { key: String, message: String },

    /// Serialization failure while persisting
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Self::Core(vkv_core::Error::Storage(err))
    }
}

impl Error {
    /// Create a corrupt record error
    pub fn corrupt(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Whether the error is the storage read-only condition
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_read_only())
    }

    /// The underlying storage error, if any
    pub fn storage_error(&self) -> Option<&StorageError> {
        match self {
            Self::Core(vkv_core::Error::Storage(e)) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_keep_their_kind() {
        let err = Error::from(StorageError::ReadOnly);
        assert!(err.is_read_only());

        let err = Error::from(StorageError::decryption("k", "bad tag"));
        assert!(!err.is_read_only());
        assert!(matches!(
            err.storage_error(),
            Some(StorageError::Decryption { .. })
        ));

        assert!(Error::corrupt("k", "truncated").storage_error().is_none());
    }
}
