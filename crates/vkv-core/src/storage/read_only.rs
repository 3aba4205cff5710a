//! Read-only storage view

use crate::error::StorageError;
use crate::storage::{Storage, StorageResult};
use async_trait::async_trait;
use tracing::debug;

/// Passes reads through and refuses every mutation with [`StorageError::ReadOnly`].
#[derive(Debug)]
pub struct ReadOnlyStorage<S> {
    inner: S,
}

impl<S: Storage> ReadOnlyStorage<S> {
    /// Wrap `inner` so that writes fail
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Unwrap the underlying storage
    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S: Storage> Storage for ReadOnlyStorage<S> {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, _value: &[u8]) -> StorageResult<()> {
        debug!(key = %key, "Rejected write to read-only storage");
        Err(StorageError::ReadOnly)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        debug!(key = %key, "Rejected delete on read-only storage");
        Err(StorageError::ReadOnly)
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_reads_pass_writes_fail() {
        let inner = Arc::new(MemoryStorage::new());
        inner.put("k", b"v").await.unwrap();

        let storage = ReadOnlyStorage::new(inner.clone());
        assert_eq!(storage.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(storage.list("").await.unwrap(), vec!["k"]);

        assert!(storage.put("k", b"x").await.unwrap_err().is_read_only());
        assert!(storage.delete("k").await.unwrap_err().is_read_only());
        assert_eq!(inner.get("k").await.unwrap(), Some(b"v".to_vec()));
    }
}
