//! In-memory storage

use crate::storage::{immediate_children, Storage, StorageResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// In-memory storage backend.
///
/// Thread-safe and deterministic; used by tests and embedded callers.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Whether nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }

    /// All physical keys currently stored
    pub async fn keys(&self) -> Vec<String> {
        self.data.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.data
            .write()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.data.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let data = self.data.read().await;
        Ok(immediate_children(data.keys(), prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let storage = MemoryStorage::new();

        storage.put("test/key", b"value").await.unwrap();
        assert_eq!(
            storage.get("test/key").await.unwrap(),
            Some(b"value".to_vec())
        );

        storage.delete("test/key").await.unwrap();
        assert!(storage.get("test/key").await.unwrap().is_none());

        // Deleting again is fine
        storage.delete("test/key").await.unwrap();
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_list() {
        let storage = MemoryStorage::new();

        storage.put("a/b/c", b"1").await.unwrap();
        storage.put("a/b/d", b"2").await.unwrap();
        storage.put("a/e", b"3").await.unwrap();
        storage.put("f", b"4").await.unwrap();

        assert_eq!(storage.list("").await.unwrap(), vec!["a/", "f"]);
        assert_eq!(storage.list("a/").await.unwrap(), vec!["b/", "e"]);
        assert_eq!(storage.list("a/b/").await.unwrap(), vec!["c", "d"]);
    }
}
