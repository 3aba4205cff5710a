//! Raw persistent storage
//!
//! Every layer above talks to a [`Storage`]: a flat namespace of string keys
//! holding opaque bytes, with `/` acting as the path separator for `list`.
//! Implementations provided here:
//! - [`MemoryStorage`] for tests and embedded use
//! - [`FileStorage`] for a directory on local disk
//! - [`ReadOnlyStorage`] to refuse writes (standby / pre-setup windows)
//! - [`EncryptedStorage`] to encrypt values and optionally obfuscate names

mod encrypted;
mod file;
mod memory;
mod read_only;

pub use encrypted::EncryptedStorage;
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use read_only::ReadOnlyStorage;

use crate::error::StorageError;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Key-value storage over byte values.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    /// Get the value stored at `key`, `None` if absent
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Store `value` at `key`, replacing any previous value
    async fn put(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Delete `key`. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// List the immediate children below `prefix`.
    ///
    /// Results are sorted and de-duplicated. Children that have descendants
    /// are reported with a trailing `/`.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

#[async_trait]
impl<S: Storage + ?Sized> Storage for Arc<S> {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        (**self).put(key, value).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        (**self).delete(key).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        (**self).list(prefix).await
    }
}

/// Collapse full keys into the immediate children of `prefix`.
pub(crate) fn immediate_children<'a, I>(keys: I, prefix: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut children = BTreeSet::new();

    for key in keys {
        if let Some(relative) = key.strip_prefix(prefix) {
            if let Some(slash_pos) = relative.find('/') {
                children.insert(format!("{}/", &relative[..slash_pos]));
            } else if !relative.is_empty() {
                children.insert(relative.to_string());
            }
        }
    }

    children.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_children() {
        let keys: Vec<String> = ["a/b/c", "a/b/d", "a/e", "f"]
            .iter()
            .map(|k| k.to_string())
            .collect();

        assert_eq!(immediate_children(&keys, ""), vec!["a/", "f"]);
        assert_eq!(immediate_children(&keys, "a/"), vec!["b/", "e"]);
        assert_eq!(immediate_children(&keys, "a/b/"), vec!["c", "d"]);
        assert!(immediate_children(&keys, "z/").is_empty());
    }

    #[tokio::test]
    async fn test_arc_storage_delegates() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        storage.put("k", b"v").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), Some(b"v".to_vec()));
    }
}
