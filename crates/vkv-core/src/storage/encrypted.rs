//! Transparent at-rest encryption over any [`Storage`]

use crate::crypto::KeyEncryptor;
use crate::storage::{Storage, StorageResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Storage that encrypts every value and, optionally, every key segment.
///
/// All keys are placed below `prefix` in the inner storage. Callers only
/// ever see logical keys and plaintext; a value that fails to decrypt is
/// reported as [`StorageError::Decryption`](crate::error::StorageError::Decryption),
/// never as absent.
#[derive(Clone)]
pub struct EncryptedStorage {
    inner: Arc<dyn Storage>,
    encryptor: Arc<KeyEncryptor>,
    prefix: String,
    obfuscate_names: bool,
}

impl EncryptedStorage {
    /// Wrap `inner`, storing everything below `prefix`
    pub fn new(
        inner: Arc<dyn Storage>,
        encryptor: Arc<KeyEncryptor>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            encryptor,
            prefix: prefix.into(),
            obfuscate_names: false,
        }
    }

    /// Also encrypt key names (each `/`-separated segment)
    pub fn with_obfuscated_names(mut self) -> Self {
        self.obfuscate_names = true;
        self
    }

    /// Physical key in the inner storage for a logical key
    pub fn physical_key(&self, key: &str) -> StorageResult<String> {
        let name = if self.obfuscate_names {
            self.encryptor.obfuscate_path(key)?
        } else {
            key.to_string()
        };
        Ok(format!("{}{}", self.prefix, name))
    }
}

#[async_trait]
impl Storage for EncryptedStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let physical = self.physical_key(key)?;
        match self.inner.get(&physical).await? {
            Some(blob) => Ok(Some(self.encryptor.open(&physical, &blob)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let physical = self.physical_key(key)?;
        let blob = self.encryptor.seal(&physical, value)?;
        self.inner.put(&physical, &blob).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let physical = self.physical_key(key)?;
        self.inner.delete(&physical).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        // Listing always addresses a directory
        let dir = if prefix.is_empty() || prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{}/", prefix)
        };

        let physical = self.physical_key(&dir)?;
        let children = self.inner.list(&physical).await?;

        if !self.obfuscate_names {
            return Ok(children);
        }

        let mut names = children
            .iter()
            .map(|child| match child.strip_suffix('/') {
                Some(dir_name) => self.encryptor.reveal_name(dir_name).map(|n| format!("{}/", n)),
                None => self.encryptor.reveal_name(child),
            })
            .collect::<StorageResult<Vec<_>>>()?;
        names.sort();
        names.dedup();

        debug!(prefix = %prefix, count = names.len(), "Listed encrypted keys");
        Ok(names)
    }
}

impl std::fmt::Debug for EncryptedStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedStorage")
            .field("prefix", &self.prefix)
            .field("obfuscate_names", &self.obfuscate_names)
            .finish_non_exhaustive()
    }
}
