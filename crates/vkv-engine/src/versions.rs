//! Version payload store
//!
//! Payloads live below `versions/` under `<hash(key)>/<version>`, where the
//! hash is keyed by the backend so logical names never appear in raw storage.

use crate::error::Result;
use std::sync::Arc;
use vkv_core::{EncryptedStorage, KeyEncryptor, Storage};

/// Namespace of version payloads in raw storage
pub const VERSIONS_PREFIX: &str = "versions/";

#[derive(Debug, Clone)]
pub struct VersionStore {
    storage: EncryptedStorage,
    encryptor: Arc<KeyEncryptor>,
}

impl VersionStore {
    pub fn new(raw: Arc<dyn Storage>, encryptor: Arc<KeyEncryptor>) -> Self {
        Self {
            storage: EncryptedStorage::new(raw, encryptor.clone(), VERSIONS_PREFIX),
            encryptor,
        }
    }

    /// Storage key of the payload for `version` of `key`
    pub fn version_key(&self, key: &str, version: u64) -> String {
        format!("{}/{}", self.encryptor.hash_id(key), version)
    }

    pub async fn get(&self, key: &str, version: u64) -> Result<Option<Vec<u8>>> {
        Ok(self.storage.get(&self.version_key(key, version)).await?)
    }

    pub async fn put(&self, key: &str, version: u64, data: &[u8]) -> Result<()> {
        self.storage
            .put(&self.version_key(key, version), data)
            .await?;
        Ok(())
    }

    /// Remove a payload. Deleting a missing payload succeeds.
    pub async fn delete(&self, key: &str, version: u64) -> Result<()> {
        self.storage.delete(&self.version_key(key, version)).await?;
        Ok(())
    }
}
