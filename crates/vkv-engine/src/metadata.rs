//! Metadata store
//!
//! One JSON-encoded [`KeyMetadata`] record per logical key, kept below
//! `metadata/` with encrypted values and obfuscated names.

use crate::error::{Error, Result};
use crate::types::KeyMetadata;
use std::sync::Arc;
use tracing::debug;
use vkv_core::{EncryptedStorage, KeyEncryptor, Storage};

/// Namespace of metadata records in raw storage
pub const METADATA_PREFIX: &str = "metadata/";

/// Reads and writes [`KeyMetadata`] records
#[derive(Debug, Clone)]
pub struct MetadataStore {
    storage: EncryptedStorage,
}

impl MetadataStore {
    pub fn new(raw: Arc<dyn Storage>, encryptor: Arc<KeyEncryptor>) -> Self {
        Self {
            storage: EncryptedStorage::new(raw, encryptor, METADATA_PREFIX).with_obfuscated_names(),
        }
    }

    /// Load the record for `key`, `None` if the key has never been written
    pub async fn get(&self, key: &str) -> Result<Option<KeyMetadata>> {
        let Some(bytes) = self.storage.get(key).await? else {
            return Ok(None);
        };

        let meta: KeyMetadata = serde_json::from_slice(&bytes)
            .map_err(|e| Error::corrupt(key, format!("failed to decode metadata: {}", e)))?;

        if meta.key != key {
            return Err(Error::corrupt(
                key,
                format!("record belongs to {:?}", meta.key),
            ));
        }

        Ok(Some(meta))
    }

    /// Persist `meta` under its own key
    pub async fn put(&self, meta: &KeyMetadata) -> Result<()> {
        let bytes = serde_json::to_vec(meta)?;
        self.storage.put(&meta.key, &bytes).await?;
        debug!(path = %meta.key, current_version = meta.current_version, "Wrote key metadata");
        Ok(())
    }

    /// Remove the record for `key`. Absent records are not an error.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.storage.delete(key).await?;
        Ok(())
    }

    /// Immediate children of `prefix`, directories suffixed with `/`
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self.storage.list(prefix).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vkv_core::{MasterKey, MemoryStorage};

    async fn create_test_store() -> (Arc<MemoryStorage>, MetadataStore) {
        let raw = Arc::new(MemoryStorage::new());
        let encryptor = KeyEncryptor::load_or_init(raw.as_ref(), &MasterKey::generate())
            .await
            .unwrap();
        let store = MetadataStore::new(raw.clone(), Arc::new(encryptor));
        (raw, store)
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let (_raw, store) = create_test_store().await;
        assert!(store.get("app/db").await.unwrap().is_none());

        let mut meta = KeyMetadata::new("app/db", Utc::now());
        meta.max_versions = 4;
        store.put(&meta).await.unwrap();

        assert_eq!(store.get("app/db").await.unwrap(), Some(meta));

        store.delete("app/db").await.unwrap();
        assert!(store.get("app/db").await.unwrap().is_none());
        store.delete("app/db").await.unwrap();
    }

    #[tokio::test]
    async fn test_records_are_opaque_at_rest() {
        let (raw, store) = create_test_store().await;
        store
            .put(&KeyMetadata::new("payments/stripe", Utc::now()))
            .await
            .unwrap();

        let keys = raw.keys().await;
        let record = keys
            .iter()
            .find(|k| k.starts_with(METADATA_PREFIX))
            .unwrap();
        assert!(!record.contains("stripe"));
        assert!(!record.contains("payments"));
    }

    #[tokio::test]
    async fn test_list_children() {
        let (_raw, store) = create_test_store().await;
        for key in ["app/db", "app/cache/redis", "top"] {
            store.put(&KeyMetadata::new(key, Utc::now())).await.unwrap();
        }

        assert_eq!(store.list("").await.unwrap(), vec!["app/", "top"]);
        assert_eq!(store.list("app/").await.unwrap(), vec!["cache/", "db"]);
    }

    #[tokio::test]
    async fn test_undecodable_record_is_corrupt() {
        let (_raw, store) = create_test_store().await;

        store.storage.put("broken", b"not json").await.unwrap();
        let err = store.get("broken").await.unwrap_err();
        assert!(matches!(err, Error::Corrupt { .. }));
    }
}
