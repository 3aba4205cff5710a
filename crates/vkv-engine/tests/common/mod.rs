//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use vkv_core::storage::StorageResult;
use vkv_core::{KvConfig, MasterKey, MemoryStorage, Storage, StorageError};
use vkv_engine::KvEngine;

/// Raw key prefix of version payloads
pub const VERSIONS_PREFIX: &str = "versions/";

/// In-memory storage whose deletes can be made to fail on demand
#[derive(Debug)]
pub struct FaultyStorage {
    inner: MemoryStorage,
    /// Deletes still allowed before failing; negative means unlimited
    remaining_deletes: AtomicI64,
}

impl FaultyStorage {
    pub fn new() -> Self {
        Self {
            inner: MemoryStorage::new(),
            remaining_deletes: AtomicI64::new(-1),
        }
    }

    /// Let `n` more deletes succeed, then fail every following one
    pub fn fail_deletes_after(&self, n: i64) {
        self.remaining_deletes.store(n, Ordering::SeqCst);
    }

    /// Stop injecting failures
    pub fn heal(&self) {
        self.remaining_deletes.store(-1, Ordering::SeqCst);
    }

    pub async fn keys(&self) -> Vec<String> {
        self.inner.keys().await
    }

    pub async fn payload_count(&self) -> usize {
        self.keys()
            .await
            .iter()
            .filter(|k| k.starts_with(VERSIONS_PREFIX))
            .count()
    }
}

#[async_trait]
impl Storage for FaultyStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let remaining = self.remaining_deletes.load(Ordering::SeqCst);
        if remaining == 0 {
            return Err(StorageError::backend("injected delete failure"));
        }
        if remaining > 0 {
            self.remaining_deletes.fetch_sub(1, Ordering::SeqCst);
        }
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }
}

/// Engine over fresh in-memory storage with default configuration
pub fn memory_engine() -> KvEngine {
    KvEngine::new(Arc::new(MemoryStorage::new()), MasterKey::generate())
}

/// Engine over fresh in-memory storage with the given defaults
pub fn memory_engine_with(config: KvConfig) -> KvEngine {
    KvEngine::with_config(Arc::new(MemoryStorage::new()), MasterKey::generate(), config)
}

/// Engine over a faulty storage, returning the storage handle for fault injection
pub fn faulty_engine() -> (Arc<FaultyStorage>, KvEngine) {
    let storage = Arc::new(FaultyStorage::new());
    let engine = KvEngine::new(storage.clone(), MasterKey::generate());
    (storage, engine)
}
