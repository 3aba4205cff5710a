//! Per-key lock registry
//!
//! A fixed table of mutexes addressed by a stable hash of the logical key.
//! Memory stays bounded regardless of how many keys exist; unrelated keys
//! that land in the same bucket are merely serialized.

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

/// Number of lock buckets. Must be a power of two.
pub const LOCK_BUCKETS: usize = 256;

const _: () = assert!(LOCK_BUCKETS.is_power_of_two());

/// Fixed-size table of per-key locks
#[derive(Debug)]
pub struct LockRegistry {
    locks: Vec<Mutex<()>>,
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LockRegistry {
    /// Create a registry with [`LOCK_BUCKETS`] locks
    pub fn new() -> Self {
        Self {
            locks: (0..LOCK_BUCKETS).map(|_| Mutex::new(())).collect(),
        }
    }

    /// The lock guarding `key`. Always the same instance for the same key.
    pub fn lock_for(&self, key: &str) -> &Mutex<()> {
        &self.locks[Self::bucket(key)]
    }

    /// Bucket index for `key`
    pub fn bucket(key: &str) -> usize {
        let digest = Sha256::digest(key.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(prefix) as usize) & (LOCK_BUCKETS - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_same_key_same_lock() {
        let registry = LockRegistry::new();
        assert!(std::ptr::eq(
            registry.lock_for("secret/db"),
            registry.lock_for("secret/db")
        ));
    }

    #[test]
    fn test_buckets_are_in_range() {
        for i in 0..1000 {
            assert!(LockRegistry::bucket(&format!("key-{}", i)) < LOCK_BUCKETS);
        }
    }

    #[test]
    fn test_keys_spread_over_buckets() {
        let used: std::collections::HashSet<usize> = (0..1000)
            .map(|i| LockRegistry::bucket(&format!("key-{}", i)))
            .collect();
        assert!(used.len() > LOCK_BUCKETS / 2);
    }

    #[tokio::test]
    async fn test_lock_excludes_second_holder() {
        let registry = Arc::new(LockRegistry::new());
        let guard = registry.lock_for("k").lock().await;

        let contender = registry.clone();
        let attempt = tokio::spawn(async move {
            let _guard = contender.lock_for("k").lock().await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!attempt.is_finished());

        drop(guard);
        attempt.await.unwrap();
    }
}
