//! # vkv-core
//!
//! Core library for vkv providing:
//! - Error taxonomy shared by every layer (storage, decryption, read-only, config)
//! - Backend-wide configuration (`KvConfig`) with layered loading
//! - The raw `Storage` abstraction with in-memory, file and read-only backends
//! - Transparent at-rest encryption (`EncryptedStorage`, `KeyEncryptor`)

pub mod config;
pub mod crypto;
pub mod error;
pub mod storage;

pub use config::{ConfigLoader, KvConfig};
pub use crypto::{KeyEncryptor, MasterKey};
pub use error::{Error, Result, StorageError};
pub use storage::{EncryptedStorage, FileStorage, MemoryStorage, ReadOnlyStorage, Storage};
