//! # vkv-engine
//!
//! Versioned key-value lifecycle engine providing:
//! - Metadata lifecycle (create, partial update, read, list, full erase, existence)
//! - Version lifecycle (write with check-and-set, read, soft delete, undelete, destroy)
//! - Custom metadata validation
//! - Per-key serialization through a fixed lock table

mod data;
pub mod engine;
pub mod error;
pub mod locks;
pub mod metadata;
pub mod types;
pub mod validation;
pub mod versions;

pub use engine::{KvEngine, CONFIG_KEY};
pub use error::{Error, Result};
pub use locks::{LockRegistry, LOCK_BUCKETS};
pub use metadata::MetadataStore;
pub use types::{
    KeyMetadata, MetadataView, Response, SecretVersion, VersionMetadata, VersionView,
    WriteConfigRequest, WriteDataRequest, WriteMetadataRequest, WrittenVersion,
};
pub use validation::{validate_custom_metadata, ValidationErrors};
pub use versions::VersionStore;
