//! Metadata lifecycle engine
//!
//! Every mutation of a key runs as read-modify-write while holding that
//! key's lock from the [`LockRegistry`], so writers to the same key are
//! totally ordered by lock acquisition.

use crate::error::{Error, Result};
use crate::locks::LockRegistry;
use crate::metadata::MetadataStore;
use crate::types::{
    format_duration, KeyMetadata, MetadataView, Response, WriteConfigRequest,
    WriteMetadataRequest,
};
use crate::validation::{validate_custom_metadata, validate_path};
use crate::versions::VersionStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};
use vkv_core::{EncryptedStorage, KeyEncryptor, KvConfig, MasterKey, Storage};

/// Raw storage key of the persisted backend configuration
pub const CONFIG_KEY: &str = "config";

pub(crate) const CAS_OVERRIDE_WARNING: &str =
    "\"cas_required\" set to false, but is mandated by backend config. This value will be ignored.";

/// Stores bound to the backend's key material, created on first use
#[derive(Debug)]
pub(crate) struct Backend {
    pub(crate) metadata: MetadataStore,
    pub(crate) versions: VersionStore,
    config: EncryptedStorage,
}

/// Versioned key-value engine over a raw [`Storage`].
///
/// The engine is cheap to share behind an `Arc`; all operations take `&self`.
pub struct KvEngine {
    storage: Arc<dyn Storage>,
    master_key: MasterKey,
    defaults: KvConfig,
    pub(crate) locks: LockRegistry,
    backend: OnceCell<Backend>,
    config_lock: Mutex<()>,
}

impl KvEngine {
    /// Create an engine with built-in configuration defaults
    pub fn new(storage: Arc<dyn Storage>, master_key: MasterKey) -> Self {
        Self::with_config(storage, master_key, KvConfig::default())
    }

    /// Create an engine whose defaults apply until a configuration is persisted
    pub fn with_config(storage: Arc<dyn Storage>, master_key: MasterKey, defaults: KvConfig) -> Self {
        Self {
            storage,
            master_key,
            defaults,
            locks: LockRegistry::new(),
            backend: OnceCell::new(),
            config_lock: Mutex::new(()),
        }
    }

    /// Initialize key material on first use.
    ///
    /// A failed initialization is not cached, so a backend that was read-only
    /// during setup recovers once it becomes writable.
    pub(crate) async fn backend(&self) -> Result<&Backend> {
        self.backend
            .get_or_try_init(|| async {
                let encryptor = Arc::new(
                    KeyEncryptor::load_or_init(self.storage.as_ref(), &self.master_key).await?,
                );
                debug!("Key encryptor ready");
                Ok::<_, Error>(Backend {
                    metadata: MetadataStore::new(self.storage.clone(), encryptor.clone()),
                    versions: VersionStore::new(self.storage.clone(), encryptor.clone()),
                    config: EncryptedStorage::new(self.storage.clone(), encryptor, ""),
                })
            })
            .await
    }

    /// Persisted backend configuration, or the engine defaults if none was written
    pub async fn read_config(&self) -> Result<KvConfig> {
        let backend = self.backend().await?;
        match backend.config.get(CONFIG_KEY).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                Error::corrupt(CONFIG_KEY, format!("failed to decode configuration: {}", e))
            }),
            None => Ok(self.defaults.clone()),
        }
    }

    /// Partially update the backend configuration
    pub async fn write_config(&self, req: WriteConfigRequest) -> Result<Response> {
        if matches!(req.delete_version_after, Some(secs) if secs < 0) {
            return Ok(Response::error("delete_version_after cannot be negative"));
        }

        let _guard = self.config_lock.lock().await;
        let mut config = self.read_config().await?;

        if let Some(max_versions) = req.max_versions {
            config.max_versions = max_versions;
        }
        if let Some(cas_required) = req.cas_required {
            config.cas_required = cas_required;
        }
        if let Some(secs) = req.delete_version_after {
            config.delete_version_after = Some(secs.unsigned_abs());
        }

        let bytes = serde_json::to_vec(&config)?;
        self.backend().await?.config.put(CONFIG_KEY, &bytes).await?;
        info!(
            max_versions = config.max_versions,
            cas_required = config.cas_required,
            "Updated backend configuration"
        );
        Ok(Response::empty())
    }

    /// Create or partially update the metadata of a key.
    ///
    /// Only supplied fields are applied. A request without any field is a
    /// successful no-op that does not touch storage.
    pub async fn write_metadata(&self, req: WriteMetadataRequest) -> Result<Response> {
        if let Some(reason) = validate_path(&req.path) {
            return Ok(Response::error(reason));
        }
        if !req.has_updates() {
            return Ok(Response::empty());
        }

        let config = self.read_config().await?;

        if let Some(secs) = req.delete_version_after {
            if secs < 0 {
                return Ok(Response::error("delete_version_after cannot be negative"));
            }
            if let Some(ceiling) = config.delete_version_after_ceiling() {
                let requested = Duration::from_secs(secs.unsigned_abs());
                if requested > ceiling {
                    return Ok(Response::error(format!(
                        "delete_version_after {} exceeds the backend maximum of {}",
                        format_duration(requested),
                        format_duration(ceiling)
                    )));
                }
            }
        }

        if let Some(custom_metadata) = &req.custom_metadata {
            if let Err(errs) = validate_custom_metadata(custom_metadata) {
                return Ok(Response::error(errs.to_string()));
            }
        }

        let mut resp = Response::empty();
        let mut cas_required = req.cas_required;
        if cas_required == Some(false) && config.cas_required {
            warn!(path = %req.path, "Ignoring cas_required=false mandated by backend config");
            resp.add_warning(CAS_OVERRIDE_WARNING);
            cas_required = Some(true);
        }

        let backend = self.backend().await?;
        let _guard = self.locks.lock_for(&req.path).lock().await;

        let now = Utc::now();
        let mut meta = backend
            .metadata
            .get(&req.path)
            .await?
            .unwrap_or_else(|| KeyMetadata::new(req.path.clone(), now));

        if let Some(max_versions) = req.max_versions {
            meta.max_versions = max_versions;
        }
        if let Some(cas_required) = cas_required {
            meta.cas_required = cas_required;
        }
        if let Some(secs) = req.delete_version_after {
            meta.delete_version_after = Some(secs.unsigned_abs());
        }
        if let Some(custom_metadata) = req.custom_metadata {
            meta.custom_metadata = custom_metadata;
        }
        meta.touch(now);

        backend.metadata.put(&meta).await?;
        Ok(resp)
    }

    /// Projected metadata of a key, `None` if the key does not exist
    pub async fn read_metadata(&self, path: &str) -> Result<Option<MetadataView>> {
        if validate_path(path).is_some() {
            return Ok(None);
        }
        let backend = self.backend().await?;
        let meta = backend.metadata.get(path).await?;
        Ok(meta.as_ref().map(MetadataView::from))
    }

    /// Immediate children below `path`; directories end with `/`
    pub async fn list_metadata(&self, path: &str) -> Result<Vec<String>> {
        let backend = self.backend().await?;
        backend.metadata.list(path).await
    }

    /// Erase a key: every version payload, then the metadata record.
    ///
    /// If a payload delete fails the metadata is left in place and the error
    /// returned; calling again finishes the job.
    pub async fn delete_metadata(&self, path: &str) -> Result<()> {
        if validate_path(path).is_some() {
            return Ok(());
        }

        let backend = self.backend().await?;
        let _guard = self.locks.lock_for(path).lock().await;

        let Some(meta) = backend.metadata.get(path).await? else {
            return Ok(());
        };

        for version in meta.versions.keys() {
            backend.versions.delete(path, *version).await?;
        }
        backend.metadata.delete(path).await?;

        info!(path = %path, versions = meta.versions.len(), "Erased key");
        Ok(())
    }

    /// Whether metadata exists for `path`.
    ///
    /// Storage that is still read-only because the backend was never set up
    /// reports `false` rather than an error.
    pub async fn metadata_exists(&self, path: &str) -> Result<bool> {
        match self.read_metadata(path).await {
            Ok(meta) => Ok(meta.is_some()),
            Err(e) if e.is_read_only() => {
                debug!(path = %path, "Storage is read-only, treating key as absent");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for KvEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvEngine")
            .field("defaults", &self.defaults)
            .field("initialized", &self.backend.initialized())
            .finish_non_exhaustive()
    }
}
