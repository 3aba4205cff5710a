//! Version data lifecycle: write, read, soft delete, undelete, destroy

use crate::engine::KvEngine;
use crate::error::Result;
use crate::types::{
    KeyMetadata, Response, SecretVersion, VersionMetadata, VersionView, WriteDataRequest,
    WrittenVersion,
};
use crate::validation::validate_path;
use crate::versions::VersionStore;
use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;
use tracing::{debug, info, warn};

const CAS_REQUIRED_MESSAGE: &str = "check-and-set parameter required for this call";
const CAS_MISMATCH_MESSAGE: &str = "check-and-set parameter did not match the current version";
const NO_VERSIONS_MESSAGE: &str = "no versions provided";

impl KvEngine {
    /// Write a new version of a key, creating its metadata on first write.
    ///
    /// Versions older than the retention window are pruned in the same
    /// critical section.
    pub async fn write_data(&self, req: WriteDataRequest) -> Result<Response<WrittenVersion>> {
        if let Some(reason) = validate_path(&req.path) {
            return Ok(Response::error(reason));
        }

        let config = self.read_config().await?;
        let backend = self.backend().await?;
        let _guard = self.locks.lock_for(&req.path).lock().await;

        let now = Utc::now();
        let mut meta = backend
            .metadata
            .get(&req.path)
            .await?
            .unwrap_or_else(|| KeyMetadata::new(req.path.clone(), now));

        match req.cas {
            None if meta.effective_cas_required(&config) => {
                return Ok(Response::error(CAS_REQUIRED_MESSAGE));
            }
            Some(cas) if cas != meta.current_version => {
                return Ok(Response::error(CAS_MISMATCH_MESSAGE));
            }
            _ => {}
        }

        let version = meta.current_version + 1;
        backend.versions.put(&req.path, version, &req.data).await?;

        let version_meta = VersionMetadata::new(now);
        meta.versions.insert(version, version_meta.clone());
        meta.current_version = version;
        if meta.oldest_version == 0 {
            meta.oldest_version = 1;
        }

        let max_versions = u64::from(config.effective_max_versions(meta.max_versions));
        if max_versions > 0 && version > max_versions {
            let cutoff = version - max_versions;
            prune_versions(&backend.versions, &mut meta, cutoff).await?;
        }

        meta.touch(now);
        backend.metadata.put(&meta).await?;

        debug!(path = %req.path, version, "Wrote version");
        Ok(Response::with_data(WrittenVersion {
            version,
            metadata: VersionView::from(&version_meta),
        }))
    }

    /// Read a version of a key; `None` selects the current version.
    ///
    /// Returns `None` for unknown keys and versions. Deleted, destroyed and
    /// expired versions come back with their metadata but without data.
    pub async fn read_data(&self, path: &str, version: Option<u64>) -> Result<Option<SecretVersion>> {
        if validate_path(path).is_some() {
            return Ok(None);
        }

        let config = self.read_config().await?;
        let backend = self.backend().await?;
        let _guard = self.locks.lock_for(path).lock().await;

        let Some(mut meta) = backend.metadata.get(path).await? else {
            return Ok(None);
        };

        let version = version.unwrap_or(meta.current_version);
        let ttl = meta.effective_delete_version_after(&config);
        let now = Utc::now();

        let Some(version_meta) = meta.versions.get_mut(&version) else {
            return Ok(None);
        };

        if let Some(expired_at) = expiry(version_meta, ttl, now) {
            backend.versions.delete(path, version).await?;
            version_meta.destroyed = true;
            version_meta.deletion_time = Some(expired_at);
            info!(path = %path, version, "Version expired");

            advance_oldest(&mut meta);
            meta.touch(now);
            backend.metadata.put(&meta).await?;
        }

        let Some(version_meta) = meta.versions.get(&version) else {
            return Ok(None);
        };

        let data = if version_meta.is_readable(now) {
            let payload = backend.versions.get(path, version).await?;
            if payload.is_none() {
                warn!(path = %path, version, "Live version has no payload");
            }
            payload
        } else {
            None
        };

        Ok(Some(SecretVersion {
            version,
            data,
            metadata: VersionView::from(version_meta),
            custom_metadata: meta.custom_metadata.clone(),
        }))
    }

    /// Soft-delete versions; an empty list selects the current version.
    ///
    /// Payloads are kept so the versions can be undeleted.
    pub async fn delete_versions(&self, path: &str, versions: &[u64]) -> Result<Response> {
        if let Some(reason) = validate_path(path) {
            return Ok(Response::error(reason));
        }

        let backend = self.backend().await?;
        let _guard = self.locks.lock_for(path).lock().await;

        let Some(mut meta) = backend.metadata.get(path).await? else {
            return Ok(Response::empty());
        };

        let targets = if versions.is_empty() {
            vec![meta.current_version]
        } else {
            versions.to_vec()
        };

        let now = Utc::now();
        let mut changed = 0;
        for version in targets {
            if let Some(v) = meta.versions.get_mut(&version) {
                if !v.destroyed && !v.is_deleted(now) {
                    v.deletion_time = Some(now);
                    changed += 1;
                }
            }
        }

        if changed > 0 {
            meta.touch(now);
            backend.metadata.put(&meta).await?;
        }
        debug!(path = %path, changed, "Soft-deleted versions");
        Ok(Response::empty())
    }

    /// Clear the deletion mark of versions that were not destroyed
    pub async fn undelete_versions(&self, path: &str, versions: &[u64]) -> Result<Response> {
        if let Some(reason) = validate_path(path) {
            return Ok(Response::error(reason));
        }
        if versions.is_empty() {
            return Ok(Response::error(NO_VERSIONS_MESSAGE));
        }

        let backend = self.backend().await?;
        let _guard = self.locks.lock_for(path).lock().await;

        let Some(mut meta) = backend.metadata.get(path).await? else {
            return Ok(Response::empty());
        };

        let mut changed = 0;
        for version in versions {
            if let Some(v) = meta.versions.get_mut(version) {
                if !v.destroyed && v.deletion_time.is_some() {
                    v.deletion_time = None;
                    changed += 1;
                }
            }
        }

        if changed > 0 {
            meta.touch(Utc::now());
            backend.metadata.put(&meta).await?;
        }
        debug!(path = %path, changed, "Undeleted versions");
        Ok(Response::empty())
    }

    /// Irrecoverably remove the payloads of versions, keeping tombstones
    pub async fn destroy_versions(&self, path: &str, versions: &[u64]) -> Result<Response> {
        if let Some(reason) = validate_path(path) {
            return Ok(Response::error(reason));
        }
        if versions.is_empty() {
            return Ok(Response::error(NO_VERSIONS_MESSAGE));
        }

        let backend = self.backend().await?;
        let _guard = self.locks.lock_for(path).lock().await;

        let Some(mut meta) = backend.metadata.get(path).await? else {
            return Ok(Response::empty());
        };

        let mut changed = 0;
        for version in versions {
            let Some(v) = meta.versions.get_mut(version) else {
                continue;
            };
            if v.destroyed {
                continue;
            }
            backend.versions.delete(path, *version).await?;
            v.destroyed = true;
            changed += 1;
        }

        if changed > 0 {
            advance_oldest(&mut meta);
            meta.touch(Utc::now());
            backend.metadata.put(&meta).await?;
            info!(path = %path, changed, "Destroyed versions");
        }
        Ok(Response::empty())
    }
}

/// Remove every version numbered `cutoff` or lower, payload and entry
async fn prune_versions(store: &VersionStore, meta: &mut KeyMetadata, cutoff: u64) -> Result<()> {
    let doomed: Vec<u64> = meta.versions.range(..=cutoff).map(|(v, _)| *v).collect();
    for version in doomed {
        store.delete(&meta.key, version).await?;
        meta.versions.remove(&version);
    }
    meta.oldest_version = meta.oldest_version.max(cutoff + 1);
    Ok(())
}

/// Move `oldest_version` past the run of destroyed versions at the bottom
fn advance_oldest(meta: &mut KeyMetadata) {
    while meta.oldest_version < meta.current_version
        && meta
            .versions
            .get(&meta.oldest_version)
            .map_or(true, |v| v.destroyed)
    {
        meta.oldest_version += 1;
    }
}

/// When a live version expired under `ttl`, if it has by `now`
fn expiry(
    version: &VersionMetadata,
    ttl: Option<Duration>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if version.destroyed {
        return None;
    }
    let ttl = TimeDelta::from_std(ttl?).ok()?;
    let expires_at = version.created_time.checked_add_signed(ttl)?;
    (expires_at <= now).then_some(expires_at)
}
