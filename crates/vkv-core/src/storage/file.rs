//! Directory-backed storage
//!
//! Each key maps to one file below the root directory. Path segments become
//! directories and the final segment is stored with a `_` prefix so that a
//! key and a sub-path of the same name can coexist (`a` and `a/b`).

use crate::error::StorageError;
use crate::storage::{Storage, StorageResult};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Prefix applied to the file holding a key's value
const VALUE_FILE_PREFIX: char = '_';

/// Attempts at writing a value before a vanished parent directory is an error
const WRITE_ATTEMPTS: usize = 3;

/// Storage rooted at a local directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) storage rooted at `root`
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root).await?;
            set_dir_permissions(&root).await?;
            debug!("Created storage directory: {}", root.display());
        }
        Ok(Self { root })
    }

    /// Root directory of this storage
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the file holding `key`
    fn value_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;

        let (dir, name) = match key.rsplit_once('/') {
            Some((dir, name)) => (Some(dir), name),
            None => (None, key),
        };

        let mut path = self.root.clone();
        if let Some(dir) = dir {
            path.push(dir);
        }
        path.push(format!("{}{}", VALUE_FILE_PREFIX, name));
        Ok(path)
    }
}

/// Reject keys that would escape the root or cannot name a file
fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::invalid_key(key, "key is empty"));
    }
    if key.ends_with('/') {
        return Err(StorageError::invalid_key(key, "key ends with a separator"));
    }
    let escapes = key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if escapes || Path::new(key).is_absolute() {
        return Err(StorageError::invalid_key(
            key,
            "key must be a relative path without '.', '..' or empty segments",
        ));
    }
    Ok(())
}

#[cfg(unix)]
async fn set_dir_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o700)).await
}

#[cfg(not(unix))]
async fn set_dir_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
async fn set_file_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn set_file_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Write `value` to a sibling temp file, then rename it over `path`
async fn write_atomic(path: &Path, value: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        let created = !parent.exists();
        fs::create_dir_all(parent).await?;
        if created {
            set_dir_permissions(parent).await?;
        }
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&tmp_path, value).await?;
    set_file_permissions(&tmp_path).await?;
    fs::rename(&tmp_path, path).await
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.value_path(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let path = self.value_path(key)?;

        // A concurrent delete of a sibling may prune the parent directory
        // between creating it and writing the temp file.
        let mut attempt = 1;
        loop {
            match write_atomic(&path, value).await {
                Ok(()) => break,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound && attempt < WRITE_ATTEMPTS => {
                    debug!("Parent of {} vanished during write, retrying", path.display());
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        debug!("Wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.value_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        // Prune directories left empty so they stop showing up in listings
        let mut dir = path.parent().map(Path::to_path_buf);
        while let Some(current) = dir {
            if current == self.root || fs::remove_dir(&current).await.is_err() {
                break;
            }
            dir = current.parent().map(Path::to_path_buf);
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let dir = if prefix.is_empty() {
            self.root.clone()
        } else {
            let trimmed = prefix.trim_end_matches('/');
            validate_key(trimmed)?;
            self.root.join(trimmed)
        };

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut children = BTreeSet::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type().await?.is_dir() {
                children.insert(format!("{}/", name));
            } else if let Some(key_name) = name.strip_prefix(VALUE_FILE_PREFIX) {
                children.insert(key_name.to_string());
            }
        }

        Ok(children.into_iter().collect())
    }
}
