//! CLI command implementations

pub mod config;
pub mod kv;
pub mod metadata;

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use vkv_core::{ConfigLoader, FileStorage, MasterKey, ReadOnlyStorage, Storage};
use vkv_engine::KvEngine;

use crate::cli::GlobalArgs;

const ENV_MASTER_KEY: &str = "VKV_MASTER_KEY";
const ENV_PASSPHRASE: &str = "VKV_PASSPHRASE";

/// Open the engine described by the global options
pub async fn open_engine(args: &GlobalArgs) -> Result<KvEngine> {
    let data_dir = resolve_data_dir(args.data_dir.clone())?;
    let master_key = load_master_key()?;

    let loader = match &args.config {
        Some(path) => ConfigLoader::with_file(path),
        None => ConfigLoader::new(),
    };
    let defaults = loader.load().context("Failed to load backend configuration")?;

    let storage = FileStorage::open(&data_dir)
        .await
        .with_context(|| format!("Failed to open storage at {}", data_dir.display()))?;
    debug!("Using storage at {}", data_dir.display());

    let storage: Arc<dyn Storage> = if args.read_only {
        Arc::new(ReadOnlyStorage::new(storage))
    } else {
        Arc::new(storage)
    };

    Ok(KvEngine::with_config(storage, master_key, defaults))
}

fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(dir) => Ok(dir),
        None => dirs::data_dir()
            .map(|d| d.join("vkv"))
            .ok_or_else(|| anyhow!("Could not determine a data directory; pass --data-dir")),
    }
}

/// Master key from `VKV_MASTER_KEY` (hex) or, failing that, `VKV_PASSPHRASE`
fn load_master_key() -> Result<MasterKey> {
    if let Ok(hex_key) = std::env::var(ENV_MASTER_KEY) {
        return MasterKey::from_hex(hex_key.trim())
            .with_context(|| format!("Invalid {}", ENV_MASTER_KEY));
    }
    if let Ok(passphrase) = std::env::var(ENV_PASSPHRASE) {
        return MasterKey::from_passphrase(&passphrase)
            .with_context(|| format!("Invalid {}", ENV_PASSPHRASE));
    }
    Err(anyhow!(
        "No key material: set {} (64 hex characters) or {}",
        ENV_MASTER_KEY,
        ENV_PASSPHRASE
    ))
}

/// Parse `KEY=VALUE`
pub(crate) fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", s))
}
