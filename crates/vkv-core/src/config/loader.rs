//! Layered configuration loader
//!
//! Loads `KvConfig` from multiple sources with the following precedence (low to high):
//! 1. Built-in defaults
//! 2. Optional YAML file
//! 3. Environment variables (VKV_* prefix)

use crate::config::types::KvConfig;
use crate::error::{Error, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const ENV_MAX_VERSIONS: &str = "VKV_MAX_VERSIONS";
const ENV_CAS_REQUIRED: &str = "VKV_CAS_REQUIRED";
const ENV_DELETE_VERSION_AFTER: &str = "VKV_DELETE_VERSION_AFTER";

/// Configuration loader with precedence
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Optional YAML file layered over the defaults
    path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader that only applies defaults and environment overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loader that also reads the given YAML file
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Load configuration with layered precedence
    pub fn load(&self) -> Result<KvConfig> {
        let mut config = KvConfig::default();

        if let Some(path) = &self.path {
            config = Self::load_yaml_file(path)?;
            debug!("Loaded backend configuration from {}", path.display());
        }

        Self::apply_env_overrides(config)
    }

    /// Load a YAML file and parse it
    fn load_yaml_file(path: &Path) -> Result<KvConfig> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::config_not_found(path.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;

        serde_yaml_ng::from_str(&content).map_err(|e| {
            Error::invalid_config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Apply VKV_* environment overrides
    fn apply_env_overrides(mut config: KvConfig) -> Result<KvConfig> {
        if let Ok(raw) = env::var(ENV_MAX_VERSIONS) {
            config.max_versions = raw.trim().parse().map_err(|_| {
                Error::invalid_config(format!(
                    "{} must be a non-negative integer, got {:?}",
                    ENV_MAX_VERSIONS, raw
                ))
            })?;
        }

        if let Ok(raw) = env::var(ENV_CAS_REQUIRED) {
            config.cas_required = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(Error::invalid_config(format!(
                        "{} must be a boolean, got {:?}",
                        ENV_CAS_REQUIRED, raw
                    )))
                }
            };
        }

        if let Ok(raw) = env::var(ENV_DELETE_VERSION_AFTER) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                Error::invalid_config(format!(
                    "{} must be a non-negative number of seconds, got {:?}",
                    ENV_DELETE_VERSION_AFTER, raw
                ))
            })?;
            config.delete_version_after = Some(secs);
        }

        Ok(config)
    }
}
