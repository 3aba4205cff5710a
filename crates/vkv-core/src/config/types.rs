//! Configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of versions retained per key when neither the key nor the backend says otherwise
pub const DEFAULT_MAX_VERSIONS: u32 = 10;

/// Backend-wide defaults consulted by every operation that needs a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KvConfig {
    /// Versions retained per key unless the key overrides it
    pub max_versions: u32,

    /// When true every data write must carry a check-and-set version
    pub cas_required: bool,

    /// Seconds after creation at which versions expire.
    ///
    /// Doubles as the ceiling for per-key overrides when set and non-zero.
    pub delete_version_after: Option<u64>,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            max_versions: DEFAULT_MAX_VERSIONS,
            cas_required: false,
            delete_version_after: None,
        }
    }
}

impl KvConfig {
    /// Default expiry for versions, `None` when expiry is disabled
    pub fn delete_version_after(&self) -> Option<Duration> {
        self.delete_version_after
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Largest per-key `delete_version_after` override accepted
    pub fn delete_version_after_ceiling(&self) -> Option<Duration> {
        self.delete_version_after()
    }

    /// Effective max versions for a per-key override where zero means unset
    pub fn effective_max_versions(&self, key_override: u32) -> u32 {
        if key_override > 0 {
            key_override
        } else {
            self.max_versions
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = KvConfig::default();
        assert_eq!(config.max_versions, DEFAULT_MAX_VERSIONS);
        assert!(!config.cas_required);
        assert!(config.delete_version_after().is_none());
    }

    #[test]
    fn test_zero_delete_version_after_disables_expiry() {
        let config = KvConfig {
            delete_version_after: Some(0),
            ..Default::default()
        };
        assert!(config.delete_version_after().is_none());
        assert!(config.delete_version_after_ceiling().is_none());
    }

    #[test]
    fn test_effective_max_versions() {
        let config = KvConfig::default();
        assert_eq!(config.effective_max_versions(0), DEFAULT_MAX_VERSIONS);
        assert_eq!(config.effective_max_versions(3), 3);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: KvConfig = serde_yaml_ng::from_str("cas_required: true\n").unwrap();
        assert!(config.cas_required);
        assert_eq!(config.max_versions, DEFAULT_MAX_VERSIONS);
    }
}
