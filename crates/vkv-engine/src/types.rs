//! Engine data types
//!
//! Persisted records (`KeyMetadata`, `VersionMetadata`), the requests the
//! engine accepts, and the projections it returns to callers.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use vkv_core::KvConfig;

/// Lifecycle record of one version, embedded in [`KeyMetadata`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMetadata {
    /// Set once when the version is written
    pub created_time: DateTime<Utc>,

    /// Set when the version is soft-deleted or expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_time: Option<DateTime<Utc>>,

    /// True once the payload has been irrecoverably removed
    #[serde(default)]
    pub destroyed: bool,
}

impl VersionMetadata {
    /// Metadata for a version created at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            created_time: now,
            deletion_time: None,
            destroyed: false,
        }
    }

    /// Whether the version counts as deleted at `now`
    pub fn is_deleted(&self, now: DateTime<Utc>) -> bool {
        self.deletion_time.is_some_and(|t| t <= now)
    }

    /// Whether the payload may be served at `now`
    pub fn is_readable(&self, now: DateTime<Utc>) -> bool {
        !self.destroyed && !self.is_deleted(now)
    }
}

/// Everything known about one logical key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMetadata {
    /// Logical path
    pub key: String,

    /// Version number to lifecycle record
    #[serde(default)]
    pub versions: BTreeMap<u64, VersionMetadata>,

    /// Highest version number handed out (0 before the first write)
    pub current_version: u64,

    /// Lowest version number still in the live range
    pub oldest_version: u64,

    pub created_time: DateTime<Utc>,
    pub updated_time: DateTime<Utc>,

    /// Per-key retention override, 0 means unset
    #[serde(default)]
    pub max_versions: u32,

    /// Per-key check-and-set requirement
    #[serde(default)]
    pub cas_required: bool,

    /// Per-key expiry override in seconds; `Some(0)` is an explicitly cleared override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_version_after: Option<u64>,

    #[serde(default)]
    pub custom_metadata: BTreeMap<String, String>,
}

impl KeyMetadata {
    /// Fresh record for `key` with no versions
    pub fn new(key: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            versions: BTreeMap::new(),
            current_version: 0,
            oldest_version: 0,
            created_time: now,
            updated_time: now,
            max_versions: 0,
            cas_required: false,
            delete_version_after: None,
            custom_metadata: BTreeMap::new(),
        }
    }

    /// Refresh `updated_time` after a mutation
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_time = now;
    }

    /// Expiry that applies to this key's versions under `config`.
    ///
    /// A non-zero per-key override wins but never exceeds the backend ceiling.
    pub fn effective_delete_version_after(&self, config: &KvConfig) -> Option<Duration> {
        let ceiling = config.delete_version_after_ceiling();
        match self.delete_version_after.filter(|secs| *secs > 0) {
            Some(secs) => {
                let own = Duration::from_secs(secs);
                Some(ceiling.map_or(own, |c| own.min(c)))
            }
            None => config.delete_version_after(),
        }
    }

    /// Whether writes must carry a check-and-set version under `config`
    pub fn effective_cas_required(&self, config: &KvConfig) -> bool {
        self.cas_required || config.cas_required
    }
}

/// Metadata write. Only supplied fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteMetadataRequest {
    pub path: String,
    pub max_versions: Option<u32>,
    pub cas_required: Option<bool>,
    /// Seconds; zero clears the override, negative is rejected
    pub delete_version_after: Option<i64>,
    pub custom_metadata: Option<BTreeMap<String, String>>,
}

impl WriteMetadataRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_max_versions(mut self, max_versions: u32) -> Self {
        self.max_versions = Some(max_versions);
        self
    }

    pub fn with_cas_required(mut self, cas_required: bool) -> Self {
        self.cas_required = Some(cas_required);
        self
    }

    pub fn with_delete_version_after(mut self, seconds: i64) -> Self {
        self.delete_version_after = Some(seconds);
        self
    }

    pub fn with_custom_metadata(mut self, custom_metadata: BTreeMap<String, String>) -> Self {
        self.custom_metadata = Some(custom_metadata);
        self
    }

    /// Whether any field besides the path was supplied
    pub fn has_updates(&self) -> bool {
        self.max_versions.is_some()
            || self.cas_required.is_some()
            || self.delete_version_after.is_some()
            || self.custom_metadata.is_some()
    }
}

/// Backend configuration write. Only supplied fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteConfigRequest {
    pub max_versions: Option<u32>,
    pub cas_required: Option<bool>,
    /// Seconds; zero disables expiry, negative is rejected
    pub delete_version_after: Option<i64>,
}

/// Version data write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteDataRequest {
    pub path: String,
    pub data: Vec<u8>,
    /// Expected current version; 0 means the key must not have versions yet
    pub cas: Option<u64>,
}

impl WriteDataRequest {
    pub fn new(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
            cas: None,
        }
    }

    pub fn with_cas(mut self, expected_version: u64) -> Self {
        self.cas = Some(expected_version);
        self
    }
}

/// Outcome of an operation that can be rejected without a fault.
///
/// `error` carries a caller-facing validation message (4xx-equivalent);
/// `warnings` are informational and never block the operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response<T = ()> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Default for Response<T> {
    fn default() -> Self {
        Self {
            data: None,
            warnings: Vec::new(),
            error: None,
        }
    }
}

impl<T> Response<T> {
    /// Successful response without data
    pub fn empty() -> Self {
        Self::default()
    }

    /// Successful response carrying `data`
    pub fn with_data(data: T) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// Rejected request
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Caller-facing projection of a [`VersionMetadata`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionView {
    pub created_time: String,
    pub deletion_time: String,
    pub destroyed: bool,
}

impl From<&VersionMetadata> for VersionView {
    fn from(meta: &VersionMetadata) -> Self {
        Self {
            created_time: format_timestamp(Some(&meta.created_time)),
            deletion_time: format_timestamp(meta.deletion_time.as_ref()),
            destroyed: meta.destroyed,
        }
    }
}

/// Caller-facing projection of a [`KeyMetadata`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataView {
    /// Keyed by the version number rendered as text
    pub versions: BTreeMap<String, VersionView>,
    pub current_version: u64,
    pub oldest_version: u64,
    pub created_time: String,
    pub updated_time: String,
    pub max_versions: u32,
    pub cas_required: bool,
    /// Rendered duration such as `1h30m0s`
    pub delete_version_after: String,
    pub custom_metadata: BTreeMap<String, String>,
}

impl From<&KeyMetadata> for MetadataView {
    fn from(meta: &KeyMetadata) -> Self {
        Self {
            versions: meta
                .versions
                .iter()
                .map(|(version, v)| (version.to_string(), VersionView::from(v)))
                .collect(),
            current_version: meta.current_version,
            oldest_version: meta.oldest_version,
            created_time: format_timestamp(Some(&meta.created_time)),
            updated_time: format_timestamp(Some(&meta.updated_time)),
            max_versions: meta.max_versions,
            cas_required: meta.cas_required,
            delete_version_after: format_duration(Duration::from_secs(
                meta.delete_version_after.unwrap_or(0),
            )),
            custom_metadata: meta.custom_metadata.clone(),
        }
    }
}

/// A version number with its projected metadata, returned by data writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenVersion {
    pub version: u64,
    #[serde(flatten)]
    pub metadata: VersionView,
}

/// A version read back from the store.
///
/// `data` is `None` when the version is deleted, expired or destroyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretVersion {
    pub version: u64,
    pub data: Option<Vec<u8>>,
    pub metadata: VersionView,
    pub custom_metadata: BTreeMap<String, String>,
}

/// RFC 3339 with nanosecond precision where present, empty when unset
pub fn format_timestamp(ts: Option<&DateTime<Utc>>) -> String {
    ts.map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .unwrap_or_default()
}

/// Render whole seconds as `1h2m3s`, `4m5s`, `6s` or `0s`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
