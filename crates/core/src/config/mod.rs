//! Configuration for the sync engine
//!
//! The on-disk format is TOML deserialized into [`SyncConfig`] via serde.
//! [`SyncConfig::load`] creates a default file when none exists, matching how
//! the host typically ships plugin configs.
//!
//! Rank-keyed category maps are written with string keys (TOML table keys
//! are always strings) and compiled into numeric maps by [`Config::compile`].
//! A malformed rank key disables that category with a loud warning rather
//! than failing the whole load.
//!
//! Reload never mutates a live config in place: [`ConfigHandle`] hands out
//! `Arc<Config>` snapshots and replaces the whole snapshot atomically.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Configuration system errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write the config file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML content
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config to TOML
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// `ConfigHandle::initialize` called twice
    #[error("Config handle already initialized")]
    AlreadyInitialized,

    /// A config snapshot was requested before initialization
    #[error("Config handle not initialized")]
    NotInitialized,
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Policy applied when the synchronous auth-time ban check does not resolve
/// within the configured timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailPolicy {
    /// Let the player in; a remote outage must not lock everyone out.
    Open,
    /// Refuse the connection until the Remote Authority answers.
    Closed,
}

/// Connection details for the Remote Authority client. Opaque to this crate;
/// passed through to the remote client collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub url: String,
    pub key: String,
    pub server_address: String,
}

/// Raw on-disk configuration.
///
/// Category maps are keyed by strings: primary and secondary keys must parse
/// as integer ranks, division keys are opaque division identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub api: ApiConfig,

    /// Minimum primary rank for a connected player to be cached in the
    /// admin roster.
    pub admin_threshold_rank: i32,
    /// Players at or above this primary rank can only be banned by actors
    /// at or above it.
    pub ban_rank_threshold: i32,

    pub use_primary_groups: bool,
    pub primary_groups: BTreeMap<String, String>,
    pub use_division_groups: bool,
    pub division_groups: BTreeMap<String, String>,
    pub use_secondary_groups: bool,
    pub secondary_groups: BTreeMap<String, String>,

    pub use_ds_group: bool,
    pub ds_group: String,
    pub use_no_group: bool,
    pub no_group_group: String,

    /// Maximum ban-history records to request from the Remote Authority.
    pub ban_history_records: u32,
    /// Whether the host's native ban command should be overridden.
    pub override_ban_command: bool,

    /// Bound on the synchronous auth-time ban check.
    pub auth_timeout_ms: u64,
    pub auth_fail_policy: AuthFailPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            admin_threshold_rank: 40,
            ban_rank_threshold: 50,
            use_primary_groups: true,
            primary_groups: BTreeMap::new(),
            use_division_groups: true,
            division_groups: BTreeMap::new(),
            use_secondary_groups: true,
            secondary_groups: BTreeMap::new(),
            use_ds_group: true,
            ds_group: "supporter".to_string(),
            use_no_group: true,
            no_group_group: "guest".to_string(),
            ban_history_records: 5,
            override_ban_command: false,
            auth_timeout_ms: 5_000,
            auth_fail_policy: AuthFailPolicy::Open,
        }
    }
}

impl SyncConfig {
    /// Load config from `path`, creating a default file if missing.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            tracing::debug!("Loaded config from {:?}", path);
            Ok(config)
        } else {
            let default = Self::default();
            default.save(path)?;
            tracing::info!("Created default config at {:?}", path);
            Ok(default)
        }
    }

    /// Save config to `path`, creating parent directories if needed.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!("Saved config to {:?}", path);
        Ok(())
    }
}

/// A compiled rank-keyed category map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankGroupMap {
    entries: BTreeMap<i32, String>,
}

impl RankGroupMap {
    pub fn get(&self, rank: i32) -> Option<&str> {
        self.entries.get(&rank).map(String::as_str)
    }

    /// Iterate `(rank, group name)` pairs in ascending rank order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &str)> {
        self.entries.iter().map(|(rank, name)| (*rank, name.as_str()))
    }

    /// Iterate over mapped group names.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn from_entries(entries: impl IntoIterator<Item = (i32, &'static str)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(rank, name)| (rank, name.to_string()))
                .collect(),
        }
    }
}

/// Compiled, immutable view of [`SyncConfig`] used by the reconciler and the
/// engine. A disabled or malformed category compiles to `None`.
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub admin_threshold_rank: i32,
    pub ban_rank_threshold: i32,
    pub primary_groups: Option<RankGroupMap>,
    pub division_groups: Option<HashMap<String, String>>,
    pub secondary_groups: Option<RankGroupMap>,
    /// `Some(group)` when the ds category is enabled.
    pub ds_group: Option<String>,
    /// `Some(group)` when no-group fallback handling is enabled.
    pub no_group_group: Option<String>,
    pub ban_history_records: u32,
    pub override_ban_command: bool,
    pub auth_timeout: Duration,
    pub auth_fail_policy: AuthFailPolicy,
}

impl Config {
    /// Compile the raw config, disabling any rank-keyed category whose keys
    /// do not all parse as integers.
    pub fn compile(raw: SyncConfig) -> Self {
        let primary_groups = raw
            .use_primary_groups
            .then(|| compile_rank_map("primary", &raw.primary_groups))
            .flatten();
        let secondary_groups = raw
            .use_secondary_groups
            .then(|| compile_rank_map("secondary", &raw.secondary_groups))
            .flatten();
        let division_groups = raw.use_division_groups.then(|| {
            raw.division_groups
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<HashMap<_, _>>()
        });

        Self {
            api: raw.api,
            admin_threshold_rank: raw.admin_threshold_rank,
            ban_rank_threshold: raw.ban_rank_threshold,
            primary_groups,
            division_groups,
            secondary_groups,
            ds_group: raw.use_ds_group.then_some(raw.ds_group),
            no_group_group: raw.use_no_group.then_some(raw.no_group_group),
            ban_history_records: raw.ban_history_records,
            override_ban_command: raw.override_ban_command,
            auth_timeout: Duration::from_millis(raw.auth_timeout_ms),
            auth_fail_policy: raw.auth_fail_policy,
        }
    }
}

/// Parse a string-keyed category map into a rank-keyed one. Returns `None`
/// (category disabled) if any key is non-numeric.
fn compile_rank_map(category: &str, raw: &BTreeMap<String, String>) -> Option<RankGroupMap> {
    let mut entries = BTreeMap::new();
    for (key, group) in raw {
        match key.trim().parse::<i32>() {
            Ok(rank) => {
                entries.insert(rank, group.clone());
            }
            Err(_) => {
                tracing::error!(
                    "Malformed rank key '{}' in the {} group map; disabling that category",
                    key,
                    category
                );
                return None;
            }
        }
    }
    Some(RankGroupMap { entries })
}

/// Shared handle to the current config snapshot.
///
/// `initialize` may be called exactly once per handle; calling it again is a
/// programming error and is reported as such. Reload replaces the whole
/// snapshot; readers holding an older `Arc<Config>` finish their operation
/// against a consistent view.
#[derive(Default)]
pub struct ConfigHandle {
    current: RwLock<Option<Arc<Config>>>,
}

impl ConfigHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the first config snapshot.
    pub fn initialize(&self, config: Config) -> ConfigResult<()> {
        let mut slot = self.current.write();
        if slot.is_some() {
            tracing::error!("ConfigHandle initialized twice");
            return Err(ConfigError::AlreadyInitialized);
        }
        *slot = Some(Arc::new(config));
        Ok(())
    }

    /// Atomically replace the snapshot (hot reload).
    pub fn replace(&self, config: Config) -> ConfigResult<()> {
        let mut slot = self.current.write();
        if slot.is_none() {
            return Err(ConfigError::NotInitialized);
        }
        *slot = Some(Arc::new(config));
        tracing::info!("Config snapshot replaced");
        Ok(())
    }

    /// Get the current snapshot.
    pub fn snapshot(&self) -> ConfigResult<Arc<Config>> {
        self.current
            .read()
            .clone()
            .ok_or(ConfigError::NotInitialized)
    }
}
