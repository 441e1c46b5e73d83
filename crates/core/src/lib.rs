//! RankSync - admin roster and ban synchronization core
//!
//! This crate keeps a game server's permission groups, admin roster and ban
//! enforcement in sync with a Remote Authority membership service. The host
//! server integrates by implementing the collaborator traits in [`host`] and
//! [`remote`] and driving a [`SyncEngine`] from its connection events and
//! commands.
//!
//! # Layout
//!
//! - [`model`] - snapshot and ban data types shared across the crate
//! - [`config`] - TOML configuration, compiled category maps, hot reload
//! - [`roster`] - rank-ordered cache of connected privileged players
//! - [`reconcile`] - permission-group delta computation and application
//! - [`ban`] - ban authorization rule and local-fallback coordination
//! - [`remote`] - the Remote Authority client contract
//! - [`host`] - host-server collaborator contracts
//! - [`engine`] - the [`SyncEngine`] tying it all together

pub mod ban;
pub mod config;
pub mod engine;
pub mod host;
pub mod model;
pub mod reconcile;
pub mod remote;
pub mod roster;

// Re-export commonly used items
pub use ban::{may_ban, BanFallbackCoordinator, BanOutcome};
pub use config::{AuthFailPolicy, Config, ConfigError, ConfigHandle, SyncConfig};
pub use engine::{AuthDecision, EngineError, SyncEngine};
pub use host::{BanStore, MemoryBanStore, PermissionBackend, SessionControl};
pub use model::{
    BanHistoryEntry, BanStatus, GroupRef, LocalBanRecord, MembershipSnapshot, PlayerId,
};
pub use remote::{
    BanSubmission, RemoteAuthority, RemoteError, RemoteResult, MAX_BAN_WITNESSES, PERMANENT_BAN,
};
pub use roster::AdminRoster;
