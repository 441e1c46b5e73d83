//! Remote Authority client contract
//!
//! The Remote Authority is the source of truth for player rank, division,
//! secondary roles, supporter status and ban records. This module defines the
//! client-side trait the sync engine consumes; the wire format, retries and
//! TLS are owned by the implementing HTTP client.
//!
//! Implementations perform blocking I/O and are only ever invoked from worker
//! threads spawned by the engine, never from the game-simulation thread.

use std::net::IpAddr;

use crate::model::{BanHistoryEntry, BanStatus, MembershipSnapshot, PlayerId};

/// Ban duration value meaning "permanent".
pub const PERMANENT_BAN: u32 = 0;

/// Maximum number of witness admins attached to a ban submission.
pub const MAX_BAN_WITNESSES: usize = 10;

/// Errors reported by the Remote Authority client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    /// The request never produced a usable response.
    #[error("remote authority transport error: {0}")]
    Transport(String),

    /// The service answered but refused the request.
    #[error("remote authority rejected the request: {0}")]
    Rejected(String),

    /// The client gave up waiting for a response.
    #[error("remote authority request timed out")]
    Timeout,
}

/// Result type for remote calls
pub type RemoteResult<T> = Result<T, RemoteError>;

/// A ban request forwarded to the Remote Authority.
#[derive(Debug, Clone)]
pub struct BanSubmission {
    pub target: PlayerId,
    pub target_name: String,
    /// `None` when the ban originates from the server console; the service
    /// substitutes its configured default admin.
    pub actor: Option<PlayerId>,
    /// Up to [`MAX_BAN_WITNESSES`] admins connected at submission time,
    /// rank-descending.
    pub witnesses: Vec<PlayerId>,
    /// Minutes; [`PERMANENT_BAN`] means permanent.
    pub duration_minutes: u32,
    pub reason: String,
}

/// Client-side view of the Remote Authority service.
pub trait RemoteAuthority: Send + Sync {
    /// Fetch the membership snapshot for a player. `address` is forwarded
    /// for the service's own bookkeeping; `force_refresh` bypasses any
    /// service-side cache.
    fn get_membership(
        &self,
        player: PlayerId,
        address: Option<IpAddr>,
        force_refresh: bool,
    ) -> RemoteResult<MembershipSnapshot>;

    /// Fetch the current ban status for a player.
    fn get_ban_status(&self, player: PlayerId) -> RemoteResult<BanStatus>;

    /// Submit a ban. `Ok(false)` means the service processed the request but
    /// did not record the ban.
    fn submit_ban(&self, submission: BanSubmission) -> RemoteResult<bool>;

    /// Fetch up to `max_records` past bans, most recent first.
    fn get_ban_history(
        &self,
        player: PlayerId,
        max_records: u32,
    ) -> RemoteResult<Vec<BanHistoryEntry>>;
}
