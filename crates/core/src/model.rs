//! Core data model for the sync engine
//!
//! These types mirror what the Remote Authority reports about a player:
//! identity, group memberships, ban state and ban history. A
//! [`MembershipSnapshot`] is produced once per login or refresh request and
//! is immutable from that point on.

use std::fmt;
use std::time::{Duration, SystemTime};

use crate::remote::PERMANENT_BAN;

/// Stable 128-bit player identifier assigned by the game server.
///
/// Immutable for the lifetime of a session. Displayed as 32 lowercase hex
/// digits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u128);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Debug for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlayerId({:032x})", self.0)
    }
}

/// A named permission group with its numeric rank (higher = more privileged).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupRef {
    pub name: String,
    pub rank: i32,
}

impl GroupRef {
    pub fn new(name: impl Into<String>, rank: i32) -> Self {
        Self {
            name: name.into(),
            rank,
        }
    }
}

/// Point-in-time membership record for one player, as reported by the
/// Remote Authority.
///
/// Owned by the reconciliation that received it; never mutated.
#[derive(Debug, Clone)]
pub struct MembershipSnapshot {
    /// Remote user id. `0` means the player is unknown to the Remote
    /// Authority.
    pub user_id: u64,
    /// The in-game identity the snapshot was requested for.
    pub player: PlayerId,
    /// In-game display name at the time of the request.
    pub display_name: String,
    /// Name the player uses on the Remote Authority's forum.
    pub forum_name: String,
    /// Division lookup key (used against the division category map).
    pub division_key: String,
    /// Human-readable division name.
    pub division_name: String,
    /// The player's primary group.
    pub primary_group: GroupRef,
    /// All groups the player holds remotely, including ranks outside the
    /// primary hierarchy.
    pub groups: Vec<GroupRef>,
    /// Whether the player is a dedicated supporter.
    pub dedicated_supporter: bool,
    /// Supporter join message, if the player configured one.
    pub join_message: Option<String>,
}

impl MembershipSnapshot {
    /// True if `groups` holds an entry with the given rank, regardless of
    /// name.
    pub fn has_group_rank(&self, rank: i32) -> bool {
        self.groups.iter().any(|g| g.rank == rank)
    }
}

/// Result of a remote ban-status lookup.
#[derive(Debug, Clone)]
pub struct BanStatus {
    pub banned: bool,
    pub permanent: bool,
    /// Minutes until the ban expires. Meaningless when `permanent`.
    pub remaining_minutes: u32,
    pub reason: String,
}

impl BanStatus {
    /// A status describing a player with no active ban.
    pub fn not_banned() -> Self {
        Self {
            banned: false,
            permanent: false,
            remaining_minutes: 0,
            reason: String::new(),
        }
    }
}

/// One record from the remote ban history.
#[derive(Debug, Clone)]
pub struct BanHistoryEntry {
    /// When the ban was issued, seconds since the Unix epoch.
    pub date_epoch_seconds: i64,
    /// Original ban length in minutes, `0` for permanent.
    pub length_minutes: u32,
    /// Minutes left on the ban at query time.
    pub remaining_minutes: u32,
    pub reason: String,
}

/// A locally enforced ban, created only when the remote ban submission
/// fails. Removed once the Remote Authority later confirms the ban.
#[derive(Debug, Clone)]
pub struct LocalBanRecord {
    pub target: PlayerId,
    pub target_name: String,
    pub reason: String,
    pub start: SystemTime,
    /// `None` = permanent.
    pub expires: Option<SystemTime>,
}

impl LocalBanRecord {
    /// Build a record starting at `now`. `duration_minutes == 0` produces a
    /// permanent ban.
    pub fn new(
        target: PlayerId,
        target_name: impl Into<String>,
        reason: impl Into<String>,
        duration_minutes: u32,
        now: SystemTime,
    ) -> Self {
        let expires = (duration_minutes != PERMANENT_BAN)
            .then(|| now + Duration::from_secs(u64::from(duration_minutes) * 60));
        Self {
            target,
            target_name: target_name.into(),
            reason: reason.into(),
            start: now,
            expires,
        }
    }

    /// True if the ban has an expiration that has already passed.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        match self.expires {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    /// Time left on the ban at `now`. `None` = permanent.
    pub fn remaining(&self, now: SystemTime) -> Option<Duration> {
        self.expires
            .map(|expires| expires.duration_since(now).unwrap_or(Duration::ZERO))
    }
}
