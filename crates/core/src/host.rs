//! Host-server collaborator contracts
//!
//! The engine never talks to the game server directly; it goes through these
//! traits. The host permission backend stores named groups and is assumed
//! synchronous and idempotent at this boundary; the engine does not retry
//! its writes.

use dashmap::DashMap;

use std::collections::HashSet;

use crate::model::{LocalBanRecord, PlayerId};

/// The host permission-backend plugin (the component that actually stores
/// and grants named permission groups).
pub trait PermissionBackend: Send + Sync {
    /// Groups the player currently holds on the host.
    fn groups_of(&self, player: PlayerId) -> HashSet<String>;

    fn grant(&self, player: PlayerId, group: &str);

    fn revoke(&self, player: PlayerId, group: &str);
}

/// Host-native ban storage, used for fallback bans when the remote
/// submission fails.
pub trait BanStore: Send + Sync {
    /// Store a ban, replacing any existing record for the same target.
    fn add_ban(&self, record: LocalBanRecord);

    /// Remove the ban for a target. No-op if absent.
    fn remove_ban(&self, target: PlayerId) -> bool;

    fn find_ban(&self, target: PlayerId) -> Option<LocalBanRecord>;

    /// All stored bans, in no particular order.
    fn local_bans(&self) -> Vec<LocalBanRecord>;
}

/// Session-level operations on connected players.
pub trait SessionControl: Send + Sync {
    fn is_connected(&self, player: PlayerId) -> bool;

    /// Terminate a player's session with the given message.
    fn kick(&self, player: PlayerId, message: &str);

    /// Send a chat message to every connected player.
    fn broadcast(&self, message: &str);
}

/// In-memory [`BanStore`] for hosts without native ban storage.
///
/// Not persisted across restarts.
#[derive(Default)]
pub struct MemoryBanStore {
    bans: DashMap<PlayerId, LocalBanRecord>,
}

impl MemoryBanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BanStore for MemoryBanStore {
    fn add_ban(&self, record: LocalBanRecord) {
        self.bans.insert(record.target, record);
    }

    fn remove_ban(&self, target: PlayerId) -> bool {
        self.bans.remove(&target).is_some()
    }

    fn find_ban(&self, target: PlayerId) -> Option<LocalBanRecord> {
        self.bans.get(&target).map(|r| r.clone())
    }

    fn local_bans(&self) -> Vec<LocalBanRecord> {
        self.bans.iter().map(|r| r.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    #[test]
    fn test_memory_ban_store_replaces_existing() {
        let store = MemoryBanStore::new();
        let now = SystemTime::now();
        store.add_ban(LocalBanRecord::new(PlayerId(1), "T", "first", 10, now));
        store.add_ban(LocalBanRecord::new(PlayerId(1), "T", "second", 0, now));

        let stored = store.find_ban(PlayerId(1)).unwrap();
        assert_eq!(stored.reason, "second");
        assert!(stored.expires.is_none());
        assert_eq!(store.local_bans().len(), 1);
    }

    #[test]
    fn test_memory_ban_store_remove() {
        let store = MemoryBanStore::new();
        store.add_ban(LocalBanRecord::new(
            PlayerId(1),
            "T",
            "r",
            0,
            SystemTime::now(),
        ));
        assert!(store.remove_ban(PlayerId(1)));
        assert!(!store.remove_ban(PlayerId(1)));
        assert!(store.find_ban(PlayerId(1)).is_none());
    }
}
