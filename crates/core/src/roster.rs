//! Admin roster - rank-ordered cache of connected privileged players
//!
//! The roster holds one [`MembershipSnapshot`] per connected player whose
//! primary rank meets the admin cutoff. It backs ban authorization and the
//! witness list attached to ban submissions, so mutations from reconciliation
//! callbacks and reads from command execution race freely against each other.
//!
//! A single mutex guards a vector sorted rank-descending. Each entry is
//! tagged with the login session that produced it: reconciliation completions
//! can arrive out of order across a quick reconnect, and a completion from an
//! older session must never replace or evict the entry a newer session
//! inserted. Sessions are host-assigned, monotonically increasing per login.

use parking_lot::Mutex;

use crate::model::{MembershipSnapshot, PlayerId};

struct RosterEntry {
    snapshot: MembershipSnapshot,
    /// Login session that inserted this entry. Doubles as the rank tie-break:
    /// of two admins with equal rank, the one connected longer sorts first.
    session: u64,
}

/// Concurrent, rank-ordered collection of currently-connected privileged
/// players.
#[derive(Default)]
pub struct AdminRoster {
    entries: Mutex<Vec<RosterEntry>>,
}

impl AdminRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace-or-insert after a successful reconciliation.
    ///
    /// Any entry for the same player from `session` or older is removed
    /// first; the snapshot is then inserted iff its primary rank meets
    /// `admin_threshold_rank`. If a *newer* session already owns the entry,
    /// this call is a stale completion and leaves the roster untouched.
    /// Both steps happen under one lock acquisition.
    ///
    /// Returns true if this snapshot is cached afterwards.
    pub fn upsert(
        &self,
        snapshot: MembershipSnapshot,
        admin_threshold_rank: i32,
        session: u64,
    ) -> bool {
        let mut entries = self.entries.lock();

        if let Some(pos) = entries
            .iter()
            .position(|e| e.snapshot.player == snapshot.player)
        {
            if entries[pos].session > session {
                tracing::debug!(
                    "Stale snapshot for {} (session {} < {}), ignored",
                    snapshot.player,
                    session,
                    entries[pos].session
                );
                return false;
            }
            entries.remove(pos);
        }

        if snapshot.primary_group.rank < admin_threshold_rank {
            tracing::debug!(
                "Player {} below admin cutoff ({} < {}), not cached",
                snapshot.player,
                snapshot.primary_group.rank,
                admin_threshold_rank
            );
            return false;
        }

        let entry = RosterEntry { snapshot, session };
        let pos = entries
            .binary_search_by(|e| sort_key(e).cmp(&sort_key(&entry)))
            .unwrap_or_else(|pos| pos);
        entries.insert(pos, entry);
        true
    }

    /// Remove a player on disconnect, whatever session owns the entry.
    /// No-op if absent.
    pub fn remove(&self, player: PlayerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.snapshot.player != player);
        entries.len() != before
    }

    /// Remove a player's entry only if it belongs to `session` or an older
    /// one. Used by stale reconciliation completions, which must clean up
    /// after themselves without touching an entry a newer login owns.
    pub fn remove_session(&self, player: PlayerId, session: u64) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.snapshot.player != player || e.session > session);
        entries.len() != before
    }

    /// Look up the cached snapshot for a player.
    pub fn find(&self, player: PlayerId) -> Option<MembershipSnapshot> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.snapshot.player == player)
            .map(|e| e.snapshot.clone())
    }

    /// All cached snapshots, rank-descending (ties by connection order).
    pub fn snapshot_ordered(&self) -> Vec<MembershipSnapshot> {
        self.entries
            .lock()
            .iter()
            .map(|e| e.snapshot.clone())
            .collect()
    }

    /// The ids of the top `n` admins by rank.
    pub fn top(&self, n: usize) -> Vec<PlayerId> {
        self.entries
            .lock()
            .iter()
            .take(n)
            .map(|e| e.snapshot.player)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Sort key: rank descending, then login session ascending.
fn sort_key(entry: &RosterEntry) -> (i32, u64) {
    (-entry.snapshot.primary_group.rank, entry.session)
}
