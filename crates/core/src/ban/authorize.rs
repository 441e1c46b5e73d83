//! Ban authorization rule
//!
//! A rank-threshold check over the admin roster. Pure: it reads roster
//! snapshots at call time and never mutates anything.

use crate::model::PlayerId;
use crate::roster::AdminRoster;

/// Decide whether `actor` may ban `target`.
///
/// Rule, in order:
/// 1. A non-player actor (console/system) may always ban.
/// 2. A target absent from the roster is below the admin cutoff or unknown,
///    hence bannable.
/// 3. An actor absent from the roster cannot ban a cached target.
/// 4. Otherwise deny iff the target is at or above `ban_rank_threshold`
///    while the actor is below it.
pub fn may_ban(
    roster: &AdminRoster,
    actor: Option<PlayerId>,
    target: PlayerId,
    ban_rank_threshold: i32,
) -> bool {
    let Some(actor) = actor else {
        return true;
    };
    let Some(target_entry) = roster.find(target) else {
        return true;
    };
    let Some(actor_entry) = roster.find(actor) else {
        return false;
    };
    !(target_entry.primary_group.rank >= ban_rank_threshold
        && actor_entry.primary_group.rank < ban_rank_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GroupRef, MembershipSnapshot};

    fn snapshot(id: u128, rank: i32) -> MembershipSnapshot {
        MembershipSnapshot {
            user_id: id as u64,
            player: PlayerId(id),
            display_name: format!("p{id}"),
            forum_name: format!("p{id}"),
            division_key: String::new(),
            division_name: String::new(),
            primary_group: GroupRef::new("g", rank),
            groups: vec![GroupRef::new("g", rank)],
            dedicated_supporter: false,
            join_message: None,
        }
    }

    fn roster_with(entries: &[(u128, i32)]) -> AdminRoster {
        let roster = AdminRoster::new();
        for (session, (id, rank)) in entries.iter().enumerate() {
            roster.upsert(snapshot(*id, *rank), 0, session as u64);
        }
        roster
    }

    #[test]
    fn test_console_may_always_ban() {
        let roster = roster_with(&[(1, 90)]);
        assert!(may_ban(&roster, None, PlayerId(1), 50));
    }

    #[test]
    fn test_uncached_target_is_bannable() {
        let roster = roster_with(&[(1, 40)]);
        assert!(may_ban(&roster, Some(PlayerId(1)), PlayerId(2), 50));
    }

    #[test]
    fn test_uncached_actor_cannot_ban_cached_target() {
        let roster = roster_with(&[(2, 10)]);
        assert!(!may_ban(&roster, Some(PlayerId(1)), PlayerId(2), 50));
    }

    #[test]
    fn test_low_actor_cannot_ban_high_target() {
        // Scenario A: threshold 50, actor 40, target 60.
        let roster = roster_with(&[(1, 40), (2, 60)]);
        assert!(!may_ban(&roster, Some(PlayerId(1)), PlayerId(2), 50));
    }

    #[test]
    fn test_high_actor_may_ban_any_target() {
        // Scenario B: threshold 50, actor 60, target 90.
        let roster = roster_with(&[(1, 60), (2, 90)]);
        assert!(may_ban(&roster, Some(PlayerId(1)), PlayerId(2), 50));
    }

    #[test]
    fn test_threshold_symmetry_over_rank_pairs() {
        for actor_rank in [0, 30, 49, 50, 51, 100] {
            for target_rank in [0, 30, 49, 50, 51, 100] {
                let roster = roster_with(&[(1, actor_rank), (2, target_rank)]);
                let allowed = may_ban(&roster, Some(PlayerId(1)), PlayerId(2), 50);
                let expected = !(target_rank >= 50 && actor_rank < 50);
                assert_eq!(
                    allowed, expected,
                    "actor {actor_rank} vs target {target_rank}"
                );
            }
        }
    }

    #[test]
    fn test_authorization_does_not_mutate_roster() {
        let roster = roster_with(&[(1, 40), (2, 60)]);
        may_ban(&roster, Some(PlayerId(1)), PlayerId(2), 50);
        assert_eq!(roster.len(), 2);
    }
}
