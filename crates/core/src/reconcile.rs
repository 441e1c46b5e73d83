//! Group reconciliation
//!
//! Given a player's [`MembershipSnapshot`] and the groups they currently hold
//! on the host, compute the grant/revoke delta that brings the host in line
//! with the Remote Authority, per category:
//!
//! - **primary**: exactly one of a mapped primary group, the no-group
//!   fallback, or nothing is held afterwards, never both a mapped group and
//!   the fallback.
//! - **division**: at most one mapped division group is held afterwards.
//! - **secondary**: independently idempotent per key; a player may hold any
//!   number of secondary groups.
//! - **dedicated supporter**: the ds group is held iff the snapshot says so.
//!
//! The delta is computed as `desired` minus `held` against each category's
//! universe of mapped names, which makes a second run over unchanged state
//! produce an empty delta by construction.

use std::collections::{BTreeSet, HashSet};

use crate::config::Config;
use crate::host::PermissionBackend;
use crate::model::MembershipSnapshot;

/// What to do with one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupAction {
    Grant,
    Revoke,
}

/// Which category map produced a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupCategory {
    Primary,
    Division,
    Secondary,
    DedicatedSupporter,
}

/// One element of the reconciliation delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupChange {
    pub category: GroupCategory,
    pub group: String,
    pub action: GroupAction,
}

/// Result of reconciling one snapshot.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    pub changes: Vec<GroupChange>,
    /// Join broadcast to send, present only on login-triggered
    /// reconciliations of a confirmed dedicated supporter.
    pub announce: Option<String>,
}

impl ReconcileOutcome {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Compute the permission-group delta for a snapshot.
///
/// `held` is the set of group names the player currently has on the host.
/// `is_login` distinguishes a login-triggered reconciliation from an explicit
/// refresh; only the former may announce the join.
pub fn reconcile(
    config: &Config,
    snapshot: &MembershipSnapshot,
    held: &HashSet<String>,
    is_login: bool,
) -> ReconcileOutcome {
    let mut changes = Vec::new();

    if let Some(primary) = &config.primary_groups {
        let matched = primary.get(snapshot.primary_group.rank);

        // Universe: every mapped primary name plus the fallback. Desired:
        // the matched group, or the fallback when nothing matches.
        let mut universe: BTreeSet<&str> = primary.group_names().collect();
        let mut desired: BTreeSet<&str> = matched.into_iter().collect();
        if let Some(fallback) = &config.no_group_group {
            universe.insert(fallback);
            if matched.is_none() {
                desired.insert(fallback);
            }
        }
        push_category_delta(&mut changes, GroupCategory::Primary, &universe, &desired, held);
    }

    if let Some(division) = &config.division_groups {
        let universe: BTreeSet<&str> = division.values().map(String::as_str).collect();
        let desired: BTreeSet<&str> = division
            .get(&snapshot.division_key)
            .map(String::as_str)
            .into_iter()
            .collect();
        push_category_delta(&mut changes, GroupCategory::Division, &universe, &desired, held);
    }

    if let Some(secondary) = &config.secondary_groups {
        let universe: BTreeSet<&str> = secondary.group_names().collect();
        let desired: BTreeSet<&str> = secondary
            .iter()
            .filter(|(rank, _)| snapshot.has_group_rank(*rank))
            .map(|(_, name)| name)
            .collect();
        push_category_delta(
            &mut changes,
            GroupCategory::Secondary,
            &universe,
            &desired,
            held,
        );
    }

    let mut announce = None;
    if let Some(ds_group) = &config.ds_group {
        let universe: BTreeSet<&str> = [ds_group.as_str()].into();
        let desired: BTreeSet<&str> = if snapshot.dedicated_supporter {
            universe.clone()
        } else {
            BTreeSet::new()
        };
        push_category_delta(
            &mut changes,
            GroupCategory::DedicatedSupporter,
            &universe,
            &desired,
            held,
        );

        // Announce once per login, never on a refresh replay.
        if is_login && snapshot.dedicated_supporter {
            let name = &snapshot.display_name;
            announce = Some(match &snapshot.join_message {
                Some(message) => format!("{name} has joined the game : {message}"),
                None => format!("{name} has joined the game"),
            });
        }
    }

    ReconcileOutcome { changes, announce }
}

/// Apply a delta through the host permission backend.
pub fn apply(
    backend: &dyn PermissionBackend,
    snapshot: &MembershipSnapshot,
    outcome: &ReconcileOutcome,
) {
    for change in &outcome.changes {
        match change.action {
            GroupAction::Grant => {
                tracing::debug!(
                    "Granting {:?} group '{}' to {}",
                    change.category,
                    change.group,
                    snapshot.player
                );
                backend.grant(snapshot.player, &change.group);
            }
            GroupAction::Revoke => {
                tracing::debug!(
                    "Revoking {:?} group '{}' from {}",
                    change.category,
                    change.group,
                    snapshot.player
                );
                backend.revoke(snapshot.player, &change.group);
            }
        }
    }
}

/// Emit grants for `desired - held` and revokes for
/// `(universe ∩ held) - desired`.
fn push_category_delta(
    changes: &mut Vec<GroupChange>,
    category: GroupCategory,
    universe: &BTreeSet<&str>,
    desired: &BTreeSet<&str>,
    held: &HashSet<String>,
) {
    for group in universe {
        let has = held.contains(*group);
        let wants = desired.contains(group);
        if wants && !has {
            changes.push(GroupChange {
                category,
                group: (*group).to_string(),
                action: GroupAction::Grant,
            });
        } else if !wants && has {
            changes.push(GroupChange {
                category,
                group: (*group).to_string(),
                action: GroupAction::Revoke,
            });
        }
    }
}
