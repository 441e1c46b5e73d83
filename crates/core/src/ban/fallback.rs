//! Local-fallback ban coordination
//!
//! When the Remote Authority cannot record a ban, the ban must still be
//! enforced: an equivalent record goes into the host ban store and the
//! target's session is terminated. `LocalFallbackBanned` is a degraded state
//! pending eventual remote consistency, not a terminal error: the periodic
//! push sweep re-submits local bans and removes each one once the service
//! confirms it.

use std::sync::Arc;
use std::time::SystemTime;

use crate::host::{BanStore, SessionControl};
use crate::model::{LocalBanRecord, PlayerId};
use crate::remote::{BanSubmission, RemoteAuthority, RemoteError, PERMANENT_BAN};

/// How a ban request ended up being enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanOutcome {
    /// The Remote Authority recorded the ban.
    Remote,
    /// The remote submission failed; the ban is enforced locally until the
    /// service confirms it.
    LocalFallback,
}

/// Keeps local ban enforcement consistent with the Remote Authority.
pub struct BanFallbackCoordinator {
    bans: Arc<dyn BanStore>,
    sessions: Arc<dyn SessionControl>,
}

impl BanFallbackCoordinator {
    pub fn new(bans: Arc<dyn BanStore>, sessions: Arc<dyn SessionControl>) -> Self {
        Self { bans, sessions }
    }

    /// Handle the result of a remote ban submission.
    ///
    /// On success any stale local record for the target is dropped. On
    /// failure an equivalent local ban is stored. Either way a connected
    /// target is kicked with a message derived from `reason`.
    pub fn on_remote_ban_result(
        &self,
        target: PlayerId,
        target_name: &str,
        reason: &str,
        duration_minutes: u32,
        result: Result<bool, RemoteError>,
    ) -> BanOutcome {
        let outcome = match result {
            Ok(true) => {
                // Avoid double-enforcement once the service holds the ban.
                self.bans.remove_ban(target);
                BanOutcome::Remote
            }
            Ok(false) | Err(_) => {
                if let Err(error) = &result {
                    tracing::error!("Remote ban of {} failed: {}", target, error);
                } else {
                    tracing::error!("Remote ban of {} reported failure", target);
                }
                let record = LocalBanRecord::new(
                    target,
                    target_name,
                    reason,
                    duration_minutes,
                    SystemTime::now(),
                );
                self.bans.add_ban(record);
                BanOutcome::LocalFallback
            }
        };

        if self.sessions.is_connected(target) {
            self.sessions.kick(target, reason);
        }
        outcome
    }

    /// Handle a confirmed remote unban: the local record, if any, must go
    /// too.
    pub fn on_remote_unban_confirmed(&self, target: PlayerId) {
        if self.bans.remove_ban(target) {
            tracing::info!("Dropped local ban for {} after remote unban", target);
        }
    }

    /// Re-submit every still-active local ban to the Remote Authority and
    /// drop each record the service confirms. Intended to run periodically
    /// from the host scheduler.
    ///
    /// Returns the number of bans the service accepted.
    pub fn push_pending(&self, remote: &dyn RemoteAuthority) -> usize {
        let now = SystemTime::now();
        let mut pushed = 0;

        for record in self.bans.local_bans() {
            if record.is_expired(now) {
                continue;
            }
            let submission = BanSubmission {
                target: record.target,
                target_name: record.target_name.clone(),
                actor: None,
                witnesses: Vec::new(),
                duration_minutes: remaining_minutes(&record, now),
                reason: record.reason.clone(),
            };
            match remote.submit_ban(submission) {
                Ok(true) => {
                    self.bans.remove_ban(record.target);
                    pushed += 1;
                }
                Ok(false) => {
                    tracing::warn!("Remote still refuses ban for {}", record.target);
                }
                Err(error) => {
                    tracing::warn!("Pushing local ban for {} failed: {}", record.target, error);
                }
            }
        }
        pushed
    }
}

/// Remaining minutes to submit for a local ban, rounded up so a ban with
/// under a minute left is never mistaken for a permanent one.
fn remaining_minutes(record: &LocalBanRecord, now: SystemTime) -> u32 {
    match record.remaining(now) {
        Some(remaining) => u32::try_from(remaining.as_secs().div_ceil(60)).unwrap_or(u32::MAX),
        None => PERMANENT_BAN,
    }
}
