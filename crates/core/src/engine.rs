//! Sync engine - connection lifecycle, reconciliation scheduling and ban flow
//!
//! One [`SyncEngine`] exists per server process. The host calls into it from
//! the game-simulation thread (connection events, command execution); the
//! engine spawns worker threads for Remote Authority calls and applies their
//! results from those threads. Everything shared between the two sides
//! (roster, config snapshot, connection generations) is behind its own lock.
//!
//! The only synchronous remote call is the authentication-time ban check: a
//! banned player must never reach the connected state, so the gate blocks on
//! the result, with a bounded timeout and an operator-chosen
//! fail-open/fail-closed policy instead of waiting forever.

use std::net::IpAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;

use crate::ban::{self, BanFallbackCoordinator, BanOutcome};
use crate::config::{AuthFailPolicy, Config, ConfigError, ConfigHandle, SyncConfig};
use crate::host::{BanStore, PermissionBackend, SessionControl};
use crate::model::{BanHistoryEntry, BanStatus, LocalBanRecord, MembershipSnapshot, PlayerId};
use crate::reconcile;
use crate::remote::{BanSubmission, RemoteAuthority, RemoteResult, MAX_BAN_WITNESSES};
use crate::roster::AdminRoster;

/// Engine-level errors surfaced to the host command layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The acting player is not allowed to ban the target.
    #[error("actor is not authorized to ban that player")]
    BanNotAuthorized,

    /// The operation requires a connected player.
    #[error("player is not connected")]
    NotConnected,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Remote(#[from] crate::remote::RemoteError),
}

/// Verdict of the authentication gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Allow,
    /// Refuse the connection, showing the player this message.
    Deny(String),
}

/// The integration core: admin roster, group reconciliation and ban flow,
/// kept in sync with the Remote Authority.
pub struct SyncEngine {
    config: ConfigHandle,
    roster: AdminRoster,
    remote: Arc<dyn RemoteAuthority>,
    permissions: Arc<dyn PermissionBackend>,
    sessions: Arc<dyn SessionControl>,
    bans: Arc<dyn BanStore>,
    fallback: BanFallbackCoordinator,
    /// Current connection generation per player. A reconciliation completion
    /// carrying a stale generation lost a race with a disconnect (or a
    /// re-login) and must not leave a roster entry behind.
    connections: DashMap<PlayerId, u64>,
    next_generation: AtomicU64,
}

impl SyncEngine {
    /// Build the engine with an initial config snapshot and the host/remote
    /// collaborators.
    pub fn new(
        config: Config,
        remote: Arc<dyn RemoteAuthority>,
        permissions: Arc<dyn PermissionBackend>,
        bans: Arc<dyn BanStore>,
        sessions: Arc<dyn SessionControl>,
    ) -> Result<Arc<Self>, EngineError> {
        let handle = ConfigHandle::new();
        handle.initialize(config)?;
        Ok(Arc::new(Self {
            config: handle,
            roster: AdminRoster::new(),
            remote,
            permissions: Arc::clone(&permissions),
            sessions: Arc::clone(&sessions),
            bans: Arc::clone(&bans),
            fallback: BanFallbackCoordinator::new(bans, sessions),
            connections: DashMap::new(),
            next_generation: AtomicU64::new(1),
        }))
    }

    /// Current config snapshot, for host plumbing (e.g. the
    /// `override_ban_command` flag).
    pub fn config(&self) -> Result<Arc<Config>, EngineError> {
        Ok(self.config.snapshot()?)
    }

    /// Reload configuration from disk, atomically replacing the snapshot.
    pub fn reload_config(&self, path: &Path) -> Result<(), EngineError> {
        let raw = SyncConfig::load(path)?;
        self.config.replace(Config::compile(raw))?;
        Ok(())
    }

    // === Connection lifecycle ===

    /// Authentication gate: decide whether the connecting player may proceed.
    ///
    /// Blocks up to the configured timeout for the remote ban check. A fast
    /// remote error is treated as "not banned" (a remote outage must not
    /// lock out every player); a timeout follows the configured policy.
    /// Either way a live local fallback ban still denies entry.
    pub fn handle_authenticate(&self, player: PlayerId) -> Result<AuthDecision, EngineError> {
        let config = self.config.snapshot()?;

        let (tx, rx) = crossbeam_channel::bounded(1);
        let remote = Arc::clone(&self.remote);
        std::thread::spawn(move || {
            // The receiver is gone if the gate timed out; nothing to do.
            let _ = tx.send(remote.get_ban_status(player));
        });

        let decision = match rx.recv_timeout(config.auth_timeout) {
            Ok(Ok(status)) if status.banned => AuthDecision::Deny(remote_ban_message(&status)),
            Ok(Ok(_)) => self.local_ban_decision(player),
            Ok(Err(error)) => {
                tracing::warn!(
                    "Ban check for {} failed ({}); treating as not banned",
                    player,
                    error
                );
                self.local_ban_decision(player)
            }
            Err(_) => match config.auth_fail_policy {
                AuthFailPolicy::Open => {
                    tracing::warn!("Ban check for {} timed out; failing open", player);
                    self.local_ban_decision(player)
                }
                AuthFailPolicy::Closed => {
                    tracing::warn!("Ban check for {} timed out; failing closed", player);
                    AuthDecision::Deny(
                        "Could not verify your ban status, please try again later.".to_string(),
                    )
                }
            },
        };
        Ok(decision)
    }

    /// Login hook: start the asynchronous membership fetch and group
    /// reconciliation. The player finishes connecting without waiting;
    /// until the snapshot arrives they hold their previous permissions.
    pub fn handle_login(self: &Arc<Self>, player: PlayerId, address: Option<IpAddr>) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        self.connections.insert(player, generation);

        let engine = Arc::clone(self);
        std::thread::spawn(move || {
            engine.fetch_and_reconcile(player, address, generation, true, false);
        });
    }

    /// Disconnect hook: forget the connection and evict any roster entry.
    pub fn handle_disconnect(&self, player: PlayerId) {
        self.connections.remove(&player);
        self.roster.remove(player);
    }

    /// Explicitly re-fetch and reconcile a connected player, bypassing the
    /// service-side cache. Never re-broadcasts the join message.
    pub fn refresh_user(self: &Arc<Self>, player: PlayerId) -> Result<(), EngineError> {
        let generation = self
            .connections
            .get(&player)
            .map(|g| *g)
            .ok_or(EngineError::NotConnected)?;

        let engine = Arc::clone(self);
        std::thread::spawn(move || {
            engine.fetch_and_reconcile(player, None, generation, false, true);
        });
        Ok(())
    }

    // === Ban flow ===

    /// Submit a ban for `target` on behalf of `actor` (`None` = console).
    ///
    /// Authorization is checked synchronously against the roster; the remote
    /// submission and any fallback enforcement happen on a worker thread,
    /// with the final [`BanOutcome`] delivered through `notify`.
    pub fn ban<F>(
        self: &Arc<Self>,
        actor: Option<PlayerId>,
        target: PlayerId,
        target_name: &str,
        duration_minutes: u32,
        reason: &str,
        notify: F,
    ) -> Result<(), EngineError>
    where
        F: FnOnce(BanOutcome) + Send + 'static,
    {
        let config = self.config.snapshot()?;
        if !ban::may_ban(&self.roster, actor, target, config.ban_rank_threshold) {
            return Err(EngineError::BanNotAuthorized);
        }

        let submission = BanSubmission {
            target,
            target_name: target_name.to_string(),
            actor,
            witnesses: self.roster.top(MAX_BAN_WITNESSES),
            duration_minutes,
            reason: reason.to_string(),
        };

        let engine = Arc::clone(self);
        std::thread::spawn(move || {
            let target_name = submission.target_name.clone();
            let reason = submission.reason.clone();
            let result = engine.remote.submit_ban(submission);
            let outcome = engine.fallback.on_remote_ban_result(
                target,
                &target_name,
                &reason,
                duration_minutes,
                result,
            );
            notify(outcome);
        });
        Ok(())
    }

    /// A confirmed remote unban; clears any local fallback record.
    pub fn handle_remote_unban(&self, target: PlayerId) {
        self.fallback.on_remote_unban_confirmed(target);
    }

    /// Re-submit still-active local bans to the Remote Authority. Blocking;
    /// run it from the host scheduler, not the simulation thread.
    pub fn push_local_bans(&self) -> usize {
        self.fallback.push_pending(self.remote.as_ref())
    }

    // === Queries ===

    /// Blocking remote ban-status lookup, for the host's baninfo command.
    pub fn ban_status(&self, player: PlayerId) -> RemoteResult<BanStatus> {
        self.remote.get_ban_status(player)
    }

    /// Blocking remote ban-history lookup, capped by config.
    pub fn ban_history(&self, player: PlayerId) -> Result<Vec<BanHistoryEntry>, EngineError> {
        let config = self.config.snapshot()?;
        Ok(self
            .remote
            .get_ban_history(player, config.ban_history_records)?)
    }

    /// The top `n` connected admins, rank-descending.
    pub fn admin_roster_top(&self, n: usize) -> Vec<MembershipSnapshot> {
        let mut ordered = self.roster.snapshot_ordered();
        ordered.truncate(n);
        ordered
    }

    /// Cached snapshot for one player, if they are a connected admin.
    pub fn cached_admin(&self, player: PlayerId) -> Option<MembershipSnapshot> {
        self.roster.find(player)
    }

    // === Internals ===

    fn fetch_and_reconcile(
        &self,
        player: PlayerId,
        address: Option<IpAddr>,
        generation: u64,
        is_login: bool,
        force_refresh: bool,
    ) {
        match self.remote.get_membership(player, address, force_refresh) {
            Ok(snapshot) => self.reconcile_snapshot(snapshot, is_login, generation),
            Err(error) => {
                // Fail-safe: stale permissions persist until the next
                // successful snapshot.
                tracing::warn!(
                    "Membership fetch for {} failed, leaving permissions unchanged: {}",
                    player,
                    error
                );
            }
        }
    }

    fn reconcile_snapshot(&self, snapshot: MembershipSnapshot, is_login: bool, generation: u64) {
        let config = match self.config.snapshot() {
            Ok(config) => config,
            Err(error) => {
                tracing::error!("No config snapshot during reconciliation: {}", error);
                return;
            }
        };

        let player = snapshot.player;
        let held = self.permissions.groups_of(player);
        let outcome = reconcile::reconcile(&config, &snapshot, &held, is_login);
        reconcile::apply(self.permissions.as_ref(), &snapshot, &outcome);
        if let Some(message) = &outcome.announce {
            self.sessions.broadcast(message);
        }

        if self.connection_is_current(player, generation) {
            self.roster
                .upsert(snapshot, config.admin_threshold_rank, generation);
        }
        // Disconnect wins: the reconciliation completed, but the player is
        // gone (or has reconnected under a newer generation), so this
        // completion must not leave an entry behind. It may only remove its
        // own entry; one inserted by a newer login stays.
        if !self.connection_is_current(player, generation) {
            self.roster.remove_session(player, generation);
        }
    }

    fn connection_is_current(&self, player: PlayerId, generation: u64) -> bool {
        self.connections.get(&player).map(|g| *g) == Some(generation)
    }

    fn local_ban_decision(&self, player: PlayerId) -> AuthDecision {
        let now = SystemTime::now();
        match self.bans.find_ban(player) {
            Some(record) if !record.is_expired(now) => {
                AuthDecision::Deny(local_ban_message(&record, now))
            }
            _ => AuthDecision::Allow,
        }
    }
}

fn remote_ban_message(status: &BanStatus) -> String {
    if status.permanent {
        format!(
            "You are permanently banned from this server.\nReason: {}",
            status.reason
        )
    } else {
        format!(
            "You are temporarily banned from this server, your ban will expire in {} minutes.\nReason: {}",
            status.remaining_minutes, status.reason
        )
    }
}

fn local_ban_message(record: &LocalBanRecord, now: SystemTime) -> String {
    match record.remaining(now) {
        Some(remaining) => format!(
            "You are temporarily banned from this server, your ban will expire in {} minutes.\nReason: {}",
            remaining.as_secs().div_ceil(60),
            record.reason
        ),
        None => format!(
            "You are permanently banned from this server.\nReason: {}",
            record.reason
        ),
    }
}
