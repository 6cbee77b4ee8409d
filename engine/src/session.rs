//! Read-resolve-persist-log coordination around the pure engine.
//!
//! [`UpgradeSessions`] always re-reads the authoritative snapshot before
//! resolving (a caller-supplied tuple is never trusted), applies the profile
//! replacement with an optimistic version check, and appends the attempt
//! record. A stale snapshot is retried with a fresh read and a brand-new
//! independent draw; a prior outcome is never replayed.

use crate::config::{RewardSchedule, UpgradeTable};
use crate::rewards::{apply_reward, RewardOutcome};
use crate::store::{AccountStore, AttemptLog, StoreError};
use crate::upgrade::{attempt_upgrade, upgrade_status, Resolution, UpgradeError, UpgradeStatus};
use anvil_types::{RewardEvent, UpgradeAttemptRecord, HISTORY_LIMIT};
use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{info, warn};

/// How many stale-snapshot retries an attempt gets before giving up.
const MAX_PERSIST_RETRIES: u32 = 3;

/// Request-level errors for the coordinator surface.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Attempt rejected by the engine preconditions; no state change.
    #[error(transparent)]
    Rejected(#[from] UpgradeError),
    /// The referenced user has no account.
    #[error("user not found")]
    NotFound,
    /// The store or log failed after resolution; the request must report
    /// failure and a retry resolves a brand-new draw.
    #[error("persistence failure: {0}")]
    Persistence(StoreError),
}

impl SessionError {
    fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            other => Self::Persistence(other),
        }
    }
}

/// Status projection plus the account counters the gateway displays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatusView {
    pub status: UpgradeStatus,
    pub total_upvotes: u64,
}

/// Coordinator tying the pure engine to a store and an attempt log.
pub struct UpgradeSessions<S> {
    store: S,
    table: UpgradeTable,
    schedule: RewardSchedule,
}

impl<S: AccountStore + AttemptLog> UpgradeSessions<S> {
    pub fn new(store: S, table: UpgradeTable, schedule: RewardSchedule) -> Self {
        Self {
            store,
            table,
            schedule,
        }
    }

    pub fn table(&self) -> &UpgradeTable {
        &self.table
    }

    /// Resolve one upgrade attempt for `user`.
    ///
    /// All-or-nothing: either the request is rejected with no state change, or
    /// exactly one transition is persisted and exactly one record appended.
    pub fn attempt(
        &self,
        user: &str,
        use_safeguard: bool,
        rng: &mut impl Rng,
    ) -> Result<Resolution, SessionError> {
        for _ in 0..MAX_PERSIST_RETRIES {
            let snapshot = self.store.get(user).map_err(SessionError::from_store)?;
            let resolution =
                attempt_upgrade(&snapshot.value.profile, use_safeguard, &self.table, rng)?;

            let mut account = snapshot.value;
            account.profile = resolution.profile;
            match self.store.update(user, snapshot.version, account) {
                Ok(_) => {
                    self.store
                        .append(UpgradeAttemptRecord {
                            user_id: user.to_string(),
                            from_level: resolution.from_level,
                            to_level: resolution.to_level,
                            success: resolution.success,
                            points_used: resolution.points_used,
                            safeguard_used: resolution.safeguard_used,
                            created_at: unix_now(),
                        })
                        .map_err(|err| {
                            warn!(user, error = %err, "attempt log append failed");
                            SessionError::Persistence(err)
                        })?;
                    info!(
                        user,
                        from = resolution.from_level,
                        to = resolution.to_level,
                        success = resolution.success,
                        points_used = resolution.points_used,
                        safeguard_used = resolution.safeguard_used,
                        "upgrade attempt resolved"
                    );
                    return Ok(resolution);
                }
                Err(StoreError::VersionConflict) => {
                    // Another writer won; re-read and resolve independently.
                    continue;
                }
                Err(err) => {
                    warn!(user, error = %err, "account update failed");
                    return Err(SessionError::from_store(err));
                }
            }
        }
        warn!(user, "attempt abandoned after repeated snapshot conflicts");
        Err(SessionError::Persistence(StoreError::VersionConflict))
    }

    /// Read-only projection of the user's profile against the tables.
    pub fn status(&self, user: &str) -> Result<StatusView, SessionError> {
        let snapshot = self.store.get(user).map_err(SessionError::from_store)?;
        Ok(StatusView {
            status: upgrade_status(&snapshot.value.profile, &self.table),
            total_upvotes: snapshot.value.total_upvotes,
        })
    }

    /// Most recent attempt records for the user, newest first.
    pub fn history(&self, user: &str) -> Result<Vec<UpgradeAttemptRecord>, SessionError> {
        self.store
            .recent(user, HISTORY_LIMIT)
            .map_err(SessionError::from_store)
    }

    /// Credit a social event, provisioning the account on first contact.
    pub fn reward(&self, user: &str, event: RewardEvent) -> Result<RewardOutcome, SessionError> {
        for _ in 0..MAX_PERSIST_RETRIES {
            let snapshot = match self.store.get(user) {
                Ok(snapshot) => snapshot,
                Err(StoreError::NotFound) => {
                    match self.store.create(user) {
                        Ok(snapshot) => snapshot,
                        // Lost a provisioning race; read the winner's row.
                        Err(StoreError::AlreadyExists) => {
                            self.store.get(user).map_err(SessionError::from_store)?
                        }
                        Err(err) => return Err(SessionError::from_store(err)),
                    }
                }
                Err(err) => return Err(SessionError::from_store(err)),
            };

            let mut account = snapshot.value;
            let outcome = apply_reward(&mut account, event, &self.schedule);
            match self.store.update(user, snapshot.version, account) {
                Ok(_) => return Ok(outcome),
                Err(StoreError::VersionConflict) => continue,
                Err(err) => return Err(SessionError::from_store(err)),
            }
        }
        Err(SessionError::Persistence(StoreError::VersionConflict))
    }
}

/// Wall-clock seconds for attempt record timestamps.
fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
