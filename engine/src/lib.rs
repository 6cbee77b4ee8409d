//! Anvil upgrade resolution engine.
//!
//! This crate contains the deterministic upgrade state machine and the
//! collaborators around it: validated configuration tables, the account
//! store / attempt log seams, social reward crediting, and the coordinator
//! that ties a resolved attempt to persistence.
//!
//! ## Determinism requirements
//! - The resolution core is a pure function of the profile snapshot, the
//!   configuration table, and a single uniform draw in `[0,1)`.
//! - A failed persistence attempt must never replay an earlier draw; retries
//!   re-read a fresh snapshot and resolve independently.
//!
//! The primary entrypoints are [`attempt_upgrade`] for the pure core and
//! [`UpgradeSessions`] for the full read-resolve-persist-log flow.

pub mod config;
pub mod rewards;
pub mod session;
pub mod store;
pub mod upgrade;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

#[cfg(test)]
mod flow_tests;

pub use config::{RewardSchedule, TableError, UpgradeTable};
pub use rewards::{apply_reward, RewardOutcome};
pub use session::{SessionError, StatusView, UpgradeSessions};
pub use store::{Account, AccountStore, AttemptLog, MemoryStore, StoreError, Versioned};
pub use upgrade::{attempt_upgrade, upgrade_status, Resolution, UpgradeError, UpgradeStatus};
