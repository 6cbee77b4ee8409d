//! Common types used throughout anvil.
//!
//! This crate holds the domain state shared by the upgrade engine and the
//! gateway: the per-user upgrade profile, the append-only attempt record, and
//! the HTTP-facing DTOs. It contains no resolution logic and performs no I/O.

pub mod api;
pub mod forge;

pub use forge::{
    tier_name, LevelError, RewardEvent, TargetLevel, UpgradeAttemptRecord, UpgradeProfile,
    HISTORY_LIMIT, MAX_LEVEL, STARTING_POINTS,
};
