use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum upgrade level (the cap; no further attempts are accepted here).
pub const MAX_LEVEL: u8 = 10;

/// Points granted to a freshly provisioned profile.
pub const STARTING_POINTS: u64 = 100;

/// How many attempt records a history query returns by default.
pub const HISTORY_LIMIT: usize = 50;

/// Errors constructing a [`TargetLevel`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum LevelError {
    #[error("target level {0} is out of range (expected 1..=10)")]
    OutOfRange(u8),
}

/// A validated target level in `1..=MAX_LEVEL`.
///
/// Table lookups are indexed by this type, so an out-of-range access is
/// unrepresentable once the value has been constructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetLevel(u8);

impl TargetLevel {
    pub fn new(level: u8) -> Result<Self, LevelError> {
        if level == 0 || level > MAX_LEVEL {
            return Err(LevelError::OutOfRange(level));
        }
        Ok(Self(level))
    }

    /// The level this target reaches on success.
    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based table index (level 1 maps to slot 0).
    pub fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

/// Per-user upgrade state, owned by the account store.
///
/// The engine receives a snapshot and returns a replacement; it never mutates
/// storage itself. All fields are non-negative by type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeProfile {
    /// Current level, `0..=MAX_LEVEL`.
    pub level: u8,
    /// Spendable point balance.
    pub points: u64,
    /// Consumable safeguard charges held.
    pub safeguards: u32,
}

impl UpgradeProfile {
    /// Profile created at registration: level 0, starting points, no charges.
    pub fn new() -> Self {
        Self {
            level: 0,
            points: STARTING_POINTS,
            safeguards: 0,
        }
    }
}

/// One resolved upgrade attempt, append-only.
///
/// `to_level` is always concrete: the engine computes a resulting level in
/// every branch, including failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeAttemptRecord {
    pub user_id: String,
    pub from_level: u8,
    pub to_level: u8,
    pub success: bool,
    pub points_used: u64,
    pub safeguard_used: bool,
    /// Unix timestamp (seconds) assigned by the coordinator when the
    /// resolved attempt is recorded.
    pub created_at: u64,
}

/// A social action that credits upgrade points to a content author.
///
/// Emitted by the social platform toward the reward surface; the engine only
/// sees the event, never the post or comment itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RewardEvent {
    /// The user's content received upvotes (net positive score change).
    UpvoteReceived { count: u32 },
    PostCreated,
    CommentCreated,
}

/// Display name for an upgrade tier.
pub fn tier_name(level: u8) -> &'static str {
    match level {
        0 => "Fresh Recruit",
        1 => "Novice",
        2 => "Apprentice",
        3 => "Warrior",
        4 => "Master",
        5 => "Expert",
        6 => "Elite",
        7 => "Hero",
        8 => "Legend",
        9 => "Mythic",
        _ => "Immortal",
    }
}
