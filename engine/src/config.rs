//! Static configuration tables for the upgrade engine.
//!
//! Tables are validated once at construction and immutable afterwards; lookups
//! take a [`TargetLevel`], so an out-of-range access is rejected at load time
//! rather than at call time.

use anvil_types::{TargetLevel, MAX_LEVEL};
use serde::Deserialize;
use thiserror::Error;

/// Errors validating an [`UpgradeTable`].
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum TableError {
    #[error("success chance for level {level} is {chance}, expected within (0, 1]")]
    ChanceOutOfRange { level: u8, chance: f64 },
    #[error("cost for level {level} must be positive")]
    ZeroCost { level: u8 },
}

/// Success chance and point cost per target level `1..=10`.
///
/// Slot `i` holds the values for target level `i + 1`. The reference table
/// matches the classic progression: levels 1-3 are certain, then the chance
/// collapses while the cost escalates.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "RawUpgradeTable")]
pub struct UpgradeTable {
    chances: [f64; MAX_LEVEL as usize],
    costs: [u64; MAX_LEVEL as usize],
}

/// Wire shape for an externally supplied table, validated on conversion.
#[derive(Clone, Debug, Deserialize)]
struct RawUpgradeTable {
    chances: [f64; MAX_LEVEL as usize],
    costs: [u64; MAX_LEVEL as usize],
}

impl TryFrom<RawUpgradeTable> for UpgradeTable {
    type Error = TableError;

    fn try_from(raw: RawUpgradeTable) -> Result<Self, TableError> {
        UpgradeTable::new(raw.chances, raw.costs)
    }
}

impl Default for UpgradeTable {
    fn default() -> Self {
        Self {
            chances: [1.0, 1.0, 1.0, 0.8, 0.7, 0.6, 0.4, 0.3, 0.2, 0.1],
            costs: [10, 20, 30, 50, 80, 120, 200, 350, 600, 1000],
        }
    }
}

impl UpgradeTable {
    /// Build a table from raw per-level values, rejecting invalid entries.
    pub fn new(
        chances: [f64; MAX_LEVEL as usize],
        costs: [u64; MAX_LEVEL as usize],
    ) -> Result<Self, TableError> {
        for (idx, &chance) in chances.iter().enumerate() {
            if !(chance > 0.0 && chance <= 1.0) {
                return Err(TableError::ChanceOutOfRange {
                    level: idx as u8 + 1,
                    chance,
                });
            }
        }
        for (idx, &cost) in costs.iter().enumerate() {
            if cost == 0 {
                return Err(TableError::ZeroCost {
                    level: idx as u8 + 1,
                });
            }
        }
        Ok(Self { chances, costs })
    }

    /// Success probability for reaching `target`.
    pub fn chance(&self, target: TargetLevel) -> f64 {
        self.chances[target.index()]
    }

    /// Success probability rounded to whole percent for display.
    pub fn chance_percent(&self, target: TargetLevel) -> u8 {
        (self.chances[target.index()] * 100.0).round() as u8
    }

    /// Point cost of attempting to reach `target`.
    pub fn cost(&self, target: TargetLevel) -> u64 {
        self.costs[target.index()]
    }
}

/// Points credited per social action, plus the safeguard grant policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RewardSchedule {
    pub upvote_received: u64,
    pub post_created: u64,
    pub comment_created: u64,
    /// A safeguard charge is granted each time cumulative upvotes received
    /// crosses a multiple of this threshold. Zero disables grants.
    pub safeguard_milestone: u32,
}

impl Default for RewardSchedule {
    fn default() -> Self {
        Self {
            upvote_received: 5,
            post_created: 2,
            comment_created: 1,
            safeguard_milestone: 10,
        }
    }
}
