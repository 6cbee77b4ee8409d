//! Upgrade resolution core.
//!
//! A single attempt is a pure function of the profile snapshot, the
//! configuration table, and one uniform draw in `[0,1)`:
//!
//! - success iff `draw <= chance[target]` (boundary inclusive)
//! - success: level rises by one, no safeguard consumed
//! - failure with safeguard: level drops by exactly one (floor 0), one charge
//!   consumed
//! - failure unprotected: level halves (integer truncation)
//! - the cost is charged in every resolved branch
//!
//! Preconditions are checked in contract order before any draw; a rejected
//! attempt leaves the profile untouched and produces no record.

use crate::config::UpgradeTable;
use anvil_types::{TargetLevel, UpgradeProfile, MAX_LEVEL};
use rand::Rng;
use thiserror::Error;

/// Caller errors rejecting an attempt before resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum UpgradeError {
    #[error("already at maximum level (+{MAX_LEVEL})")]
    AtMaxLevel,
    #[error("insufficient points: need {required}, have {available}")]
    InsufficientPoints { required: u64, available: u64 },
    #[error("safeguard requested but no charges held")]
    NoSafeguardAvailable,
}

/// Outcome of one resolved attempt: the replacement profile plus the fields
/// the attempt log and the response need.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Resolution {
    pub profile: UpgradeProfile,
    pub from_level: u8,
    pub to_level: u8,
    pub success: bool,
    pub points_used: u64,
    pub safeguard_used: bool,
    /// Configured chance for the attempted level, for display.
    pub chance: f64,
}

/// Read-only projection of a profile against the table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UpgradeStatus {
    pub current_level: u8,
    pub points: u64,
    pub safeguards: u32,
    pub next_level: Option<u8>,
    pub upgrade_cost: Option<u64>,
    pub success_chance_percent: Option<u8>,
    pub can_upgrade: bool,
}

/// Validate the preconditions in contract order and return the target level
/// and its cost. No draw happens here.
fn preflight(
    profile: &UpgradeProfile,
    use_safeguard: bool,
    table: &UpgradeTable,
) -> Result<(TargetLevel, u64), UpgradeError> {
    if profile.level >= MAX_LEVEL {
        return Err(UpgradeError::AtMaxLevel);
    }
    // level < MAX_LEVEL, so level + 1 is always a valid target
    let target = TargetLevel::new(profile.level + 1).map_err(|_| UpgradeError::AtMaxLevel)?;
    let cost = table.cost(target);
    if profile.points < cost {
        return Err(UpgradeError::InsufficientPoints {
            required: cost,
            available: profile.points,
        });
    }
    if use_safeguard && profile.safeguards == 0 {
        return Err(UpgradeError::NoSafeguardAvailable);
    }
    Ok((target, cost))
}

/// Resolve an attempt against an explicit draw `r` in `[0,1)`.
///
/// Exposed separately from [`attempt_upgrade`] so outcomes can be asserted
/// against exact draw values.
pub fn resolve(
    profile: &UpgradeProfile,
    use_safeguard: bool,
    table: &UpgradeTable,
    r: f64,
) -> Result<Resolution, UpgradeError> {
    let (target, cost) = preflight(profile, use_safeguard, table)?;
    let chance = table.chance(target);
    let success = r <= chance;

    let (to_level, safeguard_used) = if success {
        (target.get(), false)
    } else if use_safeguard {
        // Protected failure: drop exactly one level, floor at zero.
        (profile.level.saturating_sub(1), true)
    } else {
        // Unprotected failure: halve, truncating toward zero.
        (profile.level / 2, false)
    };

    let new_profile = UpgradeProfile {
        level: to_level,
        points: profile.points - cost,
        safeguards: profile.safeguards - u32::from(safeguard_used),
    };

    Ok(Resolution {
        profile: new_profile,
        from_level: profile.level,
        to_level,
        success,
        points_used: cost,
        safeguard_used,
        chance,
    })
}

/// Resolve an attempt, drawing from `rng` only after every precondition has
/// passed.
pub fn attempt_upgrade(
    profile: &UpgradeProfile,
    use_safeguard: bool,
    table: &UpgradeTable,
    rng: &mut impl Rng,
) -> Result<Resolution, UpgradeError> {
    preflight(profile, use_safeguard, table)?;
    let r: f64 = rng.gen();
    resolve(profile, use_safeguard, table, r)
}

/// Project a profile into the status DTO the gateway serves.
pub fn upgrade_status(profile: &UpgradeProfile, table: &UpgradeTable) -> UpgradeStatus {
    let next = TargetLevel::new(profile.level.saturating_add(1)).ok();
    let upgrade_cost = next.map(|target| table.cost(target));
    UpgradeStatus {
        current_level: profile.level,
        points: profile.points,
        safeguards: profile.safeguards,
        next_level: next.map(TargetLevel::get),
        upgrade_cost,
        success_chance_percent: next.map(|target| table.chance_percent(target)),
        can_upgrade: upgrade_cost.is_some_and(|cost| profile.points >= cost),
    }
}
