//! Social reward crediting.
//!
//! Point credits mirror the platform rules: upvotes received, posts created,
//! and comments created each credit the author per the [`RewardSchedule`].
//! Vote retraction never claws credited points back. Safeguard charges are
//! granted each time the cumulative upvote counter crosses a milestone.

use crate::config::RewardSchedule;
use crate::store::Account;
use anvil_types::RewardEvent;
use tracing::debug;

/// What a single reward event credited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RewardOutcome {
    pub points_awarded: u64,
    pub safeguards_granted: u32,
    pub new_balance: u64,
}

/// Credit one social event to the account in place.
pub fn apply_reward(
    account: &mut Account,
    event: RewardEvent,
    schedule: &RewardSchedule,
) -> RewardOutcome {
    let mut safeguards_granted = 0u32;
    let points_awarded = match event {
        RewardEvent::UpvoteReceived { count } => {
            let before = account.total_upvotes;
            account.total_upvotes = account.total_upvotes.saturating_add(u64::from(count));
            safeguards_granted = milestones_crossed(
                before,
                account.total_upvotes,
                schedule.safeguard_milestone,
            );
            schedule.upvote_received.saturating_mul(u64::from(count))
        }
        RewardEvent::PostCreated => schedule.post_created,
        RewardEvent::CommentCreated => schedule.comment_created,
    };

    account.profile.points = account.profile.points.saturating_add(points_awarded);
    account.profile.safeguards = account.profile.safeguards.saturating_add(safeguards_granted);

    if safeguards_granted > 0 {
        debug!(
            total_upvotes = account.total_upvotes,
            granted = safeguards_granted,
            "safeguard milestone reached"
        );
    }

    RewardOutcome {
        points_awarded,
        safeguards_granted,
        new_balance: account.profile.points,
    }
}

/// How many multiples of `milestone` lie in `(before, after]`.
fn milestones_crossed(before: u64, after: u64, milestone: u32) -> u32 {
    if milestone == 0 {
        return 0;
    }
    let milestone = u64::from(milestone);
    ((after / milestone).saturating_sub(before / milestone))
        .min(u64::from(u32::MAX)) as u32
}
