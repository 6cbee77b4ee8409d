//! End-to-end flows over the in-memory store, plus property coverage for the
//! resolution invariants.

use crate::config::{RewardSchedule, UpgradeTable};
use crate::mocks::{profile, seeded_rng, store_with, BrokenLog, FlakyStore};
use crate::session::{SessionError, UpgradeSessions};
use crate::store::{MemoryStore, StoreError};
use crate::upgrade::{resolve, UpgradeError};
use anvil_types::{RewardEvent, MAX_LEVEL, STARTING_POINTS};
use proptest::prelude::*;

fn sessions(store: MemoryStore) -> UpgradeSessions<MemoryStore> {
    UpgradeSessions::new(store, UpgradeTable::default(), RewardSchedule::default())
}

/// A table where every attempt fails for practical purposes: the chance is
/// positive (tables reject zero) but far below any realistic draw.
fn always_fail_table() -> UpgradeTable {
    UpgradeTable::new([1e-12; 10], [10; 10]).expect("valid table")
}

#[test]
fn test_reward_provisions_account_then_attempt_flows() {
    let sessions = sessions(MemoryStore::new());
    let mut rng = seeded_rng(7);

    // Unknown users cannot attempt upgrades...
    assert_eq!(
        sessions.attempt("alice", false, &mut rng),
        Err(SessionError::NotFound)
    );

    // ...but the first reward provisions them.
    let outcome = sessions
        .reward("alice", RewardEvent::PostCreated)
        .expect("first reward provisions");
    assert_eq!(outcome.points_awarded, 2);
    assert_eq!(outcome.new_balance, STARTING_POINTS + 2);

    // Level 1 is certain in the reference table, so the attempt resolves
    // deterministically regardless of the draw.
    let resolution = sessions
        .attempt("alice", false, &mut rng)
        .expect("certain attempt");
    assert!(resolution.success);
    assert_eq!(resolution.from_level, 0);
    assert_eq!(resolution.to_level, 1);
    assert_eq!(resolution.points_used, 10);

    let view = sessions.status("alice").expect("status");
    assert_eq!(view.status.current_level, 1);
    assert_eq!(view.status.points, STARTING_POINTS + 2 - 10);
    assert_eq!(view.status.next_level, Some(2));

    let history = sessions.history("alice").expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].from_level, 0);
    assert_eq!(history[0].to_level, 1);
    assert!(history[0].success);
}

#[test]
fn test_history_is_newest_first() {
    let sessions = sessions(store_with("bob", profile(0, 1_000, 0)));
    let mut rng = seeded_rng(11);

    for _ in 0..3 {
        sessions.attempt("bob", false, &mut rng).expect("certain attempt");
    }

    let history = sessions.history("bob").expect("history");
    assert_eq!(history.len(), 3);
    // Levels 1-3 are certain, so the climb is 0->1->2->3 and the newest
    // record comes back first.
    assert_eq!(history[0].from_level, 2);
    assert_eq!(history[0].to_level, 3);
    assert_eq!(history[2].from_level, 0);
}

#[test]
fn test_rejected_attempt_leaves_no_trace() {
    // level=6 needs 200 points for level 7; 150 is short.
    let sessions = sessions(store_with("carol", profile(6, 150, 0)));
    let mut rng = seeded_rng(3);

    let result = sessions.attempt("carol", false, &mut rng);
    assert_eq!(
        result,
        Err(SessionError::Rejected(UpgradeError::InsufficientPoints {
            required: 200,
            available: 150
        }))
    );

    let view = sessions.status("carol").expect("status");
    assert_eq!(view.status.current_level, 6);
    assert_eq!(view.status.points, 150);
    assert!(sessions.history("carol").expect("history").is_empty());
}

#[test]
fn test_protected_failure_through_sessions() {
    let store = store_with("dave", profile(5, 500, 2));
    let sessions =
        UpgradeSessions::new(store, always_fail_table(), RewardSchedule::default());
    let mut rng = seeded_rng(13);

    let resolution = sessions
        .attempt("dave", true, &mut rng)
        .expect("attempt resolves");
    assert!(!resolution.success);
    assert!(resolution.safeguard_used);
    assert_eq!(resolution.to_level, 4);
    assert_eq!(resolution.profile.safeguards, 1);

    let history = sessions.history("dave").expect("history");
    assert_eq!(history.len(), 1);
    assert!(history[0].safeguard_used);
    assert_eq!(history[0].to_level, 4);
}

#[test]
fn test_stale_snapshot_retries_with_fresh_read() {
    let store = FlakyStore::new(store_with("erin", profile(0, 100, 0)), 1);
    let sessions =
        UpgradeSessions::new(store, UpgradeTable::default(), RewardSchedule::default());
    let mut rng = seeded_rng(17);

    let resolution = sessions
        .attempt("erin", false, &mut rng)
        .expect("retry succeeds");
    assert_eq!(resolution.to_level, 1);

    // Exactly one transition was applied and one record appended.
    let view = sessions.status("erin").expect("status");
    assert_eq!(view.status.points, 90);
    assert_eq!(sessions.history("erin").expect("history").len(), 1);
}

#[test]
fn test_attempt_gives_up_after_repeated_conflicts() {
    let store = FlakyStore::new(store_with("frank", profile(0, 100, 0)), 10);
    let sessions =
        UpgradeSessions::new(store, UpgradeTable::default(), RewardSchedule::default());
    let mut rng = seeded_rng(19);

    let result = sessions.attempt("frank", false, &mut rng);
    assert_eq!(
        result,
        Err(SessionError::Persistence(StoreError::VersionConflict))
    );
    assert!(sessions.history("frank").expect("history").is_empty());
}

#[test]
fn test_log_failure_is_reported_as_failure() {
    let store = BrokenLog::new(store_with("gail", profile(0, 100, 0)));
    let sessions =
        UpgradeSessions::new(store, UpgradeTable::default(), RewardSchedule::default());
    let mut rng = seeded_rng(23);

    let result = sessions.attempt("gail", false, &mut rng);
    assert!(matches!(result, Err(SessionError::Persistence(_))));
}

#[test]
fn test_reward_is_idempotent_free_and_accumulates() {
    let sessions = sessions(MemoryStore::new());
    sessions
        .reward("hank", RewardEvent::UpvoteReceived { count: 4 })
        .expect("reward");
    let outcome = sessions
        .reward("hank", RewardEvent::UpvoteReceived { count: 6 })
        .expect("reward");
    // 10 cumulative upvotes crosses the default milestone.
    assert_eq!(outcome.safeguards_granted, 1);
    let view = sessions.status("hank").expect("status");
    assert_eq!(view.total_upvotes, 10);
    assert_eq!(view.status.safeguards, 1);
    assert_eq!(view.status.points, STARTING_POINTS + 50);
}

proptest! {
    #[test]
    fn prop_resolution_invariants(
        level in 0u8..=MAX_LEVEL,
        points in 0u64..10_000,
        safeguards in 0u32..5,
        use_safeguard in any::<bool>(),
        r in 0.0f64..1.0,
    ) {
        let table = UpgradeTable::default();
        let before = profile(level, points, safeguards);
        match resolve(&before, use_safeguard, &table, r) {
            Ok(resolution) => {
                let after = resolution.profile;
                // Monotonic cap and non-negative domains.
                prop_assert!(after.level <= MAX_LEVEL);
                // Cost is always charged, in every branch.
                prop_assert_eq!(
                    after.points,
                    points - resolution.points_used
                );
                if resolution.success {
                    prop_assert_eq!(resolution.to_level, level + 1);
                    prop_assert!(!resolution.safeguard_used);
                    prop_assert_eq!(after.safeguards, safeguards);
                } else if use_safeguard {
                    prop_assert!(resolution.safeguard_used);
                    prop_assert_eq!(resolution.to_level, level.saturating_sub(1));
                    prop_assert_eq!(after.safeguards, safeguards - 1);
                } else {
                    prop_assert!(!resolution.safeguard_used);
                    prop_assert_eq!(resolution.to_level, level / 2);
                    prop_assert_eq!(after.safeguards, safeguards);
                }
            }
            Err(UpgradeError::AtMaxLevel) => prop_assert_eq!(level, MAX_LEVEL),
            Err(UpgradeError::InsufficientPoints { required, available }) => {
                prop_assert_eq!(available, points);
                prop_assert!(points < required);
            }
            Err(UpgradeError::NoSafeguardAvailable) => {
                prop_assert!(use_safeguard);
                prop_assert_eq!(safeguards, 0);
            }
        }
    }
}
