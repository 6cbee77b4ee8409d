//! Test fixtures for engine and gateway tests.

use crate::store::{Account, AccountStore, AttemptLog, MemoryStore, StoreError, Versioned};
use anvil_types::{UpgradeAttemptRecord, UpgradeProfile};
use rand::{rngs::StdRng, SeedableRng};
use std::sync::atomic::{AtomicU32, Ordering};

/// Deterministic rng for tests.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Shorthand profile constructor.
pub fn profile(level: u8, points: u64, safeguards: u32) -> UpgradeProfile {
    UpgradeProfile {
        level,
        points,
        safeguards,
    }
}

/// A store pre-seeded with one account in the given state.
pub fn store_with(user: &str, profile: UpgradeProfile) -> MemoryStore {
    let store = MemoryStore::new();
    let created = store.create(user).expect("create fixture account");
    let mut account = created.value;
    account.profile = profile;
    store
        .update(user, created.version, account)
        .expect("seed fixture account");
    store
}

/// Wrapper forcing the next `conflicts` updates to fail with a stale-version
/// error, without applying them.
pub struct FlakyStore {
    inner: MemoryStore,
    conflicts: AtomicU32,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore, conflicts: u32) -> Self {
        Self {
            inner,
            conflicts: AtomicU32::new(conflicts),
        }
    }
}

impl AccountStore for FlakyStore {
    fn get(&self, user: &str) -> Result<Versioned<Account>, StoreError> {
        self.inner.get(user)
    }

    fn create(&self, user: &str) -> Result<Versioned<Account>, StoreError> {
        self.inner.create(user)
    }

    fn update(
        &self,
        user: &str,
        expected_version: u64,
        account: Account,
    ) -> Result<u64, StoreError> {
        if self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok()
        {
            return Err(StoreError::VersionConflict);
        }
        self.inner.update(user, expected_version, account)
    }
}

impl AttemptLog for FlakyStore {
    fn append(&self, record: UpgradeAttemptRecord) -> Result<(), StoreError> {
        self.inner.append(record)
    }

    fn recent(&self, user: &str, limit: usize) -> Result<Vec<UpgradeAttemptRecord>, StoreError> {
        self.inner.recent(user, limit)
    }
}

/// Wrapper whose attempt log always fails, for persistence-failure paths.
pub struct BrokenLog {
    inner: MemoryStore,
}

impl BrokenLog {
    pub fn new(inner: MemoryStore) -> Self {
        Self { inner }
    }
}

impl AccountStore for BrokenLog {
    fn get(&self, user: &str) -> Result<Versioned<Account>, StoreError> {
        self.inner.get(user)
    }

    fn create(&self, user: &str) -> Result<Versioned<Account>, StoreError> {
        self.inner.create(user)
    }

    fn update(
        &self,
        user: &str,
        expected_version: u64,
        account: Account,
    ) -> Result<u64, StoreError> {
        self.inner.update(user, expected_version, account)
    }
}

impl AttemptLog for BrokenLog {
    fn append(&self, _record: UpgradeAttemptRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("attempt log offline".into()))
    }

    fn recent(&self, user: &str, limit: usize) -> Result<Vec<UpgradeAttemptRecord>, StoreError> {
        self.inner.recent(user, limit)
    }
}
