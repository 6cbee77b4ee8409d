//! Persistence seams for the upgrade engine.
//!
//! The engine never performs I/O; it consumes an authoritative snapshot from
//! an [`AccountStore`] and hands the replacement back. Stores must serialize
//! concurrent attempts per user, which the trait expresses as an optimistic
//! version check: `update` only applies when the caller still holds the
//! version it read.

use anvil_types::{UpgradeAttemptRecord, UpgradeProfile};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Storage-level failures, mapped into the request taxonomy by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("account not found")]
    NotFound,
    #[error("account already exists")]
    AlreadyExists,
    #[error("snapshot version is stale")]
    VersionConflict,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Per-user account record: the upgrade tuple plus the cumulative upvote
/// counter the safeguard milestone policy reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Account {
    pub profile: UpgradeProfile,
    pub total_upvotes: u64,
}

impl Account {
    pub fn new() -> Self {
        Self {
            profile: UpgradeProfile::new(),
            total_upvotes: 0,
        }
    }
}

/// A value paired with the version under which it was read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

/// Authoritative per-user account state.
pub trait AccountStore {
    /// Read the current account snapshot.
    fn get(&self, user: &str) -> Result<Versioned<Account>, StoreError>;

    /// Provision a fresh account (level 0, starting points, no charges).
    fn create(&self, user: &str) -> Result<Versioned<Account>, StoreError>;

    /// Conditionally replace the account: applies only if the stored version
    /// still equals `expected_version`, and returns the new version.
    fn update(
        &self,
        user: &str,
        expected_version: u64,
        account: Account,
    ) -> Result<u64, StoreError>;
}

/// Append-only log of resolved attempts.
pub trait AttemptLog {
    fn append(&self, record: UpgradeAttemptRecord) -> Result<(), StoreError>;

    /// Most recent records for a user, newest first.
    fn recent(&self, user: &str, limit: usize) -> Result<Vec<UpgradeAttemptRecord>, StoreError>;
}

/// Mutex-guarded in-memory store backing the gateway and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: Mutex<HashMap<String, Versioned<Account>>>,
    attempts: Mutex<Vec<UpgradeAttemptRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountStore for MemoryStore {
    fn get(&self, user: &str) -> Result<Versioned<Account>, StoreError> {
        let accounts = self
            .accounts
            .lock()
            .map_err(|_| StoreError::Unavailable("account lock poisoned".into()))?;
        accounts.get(user).copied().ok_or(StoreError::NotFound)
    }

    fn create(&self, user: &str) -> Result<Versioned<Account>, StoreError> {
        let mut accounts = self
            .accounts
            .lock()
            .map_err(|_| StoreError::Unavailable("account lock poisoned".into()))?;
        if accounts.contains_key(user) {
            return Err(StoreError::AlreadyExists);
        }
        let entry = Versioned {
            value: Account::new(),
            version: 1,
        };
        accounts.insert(user.to_string(), entry);
        Ok(entry)
    }

    fn update(
        &self,
        user: &str,
        expected_version: u64,
        account: Account,
    ) -> Result<u64, StoreError> {
        let mut accounts = self
            .accounts
            .lock()
            .map_err(|_| StoreError::Unavailable("account lock poisoned".into()))?;
        let entry = accounts.get_mut(user).ok_or(StoreError::NotFound)?;
        if entry.version != expected_version {
            return Err(StoreError::VersionConflict);
        }
        entry.value = account;
        entry.version += 1;
        Ok(entry.version)
    }
}

impl AttemptLog for MemoryStore {
    fn append(&self, record: UpgradeAttemptRecord) -> Result<(), StoreError> {
        let mut attempts = self
            .attempts
            .lock()
            .map_err(|_| StoreError::Unavailable("attempt lock poisoned".into()))?;
        attempts.push(record);
        Ok(())
    }

    fn recent(&self, user: &str, limit: usize) -> Result<Vec<UpgradeAttemptRecord>, StoreError> {
        let attempts = self
            .attempts
            .lock()
            .map_err(|_| StoreError::Unavailable("attempt lock poisoned".into()))?;
        Ok(attempts
            .iter()
            .rev()
            .filter(|record| record.user_id == user)
            .take(limit)
            .cloned()
            .collect())
    }
}
