//! HTTP-facing request/response shapes for the upgrade gateway.
//!
//! Field names are camelCase on the wire. Every success response is wrapped in
//! [`Envelope`]; rejections use [`ErrorBody`] with a stable machine-readable
//! [`ErrorKind`].

use crate::forge::{RewardEvent, UpgradeAttemptRecord};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/upgrade`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRequest {
    #[serde(default)]
    pub use_safeguard: bool,
}

/// Result of a resolved upgrade attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResponse {
    pub upgrade_success: bool,
    pub from_level: u8,
    pub to_level: u8,
    pub points_used: u64,
    pub new_balance: u64,
    /// Configured chance for the attempted level, rounded to whole percent.
    pub success_chance_percent: u8,
    pub used_safeguard: bool,
}

/// Result of the read-only status query (`GET /api/upgrade`).
///
/// The nullable fields are absent exactly when the profile is already at the
/// level cap.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub current_level: u8,
    pub tier: String,
    pub points: u64,
    pub safeguards: u32,
    pub total_upvotes: u64,
    pub next_level: Option<u8>,
    pub upgrade_cost: Option<u64>,
    pub success_chance_percent: Option<u8>,
    pub can_upgrade: bool,
}

/// Result of `GET /api/upgrade/history`: most-recent-first attempt records.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub attempts: Vec<UpgradeAttemptRecord>,
}

/// Body of `POST /api/rewards` (trusted internal surface).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardRequest {
    pub event: RewardEvent,
}

/// Result of a reward credit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardResponse {
    pub points_awarded: u64,
    pub safeguards_granted: u32,
    pub new_balance: u64,
}

/// Success wrapper used by every endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn ok_with(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: Some(message.into()),
        }
    }
}

/// Stable machine-readable rejection kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Unauthorized,
    InvalidRequest,
    InsufficientPoints,
    NoSafeguardAvailable,
    NotFound,
    PersistenceFailure,
}

/// Rejection body: human message plus machine kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub kind: ErrorKind,
}

impl ErrorBody {
    pub fn new(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            kind,
        }
    }
}
