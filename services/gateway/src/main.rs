//! HTTP+JSON boundary for the upgrade engine.
//!
//! Identity is installed by the upstream auth proxy as an `x-user-id` header;
//! requests without it are rejected as unauthorized. The reward surface is
//! trusted and called by the social platform, not by end users.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::State as AxumState;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;

use anvil_engine::{
    MemoryStore, Resolution, RewardSchedule, SessionError, UpgradeError, UpgradeSessions,
    UpgradeTable,
};
use anvil_types::api::{
    AttemptRequest, AttemptResponse, Envelope, ErrorBody, ErrorKind, HistoryResponse,
    RewardRequest, RewardResponse, StatusResponse,
};
use anvil_types::tier_name;

/// Header installed by the auth proxy in front of this service.
const USER_HEADER: &str = "x-user-id";

#[derive(Clone, Debug)]
struct GatewayConfig {
    listen: SocketAddr,
    table_path: Option<PathBuf>,
    schedule_path: Option<PathBuf>,
}

impl GatewayConfig {
    fn from_env() -> anyhow::Result<Self> {
        let listen = read_string("ANVIL_LISTEN_ADDR", "0.0.0.0:8080")
            .parse()
            .context("invalid ANVIL_LISTEN_ADDR")?;
        Ok(Self {
            listen,
            table_path: read_path("ANVIL_TABLE_PATH"),
            schedule_path: read_path("ANVIL_REWARDS_PATH"),
        })
    }
}

fn read_string(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

fn read_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().map(PathBuf::from)
}

/// Load the chance/cost table, preferring the override file when configured.
fn load_table(config: &GatewayConfig) -> anyhow::Result<UpgradeTable> {
    match &config.table_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading upgrade table {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing upgrade table {}", path.display()))
        }
        None => Ok(UpgradeTable::default()),
    }
}

fn load_schedule(config: &GatewayConfig) -> anyhow::Result<RewardSchedule> {
    match &config.schedule_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading reward schedule {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing reward schedule {}", path.display()))
        }
        None => Ok(RewardSchedule::default()),
    }
}

type Sessions = Arc<UpgradeSessions<MemoryStore>>;

fn router(sessions: Sessions) -> Router {
    Router::new()
        .route("/api/upgrade", post(post_upgrade).get(get_status))
        .route("/api/upgrade/history", get(get_history))
        .route("/api/rewards", post(post_reward))
        .with_state(sessions)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = GatewayConfig::from_env()?;
    let table = load_table(&config)?;
    let schedule = load_schedule(&config)?;
    let sessions = Arc::new(UpgradeSessions::new(MemoryStore::new(), table, schedule));

    let app = router(sessions);
    info!(listen = %config.listen, "upgrade gateway listening");
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .context("binding listen address")?;
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}

/// Pull the authenticated user id out of the proxy-installed header.
fn require_user(headers: &HeaderMap) -> Result<String, Response> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            reject(
                StatusCode::UNAUTHORIZED,
                ErrorKind::Unauthorized,
                "Unauthorized",
            )
        })
}

fn reject(status: StatusCode, kind: ErrorKind, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(kind, message))).into_response()
}

fn reject_session(err: SessionError) -> Response {
    match err {
        SessionError::Rejected(UpgradeError::AtMaxLevel) => reject(
            StatusCode::BAD_REQUEST,
            ErrorKind::InvalidRequest,
            err.to_string(),
        ),
        SessionError::Rejected(UpgradeError::InsufficientPoints { .. }) => reject(
            StatusCode::BAD_REQUEST,
            ErrorKind::InsufficientPoints,
            err.to_string(),
        ),
        SessionError::Rejected(UpgradeError::NoSafeguardAvailable) => reject(
            StatusCode::BAD_REQUEST,
            ErrorKind::NoSafeguardAvailable,
            err.to_string(),
        ),
        SessionError::NotFound => reject(
            StatusCode::NOT_FOUND,
            ErrorKind::NotFound,
            "User not found",
        ),
        SessionError::Persistence(_) => reject(
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::PersistenceFailure,
            "Failed to persist upgrade attempt",
        ),
    }
}

fn attempt_message(resolution: &Resolution) -> String {
    if resolution.success {
        format!(
            "Upgrade successful! You are now level +{}!",
            resolution.to_level
        )
    } else if resolution.safeguard_used {
        format!(
            "Upgrade failed, but the safeguard protected you. Level: +{}",
            resolution.to_level
        )
    } else {
        format!("Upgrade failed! Level dropped to +{}", resolution.to_level)
    }
}

async fn post_upgrade(
    AxumState(sessions): AxumState<Sessions>,
    headers: HeaderMap,
    body: Result<Json<AttemptRequest>, JsonRejection>,
) -> Response {
    let user = match require_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let request = match body {
        Ok(Json(request)) => request,
        // A bodyless POST means "no safeguard"; an unreadable body must be
        // rejected before any draw or mutation.
        Err(JsonRejection::MissingJsonContentType(_)) => AttemptRequest::default(),
        Err(rejection) => {
            return reject(
                StatusCode::BAD_REQUEST,
                ErrorKind::InvalidRequest,
                rejection.body_text(),
            )
        }
    };

    let mut rng = rand::thread_rng();
    match sessions.attempt(&user, request.use_safeguard, &mut rng) {
        Ok(resolution) => {
            let message = attempt_message(&resolution);
            let response = AttemptResponse {
                upgrade_success: resolution.success,
                from_level: resolution.from_level,
                to_level: resolution.to_level,
                points_used: resolution.points_used,
                new_balance: resolution.profile.points,
                success_chance_percent: (resolution.chance * 100.0).round() as u8,
                used_safeguard: resolution.safeguard_used,
            };
            Json(Envelope::ok_with(response, message)).into_response()
        }
        Err(err) => reject_session(err),
    }
}

async fn get_status(
    AxumState(sessions): AxumState<Sessions>,
    headers: HeaderMap,
) -> Response {
    let user = match require_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    match sessions.status(&user) {
        Ok(view) => {
            let status = view.status;
            let response = StatusResponse {
                current_level: status.current_level,
                tier: tier_name(status.current_level).to_string(),
                points: status.points,
                safeguards: status.safeguards,
                total_upvotes: view.total_upvotes,
                next_level: status.next_level,
                upgrade_cost: status.upgrade_cost,
                success_chance_percent: status.success_chance_percent,
                can_upgrade: status.can_upgrade,
            };
            Json(Envelope::ok(response)).into_response()
        }
        Err(err) => reject_session(err),
    }
}

async fn get_history(
    AxumState(sessions): AxumState<Sessions>,
    headers: HeaderMap,
) -> Response {
    let user = match require_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    match sessions.history(&user) {
        Ok(attempts) => Json(Envelope::ok(HistoryResponse { attempts })).into_response(),
        Err(err) => reject_session(err),
    }
}

async fn post_reward(
    AxumState(sessions): AxumState<Sessions>,
    headers: HeaderMap,
    Json(request): Json<RewardRequest>,
) -> Response {
    let user = match require_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    match sessions.reward(&user, request.event) {
        Ok(outcome) => {
            let response = RewardResponse {
                points_awarded: outcome.points_awarded,
                safeguards_granted: outcome.safeguards_granted,
                new_balance: outcome.new_balance,
            };
            let message = if outcome.points_awarded > 0 {
                format!("+{} points awarded", outcome.points_awarded)
            } else {
                "Reward recorded".to_string()
            };
            Json(Envelope::ok_with(response, message)).into_response()
        }
        Err(err) => reject_session(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_types::RewardEvent;
    use axum::body::Body;
    use tower::ServiceExt;

    fn seeded_sessions() -> Sessions {
        let sessions = UpgradeSessions::new(
            MemoryStore::new(),
            UpgradeTable::default(),
            RewardSchedule::default(),
        );
        sessions
            .reward("alice", RewardEvent::PostCreated)
            .expect("provision account");
        Arc::new(sessions)
    }

    fn user_headers(user: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, user.parse().expect("header value"));
        headers
    }

    #[test]
    fn test_require_user() {
        assert!(require_user(&HeaderMap::new()).is_err());
        let user = require_user(&user_headers("alice")).expect("header present");
        assert_eq!(user, "alice");
    }

    #[tokio::test]
    async fn test_upgrade_requires_identity() {
        let response = post_upgrade(
            AxumState(seeded_sessions()),
            HeaderMap::new(),
            Ok(Json(AttemptRequest::default())),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_upgrade_unknown_user_is_404() {
        let response = post_upgrade(
            AxumState(seeded_sessions()),
            user_headers("ghost"),
            Ok(Json(AttemptRequest::default())),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upgrade_resolves_for_known_user() {
        let sessions = seeded_sessions();
        let response = post_upgrade(
            AxumState(sessions.clone()),
            user_headers("alice"),
            Ok(Json(AttemptRequest::default())),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        // Level 1 is certain, so the profile advanced.
        let view = sessions.status("alice").expect("status");
        assert_eq!(view.status.current_level, 1);
    }

    #[tokio::test]
    async fn test_insufficient_points_is_400() {
        let sessions = seeded_sessions();
        // Burn the balance down with certain upgrades until an attempt is
        // short: 102 points covers levels 1..=3 (10+20+30), leaving 42 < 50.
        let mut rng = rand::thread_rng();
        for _ in 0..3 {
            sessions
                .attempt("alice", false, &mut rng)
                .expect("certain attempt");
        }
        let response = post_upgrade(
            AxumState(sessions),
            user_headers("alice"),
            Ok(Json(AttemptRequest::default())),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_safeguard_without_charges_is_400() {
        let sessions = seeded_sessions();
        let body = Json(AttemptRequest {
            use_safeguard: true,
        });
        let response =
            post_upgrade(AxumState(sessions), user_headers("alice"), Ok(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected_without_mutation() {
        let sessions = seeded_sessions();
        let before = sessions.status("alice").expect("status");

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/upgrade")
            .header(USER_HEADER, "alice")
            .header("content-type", "application/json")
            .body(Body::from("{not valid json"))
            .expect("build request");
        let response = router(sessions.clone())
            .oneshot(request)
            .await
            .expect("route request");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("error envelope");
        assert_eq!(body["kind"], "invalidRequest");
        assert_eq!(body["success"], false);

        // No draw, no spend, no level change.
        let after = sessions.status("alice").expect("status");
        assert_eq!(after.status.current_level, before.status.current_level);
        assert_eq!(after.status.points, before.status.points);
        assert!(sessions.history("alice").expect("history").is_empty());
    }

    #[tokio::test]
    async fn test_bodyless_post_defaults_to_no_safeguard() {
        let sessions = seeded_sessions();

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/upgrade")
            .header(USER_HEADER, "alice")
            .body(Body::empty())
            .expect("build request");
        let response = router(sessions.clone())
            .oneshot(request)
            .await
            .expect("route request");
        assert_eq!(response.status(), StatusCode::OK);

        // Level 1 is certain, so the default no-safeguard attempt resolved.
        let view = sessions.status("alice").expect("status");
        assert_eq!(view.status.current_level, 1);
    }

    #[tokio::test]
    async fn test_reward_provisions_and_credits() {
        let sessions = Arc::new(UpgradeSessions::new(
            MemoryStore::new(),
            UpgradeTable::default(),
            RewardSchedule::default(),
        ));
        let request = RewardRequest {
            event: RewardEvent::UpvoteReceived { count: 2 },
        };
        let response = post_reward(
            AxumState(sessions.clone()),
            user_headers("bob"),
            Json(request),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let view = sessions.status("bob").expect("status");
        assert_eq!(view.total_upvotes, 2);
    }
}
