//! REST API endpoint handlers.
//!
//! All handlers delegate to the shared [`CadenceEngine`] via
//! [`AppState`]. Idempotent no-ops (cap met, already claimed, already
//! granted) are `200 OK` responses whose payloads carry the zero
//! effect; only validation failures and store errors become error
//! statuses.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/worlds/:user/:classroom` | World snapshot |
//! | `POST` | `/api/worlds/:user/:classroom/login` | Record a login day |
//! | `POST` | `/api/worlds/:user/:classroom/xp` | Grant source XP |
//! | `POST` | `/api/worlds/:user/:classroom/achievements` | Batch grant |
//! | `POST` | `/api/worlds/:user/:classroom/daily/claim` | Claim today's event |
//! | `PUT` | `/api/worlds/:user/:classroom/overlay` | Toggle overlay |
//! | `PUT` | `/api/worlds/:user/:classroom/image` | Select cosmetic |
//! | `POST` | `/api/tick` | Run one cadence tick |
//!
//! [`CadenceEngine`]: homeroom_engine::CadenceEngine

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use homeroom_engine::SignalSource;
use homeroom_types::{
    AchievementItem, BatchGrantOutcome, ClaimOutcome, ClassroomId, GrantOutcome, LoginOutcome,
    TickOutcome, UserId, WorldSnapshot, XpSource,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body for `POST .../xp`.
#[derive(Debug, serde::Deserialize)]
pub struct GrantXpRequest {
    /// The XP source to grant from.
    pub source: XpSource,
    /// Source context (assignment id, quiz id...).
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Body for `POST .../achievements`.
#[derive(Debug, serde::Deserialize)]
pub struct GrantAchievementsRequest {
    /// The achievements to grant, at most once each.
    pub items: Vec<AchievementItem>,
}

/// Body for `PUT .../overlay`.
#[derive(Debug, serde::Deserialize)]
pub struct OverlayRequest {
    /// Whether the overlay should be shown.
    pub enabled: bool,
}

/// Body for `PUT .../image`.
#[derive(Debug, serde::Deserialize)]
pub struct ImageRequest {
    /// The cosmetic index to select. Must be unlocked.
    pub index: u32,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /api/worlds/:user/:classroom` -- the snapshot read-model.
pub async fn get_snapshot<S: SignalSource>(
    State(state): State<Arc<AppState<S>>>,
    Path((user, classroom)): Path<(Uuid, Uuid)>,
) -> Result<Json<WorldSnapshot>, ApiError> {
    let snapshot = state
        .engine
        .snapshot(UserId::from(user), ClassroomId::from(classroom))
        .await?;
    Ok(Json(snapshot))
}

/// `POST /api/worlds/:user/:classroom/login` -- record a login day.
pub async fn record_login<S: SignalSource>(
    State(state): State<Arc<AppState<S>>>,
    Path((user, classroom)): Path<(Uuid, Uuid)>,
) -> Result<Json<LoginOutcome>, ApiError> {
    let outcome = state
        .engine
        .record_login(UserId::from(user), ClassroomId::from(classroom))
        .await?;
    Ok(Json(outcome))
}

/// `POST /api/worlds/:user/:classroom/xp` -- grant source XP.
pub async fn grant_xp<S: SignalSource>(
    State(state): State<Arc<AppState<S>>>,
    Path((user, classroom)): Path<(Uuid, Uuid)>,
    Json(body): Json<GrantXpRequest>,
) -> Result<Json<GrantOutcome>, ApiError> {
    let outcome = state
        .engine
        .grant_xp(
            UserId::from(user),
            ClassroomId::from(classroom),
            body.source,
            body.metadata,
        )
        .await?;
    Ok(Json(outcome))
}

/// `POST /api/worlds/:user/:classroom/achievements` -- batch grant.
pub async fn grant_achievements<S: SignalSource>(
    State(state): State<Arc<AppState<S>>>,
    Path((user, classroom)): Path<(Uuid, Uuid)>,
    Json(body): Json<GrantAchievementsRequest>,
) -> Result<Json<BatchGrantOutcome>, ApiError> {
    let outcome = state
        .engine
        .grant_achievements(
            UserId::from(user),
            ClassroomId::from(classroom),
            &body.items,
        )
        .await?;
    Ok(Json(outcome))
}

/// `POST /api/worlds/:user/:classroom/daily/claim` -- claim today's
/// care event.
pub async fn claim_daily<S: SignalSource>(
    State(state): State<Arc<AppState<S>>>,
    Path((user, classroom)): Path<(Uuid, Uuid)>,
) -> Result<Json<ClaimOutcome>, ApiError> {
    let outcome = state
        .engine
        .claim_daily(UserId::from(user), ClassroomId::from(classroom))
        .await?;
    Ok(Json(outcome))
}

/// `PUT /api/worlds/:user/:classroom/overlay` -- toggle the overlay.
pub async fn set_overlay<S: SignalSource>(
    State(state): State<Arc<AppState<S>>>,
    Path((user, classroom)): Path<(Uuid, Uuid)>,
    Json(body): Json<OverlayRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .engine
        .set_overlay_enabled(
            UserId::from(user),
            ClassroomId::from(classroom),
            body.enabled,
        )
        .await?;
    Ok(Json(serde_json::json!({ "overlay_enabled": body.enabled })))
}

/// `PUT /api/worlds/:user/:classroom/image` -- select a cosmetic.
pub async fn select_image<S: SignalSource>(
    State(state): State<Arc<AppState<S>>>,
    Path((user, classroom)): Path<(Uuid, Uuid)>,
    Json(body): Json<ImageRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .engine
        .select_image(UserId::from(user), ClassroomId::from(classroom), body.index)
        .await?;
    Ok(Json(serde_json::json!({ "selected_image": body.index })))
}

/// `POST /api/tick` -- run one cadence tick now.
///
/// The periodic driver calls the engine directly; this endpoint exists
/// for operational catch-up after downtime and for testing.
pub async fn run_tick<S: SignalSource>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<TickOutcome>, ApiError> {
    let outcome = state.engine.tick(Utc::now()).await?;
    Ok(Json(outcome))
}
