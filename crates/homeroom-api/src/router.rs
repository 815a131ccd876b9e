//! Axum router construction for the gamification API.
//!
//! Assembles all REST routes into a single [`Router`] with CORS and
//! trace middleware. Authentication is the host application's concern;
//! this service sits behind it.

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use homeroom_engine::SignalSource;

/// Build the complete Axum router for the gamification API.
///
/// CORS is configured to allow any origin for development. In
/// production this should be restricted.
pub fn build_router<S>(state: Arc<AppState<S>>) -> Router
where
    S: SignalSource + Send + Sync + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/worlds/{user}/{classroom}",
            get(handlers::get_snapshot::<S>),
        )
        .route(
            "/api/worlds/{user}/{classroom}/login",
            post(handlers::record_login::<S>),
        )
        .route(
            "/api/worlds/{user}/{classroom}/xp",
            post(handlers::grant_xp::<S>),
        )
        .route(
            "/api/worlds/{user}/{classroom}/achievements",
            post(handlers::grant_achievements::<S>),
        )
        .route(
            "/api/worlds/{user}/{classroom}/daily/claim",
            post(handlers::claim_daily::<S>),
        )
        .route(
            "/api/worlds/{user}/{classroom}/overlay",
            put(handlers::set_overlay::<S>),
        )
        .route(
            "/api/worlds/{user}/{classroom}/image",
            put(handlers::select_image::<S>),
        )
        .route("/api/tick", post(handlers::run_tick::<S>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
