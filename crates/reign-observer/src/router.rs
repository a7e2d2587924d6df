//! Axum router construction for the observer server.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin client access.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the observer server.
///
/// The router includes:
/// - `GET /health` -- liveness check
/// - `GET /topic/worlds/{slug}` -- `WebSocket` snapshot stream
/// - `GET /api/worlds` -- list worlds
/// - `GET /api/worlds/{slug}` -- single world
/// - `GET /api/worlds/{slug}/board` -- board squares
/// - `GET /api/worlds/{slug}/teams` -- teams with members
/// - `GET /api/debug/cycles` -- scheduler inspection
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        // WebSocket
        .route("/topic/worlds/{slug}", get(ws::world_topic))
        // REST API
        .route("/api/worlds", get(handlers::list_worlds))
        .route("/api/worlds/{slug}", get(handlers::get_world))
        .route("/api/worlds/{slug}/board", get(handlers::get_board))
        .route("/api/worlds/{slug}/teams", get(handlers::get_teams))
        .route("/api/debug/cycles", get(handlers::debug_cycles))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
