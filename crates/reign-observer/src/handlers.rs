//! REST endpoint handlers for the observer server.
//!
//! All endpoints are read-only views over committed store state.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness check with world and timer counts |
//! | `GET` | `/api/worlds` | List worlds, filtered by the [`WorldsQuery`] parameters |
//! | `GET` | `/api/worlds/{slug}` | Single world |
//! | `GET` | `/api/worlds/{slug}/board` | The world's squares |
//! | `GET` | `/api/worlds/{slug}/teams` | The world's teams with members |
//! | `GET` | `/api/debug/cycles` | Scheduler inspection |

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use reign_core::WorldFilter;
use reign_types::{BoardType, UserId};

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameter types
// ---------------------------------------------------------------------------

/// Query parameters for the `GET /api/worlds` endpoint.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldsQuery {
    /// User whose private worlds are listed alongside the public ones.
    pub viewer: Option<String>,
    /// Keep only public (`true`) or only private (`false`) worlds.
    pub is_public: Option<bool>,
    /// Board topology: `SQUARE` or `HEXAGON`, any case.
    pub board_type: Option<String>,
    /// Case-insensitive substring of the world name.
    pub search: Option<String>,
    /// Drop worlds that reached `maxPlayers`.
    pub hide_full: Option<bool>,
}

impl WorldsQuery {
    fn into_filter(self) -> Result<WorldFilter, ObserverError> {
        let viewer = self
            .viewer
            .as_deref()
            .map(|raw| {
                UserId::from_str(raw)
                    .map_err(|e| ObserverError::InvalidArgument(format!("viewer: {e}")))
            })
            .transpose()?;
        let board_type = self
            .board_type
            .as_deref()
            .map(|raw| {
                BoardType::parse(raw).ok_or_else(|| {
                    ObserverError::InvalidArgument(format!("unknown boardType: {raw}"))
                })
            })
            .transpose()?;
        Ok(WorldFilter {
            viewer,
            is_public: self.is_public,
            board_type,
            search: self.search,
            hide_full: self.hide_full.unwrap_or(false),
        })
    }
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Report liveness together with a few cheap counters.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "worlds": state.worlds.all_worlds().len(),
        "scheduledCycles": state.scheduler.scheduled_count(),
        "subscribers": state.hub.subscriber_count(),
        "time": state.clock.now(),
    }))
}

// ---------------------------------------------------------------------------
// Worlds
// ---------------------------------------------------------------------------

/// List the worlds visible to the optional viewer.
///
/// Without parameters only public worlds are returned.
pub async fn list_worlds(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WorldsQuery>,
) -> Result<impl IntoResponse, ObserverError> {
    let filter = params.into_filter()?;
    let worlds = state.worlds.list_worlds(&filter);
    Ok(Json(serde_json::json!({
        "count": worlds.len(),
        "worlds": serde_json::to_value(worlds)?,
    })))
}

/// Return a single world by slug.
pub async fn get_world(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    Ok(Json(state.worlds.world_by_slug(&slug)?))
}

/// Return the world's board, ordered by `(x, y)`.
pub async fn get_board(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    Ok(Json(state.worlds.world_board(&slug)?))
}

/// Return the world's teams with their members.
pub async fn get_teams(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    Ok(Json(state.teams.teams_in_world(&slug)?))
}

// ---------------------------------------------------------------------------
// GET /api/debug/cycles
// ---------------------------------------------------------------------------

/// Inspection data for every registered world timer.
pub async fn debug_cycles(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.scheduler.scheduled_worlds_info())
}
