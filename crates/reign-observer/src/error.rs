//! Error types for the observer server.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reign_core::GameError;

/// Errors that can occur in the observer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The request conflicts with the current game state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<GameError> for ObserverError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::NotFound(msg) => Self::NotFound(msg),
            GameError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            GameError::StateViolation(msg) => Self::Conflict(msg),
            GameError::Store(e) => Self::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::Serialization(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("JSON error: {e}"))
            }
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use reign_db::DbError;

    use super::*;

    #[test]
    fn game_errors_map_to_status_codes() {
        let cases = [
            (GameError::NotFound("world x".to_owned()), StatusCode::NOT_FOUND),
            (GameError::InvalidArgument("bad".to_owned()), StatusCode::BAD_REQUEST),
            (GameError::StateViolation("taken".to_owned()), StatusCode::CONFLICT),
            (
                GameError::Store(DbError::Decode("board_type = ?".to_owned())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ObserverError::from(err).into_response().status(), status);
        }
    }
}
