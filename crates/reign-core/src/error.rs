//! Error types for the game core.
//!
//! [`GameError`] is what player-facing operations (capture, defend, team
//! and world management) return. Scheduler failures never leave the
//! scheduler; see [`CycleError`](crate::scheduler::CycleError).

use reign_db::DbError;

/// Errors surfaced by game operations.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// A referenced world, square, team or user does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request itself is malformed or pointless.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The request conflicts with the current game state.
    #[error("state violation: {0}")]
    StateViolation(String),

    /// The store rejected or failed the write.
    #[error("store error: {0}")]
    Store(#[from] DbError),
}

impl GameError {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        Self::InvalidArgument(what.into())
    }

    pub(crate) fn violation(what: impl Into<String>) -> Self {
        Self::StateViolation(what.into())
    }
}
