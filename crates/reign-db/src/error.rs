//! Error types for the data layer.
//!
//! All failures are propagated via [`DbError`]. A [`DbError::Conflict`]
//! means another unit of work committed a row first; nothing from the
//! rejected unit of work was written and none of its hooks ran.

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A staged write no longer matches the stored row.
    #[error("write conflict on {entity} {id}: {reason}")]
    Conflict {
        /// Kind of row (`world`, `square`, `team`, `member`).
        entity: &'static str,
        /// Identifier of the conflicting row.
        id: String,
        /// What did not match.
        reason: String,
    },

    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored row holds a value the domain types cannot represent.
    #[error("invalid stored row: {0}")]
    Decode(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Whether retrying with freshly read state may succeed.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_are_retryable() {
        let conflict = DbError::Conflict {
            entity: "square",
            id: "x".to_owned(),
            reason: "row was modified concurrently".to_owned(),
        };
        assert!(conflict.is_conflict());
        assert!(!DbError::Decode("bad".to_owned()).is_conflict());
        assert!(!DbError::Postgres(sqlx::Error::RowNotFound).is_conflict());
    }
}
