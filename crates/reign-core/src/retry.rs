//! Bounded retry of a unit of work on optimistic write conflicts.

use tracing::debug;

use crate::error::GameError;

/// Attempts made before a store conflict is surfaced.
pub const MAX_ATTEMPTS: u32 = 3;

/// Run `attempt` until it succeeds, fails with anything but a store
/// conflict, or has run [`MAX_ATTEMPTS`] times.
///
/// Every attempt must read fresh state and build its own unit of work, so
/// the hooks of a rejected attempt are dropped with it.
pub(crate) fn with_retry<T>(
    mut attempt: impl FnMut() -> Result<T, GameError>,
) -> Result<T, GameError> {
    let mut tries: u32 = 1;
    loop {
        match attempt() {
            Err(GameError::Store(err)) if err.is_conflict() && tries < MAX_ATTEMPTS => {
                debug!(attempt = tries, error = %err, "Write conflict, retrying on fresh state");
                tries = tries.saturating_add(1);
            }
            result => return result,
        }
    }
}
