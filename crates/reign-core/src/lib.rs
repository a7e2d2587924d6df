//! Game core for Reign: cycle scheduling, territory capture, commit-deferred
//! broadcasts, and team and world management.
//!
//! Every mutation follows the same shape: read fresh rows from the
//! [`WorldStore`](reign_db::WorldStore), stage writes in a
//! [`UnitOfWork`](reign_db::UnitOfWork), attach a broadcast with
//! [`BroadcastCoordinator::defer_until_commit`], commit. Observers only ever
//! see snapshots of committed state.
//!
//! # Modules
//!
//! - [`authz`] -- Whether a user may act in a world.
//! - [`broadcast`] -- [`Publisher`] trait, in-process [`BroadcastHub`], and
//!   the [`BroadcastCoordinator`] that publishes after commit.
//! - [`capture`] -- Capture and defend state machine with bounded retry.
//! - [`config`] -- Loading of `reign-config.yaml`.
//! - [`cycle`] -- [`Clock`] abstraction and next-tick arithmetic.
//! - [`error`] -- [`GameError`].
//! - [`regeneration`] -- Action point top-ups on each tick.
//! - [`retry`] -- Bounded retry on optimistic write conflicts.
//! - [`scheduler`] -- Per-world recurring timers and their inspection.
//! - [`teams`] -- Team creation, membership and user cleanup.
//! - [`topology`] -- Square and hexagonal neighbourhoods.
//! - [`worlds`] -- World creation, filtered listings, updates, deletion and
//!   board resets.
//!
//! [`Publisher`]: broadcast::Publisher
//! [`BroadcastHub`]: broadcast::BroadcastHub
//! [`BroadcastCoordinator`]: broadcast::BroadcastCoordinator
//! [`BroadcastCoordinator::defer_until_commit`]: broadcast::BroadcastCoordinator::defer_until_commit
//! [`Clock`]: cycle::Clock
//! [`GameError`]: error::GameError

pub mod authz;
pub mod broadcast;
pub mod capture;
pub mod config;
pub mod cycle;
pub mod error;
pub mod regeneration;
pub mod retry;
pub mod scheduler;
pub mod teams;
pub mod topology;
pub mod worlds;

#[cfg(test)]
mod testing;

pub use broadcast::{BroadcastCoordinator, BroadcastHub, Envelope, Publisher, topic_for};
pub use capture::{CaptureEngine, CaptureOutcome};
pub use config::ReignConfig;
pub use cycle::{Clock, ManualClock, SystemClock};
pub use error::GameError;
pub use scheduler::{CycleError, CycleScheduler};
pub use teams::TeamService;
pub use worlds::{NewWorld, WorldFilter, WorldPatch, WorldService};
