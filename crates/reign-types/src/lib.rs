//! Shared type definitions for the Reign territory game.
//!
//! This crate is the single source of truth for the entities stored by
//! `reign-db`, mutated by `reign-core`, and published to clients by
//! `reign-observer`. Wire types flow downstream to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all entity identifiers
//! - [`enums`] -- Board topology, team colours, broadcast message types
//! - [`structs`] -- Entities (worlds, squares, teams, members, users) and the
//!   snapshot payload

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{BoardType, MessageType, TeamColor};
pub use ids::{SquareId, TeamId, TeamMemberId, UserId, WorldId};
pub use structs::{
    CycleInfo, MemberView, Square, Team, TeamMember, TeamView, User, World, WorldBroadcast,
    WorldSnapshot,
};
