//! Observer server for the Reign territory game.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` topics** (`/topic/worlds/{slug}`) streaming every
//!   committed world snapshot via [`tokio::sync::broadcast`]
//! - **REST endpoints** for reading worlds, boards and teams
//! - **Scheduler inspection** (`/api/debug/cycles`) listing every armed
//!   world timer with its next tick
//! - **Health check** (`/health`)
//!
//! # Architecture
//!
//! [`AppState`] wires one store, one clock, one
//! [`BroadcastHub`](reign_core::BroadcastHub), the cycle scheduler and the
//! game services. Game mutations publish to the hub only after commit;
//! each `WebSocket` session subscribes to the hub and forwards the
//! envelopes of its own topic.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use startup::{StartupError, spawn_observer};
pub use state::AppState;
