//! Shared application state for the observer server.
//!
//! [`AppState`] is the single wiring point of the game: it owns the
//! broadcast hub that `WebSocket` sessions subscribe to, the cycle
//! scheduler, and the world and team services, all sharing one store and
//! one clock. The server binary builds it once and hands it to the router.

use std::sync::Arc;

use reign_core::broadcast::{BroadcastCoordinator, BroadcastHub, Envelope};
use reign_core::config::WorldDefaults;
use reign_core::cycle::Clock;
use reign_core::{CaptureEngine, CycleScheduler, TeamService, WorldService};
use reign_db::WorldStore;
use tokio::sync::broadcast;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The store every service reads and writes.
    pub store: Arc<dyn WorldStore>,
    /// Fan-out of committed world snapshots.
    pub hub: BroadcastHub,
    /// Per-world regeneration timers.
    pub scheduler: CycleScheduler,
    /// World lifecycle and board queries.
    pub worlds: WorldService,
    /// Team membership.
    pub teams: TeamService,
    /// Capture and defend.
    pub capture: CaptureEngine,
    /// Wall clock shared by all services.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wire the hub, scheduler and services around `store`.
    pub fn new(store: Arc<dyn WorldStore>, clock: Arc<dyn Clock>, defaults: WorldDefaults) -> Self {
        let hub = BroadcastHub::new();
        let broadcasts =
            BroadcastCoordinator::new(Arc::clone(&store), Arc::new(hub.clone()), Arc::clone(&clock));
        let scheduler =
            CycleScheduler::new(Arc::clone(&store), broadcasts.clone(), Arc::clone(&clock));
        let worlds = WorldService::new(
            Arc::clone(&store),
            broadcasts.clone(),
            scheduler.clone(),
            Arc::clone(&clock),
            defaults,
        );
        let teams = TeamService::new(Arc::clone(&store), broadcasts.clone(), Arc::clone(&clock));
        let capture = CaptureEngine::new(Arc::clone(&store), broadcasts);
        Self {
            store,
            hub,
            scheduler,
            worlds,
            teams,
            capture,
            clock,
        }
    }

    /// Subscribe to every envelope published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.hub.subscribe()
    }
}
