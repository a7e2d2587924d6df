//! Per-world regeneration timers.
//!
//! Every world has at most one armed timer. Timers are one-shot Tokio tasks
//! that sleep until the next tick, run the regeneration step, and arm the
//! following timer. The registry maps each world to the abort handle of its
//! current timer plus a generation number that changes on every arm:
//!
//! ```text
//! start/reschedule ---> [abort old] ---> Scheduled(gen n)
//!                                           |
//!                                        sleep elapses
//!                                           v
//!                                       Firing(gen n)
//!                             world gone /        \ tick ok or failed
//!                                       v          v
//!                                  Stopped     Scheduled(gen n+1)
//! stop ---> [abort] ---> Stopped
//! ```
//!
//! A firing timer only touches the registry if its own generation is still
//! registered, so a `start` or `stop` that lands while a tick is running
//! always wins and no second timer appears.
//!
//! Tick failures never escape: they are logged and a fallback timer is
//! armed one cycle duration out, as long as the world can still be read.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use reign_db::{DbError, UnitOfWork, WorldStore};
use reign_types::{CycleInfo, World, WorldId};
use tokio::task::AbortHandle;
use tracing::{error, info, warn};

use crate::broadcast::BroadcastCoordinator;
use crate::cycle::{Clock, cycle_duration, next_tick_at, next_tick_delay};
use crate::regeneration::stage_regeneration;

/// Failures while processing a tick. Logged, never surfaced.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    /// The tick's unit of work was rejected or could not be written.
    #[error("failed to commit cycle tick: {0}")]
    Store(#[from] DbError),
}

#[derive(Debug)]
struct Entry {
    handle: AbortHandle,
    generation: u64,
    next_cycle_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Registry {
    entries: HashMap<WorldId, Entry>,
    next_generation: u64,
}

impl Registry {
    fn holds(&self, world_id: WorldId, generation: u64) -> bool {
        self.entries
            .get(&world_id)
            .is_some_and(|e| e.generation == generation)
    }
}

/// Which registry entry an arm may replace.
#[derive(Debug, Clone, Copy)]
enum Arm {
    /// Replace whatever is registered, aborting it.
    Replace,
    /// Only replace the entry of this generation (a firing timer re-arming).
    IfCurrent(u64),
}

struct Inner {
    store: Arc<dyn WorldStore>,
    broadcasts: BroadcastCoordinator,
    clock: Arc<dyn Clock>,
    registry: Mutex<Registry>,
}

/// Owner of every world's regeneration timer.
///
/// Cheap to clone; clones share the registry. Timers are spawned onto the
/// ambient Tokio runtime, so `start`, `reschedule` and `initialize_all`
/// must be called from within one.
#[derive(Clone)]
pub struct CycleScheduler {
    inner: Arc<Inner>,
}

impl core::fmt::Debug for CycleScheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CycleScheduler")
            .field("scheduled", &self.inner.registry.lock().entries.len())
            .finish_non_exhaustive()
    }
}

impl CycleScheduler {
    /// Create a scheduler with no armed timers.
    pub fn new(
        store: Arc<dyn WorldStore>,
        broadcasts: BroadcastCoordinator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                broadcasts,
                clock,
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    /// Arm the world's timer for its next tick, cancelling any existing one.
    pub fn start(&self, world: &World) {
        let now = self.inner.clock.now();
        let delay = next_tick_delay(world, now);
        info!(
            world = %world.slug,
            world_id = %world.id,
            delay_secs = delay.as_secs(),
            "Starting world cycle"
        );
        self.inner.arm(world.id, delay, Arm::Replace);
    }

    /// Re-arm after a configuration change or reset. Same as [`start`](Self::start).
    pub fn reschedule(&self, world: &World) {
        self.start(world);
    }

    /// Cancel the world's timer. Does nothing if none is registered.
    pub fn stop(&self, world_id: WorldId) {
        let removed = self.inner.registry.lock().entries.remove(&world_id);
        if let Some(entry) = removed {
            entry.handle.abort();
            info!(world_id = %world_id, "Stopped world cycle");
        }
    }

    /// Whether the world has an armed timer that has not finished.
    pub fn is_scheduled(&self, world_id: WorldId) -> bool {
        self.inner
            .registry
            .lock()
            .entries
            .get(&world_id)
            .is_some_and(|e| !e.handle.is_finished())
    }

    /// When the registered timer for the world fires.
    pub fn next_cycle_at(&self, world_id: WorldId) -> Option<DateTime<Utc>> {
        self.inner
            .registry
            .lock()
            .entries
            .get(&world_id)
            .map(|e| e.next_cycle_at)
    }

    /// Number of registered timers.
    pub fn scheduled_count(&self) -> usize {
        self.inner.registry.lock().entries.len()
    }

    /// Inspection data for every registered world, ordered by slug.
    pub fn scheduled_worlds_info(&self) -> Vec<CycleInfo> {
        let registered: Vec<(WorldId, bool)> = self
            .inner
            .registry
            .lock()
            .entries
            .iter()
            .map(|(id, e)| (*id, !e.handle.is_finished()))
            .collect();

        let now = self.inner.clock.now();
        let mut infos: Vec<CycleInfo> = registered
            .into_iter()
            .map(|(world_id, is_active)| match self.inner.store.world(world_id) {
                Some(world) => {
                    let next = next_tick_at(&world, now);
                    let until = next_tick_delay(&world, now).as_secs();
                    CycleInfo {
                        world_id,
                        cycle_duration_seconds: Some(world.cycle_duration_in_seconds),
                        world_slug: world.slug,
                        world_name: world.name,
                        is_active,
                        next_cycle_at: Some(next),
                        time_until_next_cycle: Some(until),
                    }
                }
                None => CycleInfo {
                    world_id,
                    world_slug: "unknown".to_owned(),
                    world_name: "unknown".to_owned(),
                    is_active,
                    cycle_duration_seconds: None,
                    next_cycle_at: None,
                    time_until_next_cycle: None,
                },
            })
            .collect();
        infos.sort_by(|a, b| a.world_slug.cmp(&b.world_slug));
        infos
    }

    /// Startup pass: anchor worlds that have never ticked, then start every
    /// world exactly once.
    ///
    /// A world whose anchor cannot be written is logged and skipped; the
    /// others still start. Returns how many worlds were started.
    pub fn initialize_all(&self) -> usize {
        let now = self.inner.clock.now();
        let mut started: usize = 0;
        for world in self.inner.store.worlds() {
            match self.inner.ensure_anchor(world, now) {
                Ok(world) => {
                    self.start(&world);
                    started = started.saturating_add(1);
                }
                Err(err) => {
                    error!(error = %err, "Failed to initialize world cycle");
                }
            }
        }

        for info in self.scheduled_worlds_info() {
            info!(
                world = %info.world_slug,
                active = info.is_active,
                next_cycle_at = ?info.next_cycle_at,
                time_until_next_cycle_secs = ?info.time_until_next_cycle,
                "Scheduled world cycle"
            );
        }
        info!(started, "World cycles initialized");
        started
    }
}

impl Inner {
    fn arm(self: &Arc<Self>, world_id: WorldId, delay: Duration, mode: Arm) -> bool {
        let next_cycle_at = TimeDelta::from_std(delay)
            .ok()
            .and_then(|d| self.clock.now().checked_add_signed(d))
            .unwrap_or_else(|| self.clock.now());

        let mut registry = self.registry.lock();
        if matches!(mode, Arm::IfCurrent(current) if !registry.holds(world_id, current)) {
            return false;
        }

        let generation = registry.next_generation;
        registry.next_generation = generation.wrapping_add(1);

        let inner = Arc::clone(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.fire(world_id, generation);
        });

        let previous = registry.entries.insert(
            world_id,
            Entry {
                handle: task.abort_handle(),
                generation,
                next_cycle_at,
            },
        );
        if let (Some(previous), Arm::Replace) = (previous, mode) {
            previous.handle.abort();
        }
        true
    }

    fn fire(self: &Arc<Self>, world_id: WorldId, generation: u64) {
        if !self.registry.lock().holds(world_id, generation) {
            return;
        }

        let Some(world) = self.store.world(world_id) else {
            warn!(world_id = %world_id, "World not found, removing from scheduler");
            let mut registry = self.registry.lock();
            if registry.holds(world_id, generation) {
                registry.entries.remove(&world_id);
            }
            return;
        };

        info!(world = %world.slug, world_id = %world_id, "Processing world cycle");
        let delay = match self.tick(&world) {
            Ok(updated) => cycle_duration(&updated),
            Err(err) => {
                error!(
                    world = %world.slug,
                    world_id = %world_id,
                    error = %err,
                    "Error processing world cycle"
                );
                let Some(current) = self.store.world(world_id) else {
                    let mut registry = self.registry.lock();
                    if registry.holds(world_id, generation) {
                        registry.entries.remove(&world_id);
                    }
                    return;
                };
                cycle_duration(&current)
            }
        };

        if self.arm(world_id, delay, Arm::IfCurrent(generation)) {
            info!(
                world = %world.slug,
                delay_secs = delay.as_secs(),
                "Scheduled next world cycle"
            );
        }
    }

    /// Regenerate points, advance the anchor, and publish `CYCLE_TICK`.
    fn tick(&self, world: &World) -> Result<World, CycleError> {
        let now = self.clock.now();
        let mut uow = UnitOfWork::new();
        let regenerated = stage_regeneration(self.store.as_ref(), world, &mut uow);

        let mut updated = world.clone();
        updated.cycle_started_at = Some(now);
        let next_cycle_at = next_tick_at(&updated, now);
        uow.put_world(updated.clone());
        self.broadcasts
            .defer_cycle_tick(&mut uow, &world.slug, next_cycle_at);
        uow.commit(self.store.as_ref())?;

        info!(
            world = %world.slug,
            regenerated,
            points_per_cycle = world.action_points_per_cycle,
            max_points = world.max_action_points,
            "Regenerated action points"
        );
        Ok(updated)
    }

    /// Give a never-ticked world its anchor.
    fn ensure_anchor(&self, world: World, now: DateTime<Utc>) -> Result<World, CycleError> {
        if world.cycle_started_at.is_some() {
            return Ok(world);
        }
        let mut anchored = world;
        anchored.cycle_started_at = Some(now);
        let mut uow = UnitOfWork::new();
        uow.put_world(anchored.clone());
        uow.commit(self.store.as_ref())?;
        info!(world = %anchored.slug, "Initialized cycle anchor");
        anchored.version = anchored.version.saturating_add(1);
        Ok(anchored)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use reign_db::{Change, MemoryStore};
    use reign_types::{BoardType, MessageType, TeamColor};

    use super::*;
    use crate::testing::{Fixture, FlakyStore};

    /// Wall clock driven by Tokio's (pausable) clock.
    #[derive(Debug)]
    struct TokioClock {
        base: DateTime<Utc>,
        origin: tokio::time::Instant,
    }

    impl TokioClock {
        fn new() -> Self {
            Self {
                base: Utc::now(),
                origin: tokio::time::Instant::now(),
            }
        }
    }

    impl Clock for TokioClock {
        fn now(&self) -> DateTime<Utc> {
            let elapsed = TimeDelta::from_std(self.origin.elapsed()).unwrap();
            self.base + elapsed
        }
    }

    fn scheduler(fx: &Fixture, clock: Arc<dyn Clock>) -> CycleScheduler {
        CycleScheduler::new(fx.store_dyn(), fx.coordinator.clone(), clock)
    }

    fn anchor_now(fx: &Fixture, world: &World, clock: &dyn Clock) -> World {
        let mut world = fx.store.world(world.id).unwrap();
        world.cycle_started_at = Some(clock.now());
        let mut uow = UnitOfWork::new();
        uow.put_world(world.clone());
        uow.commit(fx.store.as_ref()).unwrap();
        fx.store.world(world.id).unwrap()
    }

    async fn sleep_secs(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_start_keeps_one_timer() {
        let fx = Fixture::new();
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
        let world = fx.world("solo", BoardType::Square, 2);
        let world = anchor_now(&fx, &world, clock.as_ref());
        let scheduler = scheduler(&fx, clock);

        scheduler.start(&world);
        scheduler.start(&world);
        scheduler.reschedule(&world);
        assert_eq!(scheduler.scheduled_count(), 1);
        assert!(scheduler.is_scheduled(world.id));

        sleep_secs(61).await;
        assert_eq!(fx.publisher.types(), vec![MessageType::CycleTick]);
        assert_eq!(scheduler.scheduled_count(), 1);
        assert!(scheduler.is_scheduled(world.id));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_without_timer_is_noop() {
        let fx = Fixture::new();
        let scheduler = scheduler(&fx, Arc::new(TokioClock::new()));
        scheduler.stop(WorldId::new());
        assert_eq!(scheduler.scheduled_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_world_never_ticks() {
        let fx = Fixture::new();
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
        let world = fx.world("quiet", BoardType::Square, 2);
        let world = anchor_now(&fx, &world, clock.as_ref());
        let scheduler = scheduler(&fx, clock);

        scheduler.start(&world);
        scheduler.stop(world.id);
        assert!(!scheduler.is_scheduled(world.id));
        sleep_secs(200).await;
        assert!(fx.publisher.types().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn tick_regenerates_and_publishes_next_cycle() {
        let fx = Fixture::new();
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
        let world = fx.world("tick", BoardType::Hexagon, 2);
        let world = anchor_now(&fx, &world, clock.as_ref());
        let player = fx.user("p1");
        let team = fx.team(&world, TeamColor::Purple, player);
        let scheduler = scheduler(&fx, Arc::clone(&clock));

        scheduler.start(&world);
        sleep_secs(61).await;

        let points = fx.store.members_of_team(team).first().unwrap().current_action_points;
        assert_eq!(points, 1);

        let stored = fx.store.world(world.id).unwrap();
        let anchor = stored.cycle_started_at.unwrap();
        assert!(anchor > world.cycle_started_at.unwrap());

        let sent = fx.publisher.sent.lock();
        let (topic, payload) = sent.first().unwrap();
        assert_eq!(topic, "/topic/worlds/tick");
        assert_eq!(payload.message_type, MessageType::CycleTick);
        assert!(payload.player_id.is_none());
        let expected = anchor + TimeDelta::seconds(60);
        assert_eq!(payload.next_cycle_at, Some(expected.timestamp_millis()));
        drop(sent);

        // Three more ticks saturate at the cap of 3.
        sleep_secs(180).await;
        let points = fx.store.members_of_team(team).first().unwrap().current_action_points;
        assert_eq!(points, 3);
        assert_eq!(fx.publisher.types().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn deleted_world_is_removed_without_rearm() {
        let fx = Fixture::new();
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
        let world = fx.world("doomed", BoardType::Square, 2);
        let world = anchor_now(&fx, &world, clock.as_ref());
        let scheduler = scheduler(&fx, clock);
        scheduler.start(&world);

        let mut uow = UnitOfWork::new();
        uow.stage(Change::DeleteWorld(world.id));
        uow.commit(fx.store.as_ref()).unwrap();

        sleep_secs(61).await;
        assert_eq!(scheduler.scheduled_count(), 0);
        assert!(!scheduler.is_scheduled(world.id));
        assert!(fx.publisher.types().is_empty());

        sleep_secs(600).await;
        assert_eq!(scheduler.scheduled_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_tick_rearms_fallback_timer() {
        let fx = Fixture::new();
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
        let world = fx.world("flaky", BoardType::Square, 2);
        let world = anchor_now(&fx, &world, clock.as_ref());
        let flaky = Arc::new(FlakyStore::new(fx.store.clone()));
        let scheduler = CycleScheduler::new(flaky.clone(), fx.coordinator.clone(), clock);
        scheduler.start(&world);

        flaky.fail_writes(true);
        sleep_secs(61).await;
        assert_eq!(flaky.rejected(), 1);
        assert!(fx.publisher.types().is_empty());
        assert!(scheduler.is_scheduled(world.id));

        flaky.fail_writes(false);
        sleep_secs(60).await;
        assert_eq!(fx.publisher.types(), vec![MessageType::CycleTick]);
        assert!(scheduler.is_scheduled(world.id));
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_all_anchors_and_starts_every_world() {
        let fx = Fixture::new();
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
        let anchored = fx.world("anchored", BoardType::Square, 2);
        let mut unanchored = fx.world("fresh", BoardType::Square, 2);
        unanchored.cycle_started_at = None;
        let mut uow = UnitOfWork::new();
        uow.put_world(unanchored.clone());
        uow.commit(fx.store.as_ref()).unwrap();

        let scheduler = scheduler(&fx, clock);
        assert_eq!(scheduler.initialize_all(), 2);
        assert!(scheduler.is_scheduled(anchored.id));
        assert!(scheduler.is_scheduled(unanchored.id));
        assert!(
            fx.store
                .world(unanchored.id)
                .unwrap()
                .cycle_started_at
                .is_some()
        );

        let infos = scheduler.scheduled_worlds_info();
        let slugs: Vec<&str> = infos.iter().map(|i| i.world_slug.as_str()).collect();
        assert_eq!(slugs, vec!["anchored", "fresh"]);
        let fresh = infos.get(1).unwrap();
        assert!(fresh.is_active);
        assert_eq!(fresh.cycle_duration_seconds, Some(60));
        assert_eq!(fresh.time_until_next_cycle, Some(60));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_store_world_reports_unknown() {
        let store = Arc::new(MemoryStore::new());
        let fx = Fixture::new();
        let scheduler = CycleScheduler::new(
            store,
            fx.coordinator.clone(),
            Arc::new(TokioClock::new()),
        );
        let ghost = crate::cycle::tests::world_with_cycle(60, Some(Utc::now()));
        scheduler.start(&ghost);
        let infos = scheduler.scheduled_worlds_info();
        let info = infos.first().unwrap();
        assert_eq!(info.world_slug, "unknown");
        assert!(info.next_cycle_at.is_none());
    }
}
