//! Commit-deferred world broadcasts.
//!
//! Every state change a client can observe ends in a [`WorldBroadcast`]
//! carrying the full board and teams of one world. Mutations never publish
//! directly: they call [`BroadcastCoordinator::defer_until_commit`] on their
//! unit of work, and the publish happens only once the store has accepted
//! it. The hook re-reads the world at publish time, so observers always see
//! committed state, never the staged rows of the mutation itself.
//!
//! Delivery goes through the [`Publisher`] trait. [`BroadcastHub`] is the
//! in-process implementation: a `tokio::sync::broadcast` channel of
//! `{topic, payload}` envelopes that `WebSocket` sessions subscribe to and
//! filter by topic.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reign_db::{UnitOfWork, WorldStore};
use reign_types::{MessageType, UserId, WorldBroadcast};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::cycle::Clock;

/// Capacity of the broadcast channel.
///
/// A subscriber that falls behind by more than this many envelopes gets a
/// [`broadcast::error::RecvError::Lagged`] and skips to the newest one.
pub const BROADCAST_CAPACITY: usize = 256;

/// Topic a world's snapshots are published on.
pub fn topic_for(world_slug: &str) -> String {
    format!("/topic/worlds/{world_slug}")
}

/// Sink for world broadcasts.
pub trait Publisher: Send + Sync {
    /// Deliver `payload` to every subscriber of `topic`.
    fn publish(&self, topic: &str, payload: WorldBroadcast);
}

/// One published message.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Destination topic.
    pub topic: String,
    /// The snapshot. Shared between subscribers.
    pub payload: Arc<WorldBroadcast>,
}

/// In-process fan-out of published envelopes.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    tx: broadcast::Sender<Envelope>,
}

impl BroadcastHub {
    /// Create a hub with no subscribers.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    /// Subscribe to every envelope published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher for BroadcastHub {
    fn publish(&self, topic: &str, payload: WorldBroadcast) {
        let envelope = Envelope {
            topic: topic.to_owned(),
            payload: Arc::new(payload),
        };
        // send only fails when nobody is subscribed.
        let receivers = self.tx.send(envelope).unwrap_or(0);
        debug!(topic, receivers, "World broadcast published");
    }
}

/// Attaches snapshot broadcasts to units of work.
#[derive(Clone)]
pub struct BroadcastCoordinator {
    store: Arc<dyn WorldStore>,
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn Clock>,
}

impl core::fmt::Debug for BroadcastCoordinator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BroadcastCoordinator")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl BroadcastCoordinator {
    /// Create a coordinator publishing snapshots read from `store`.
    pub const fn new(
        store: Arc<dyn WorldStore>,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            publisher,
            clock,
        }
    }

    /// Publish a fresh snapshot of `world_slug` once `uow` commits.
    ///
    /// Nothing is published if the unit of work is dropped or its commit
    /// fails.
    pub fn defer_until_commit(
        &self,
        uow: &mut UnitOfWork,
        world_slug: &str,
        message_type: MessageType,
        actor: Option<UserId>,
    ) {
        self.defer(uow, world_slug, message_type, actor, None);
    }

    /// Like [`defer_until_commit`](Self::defer_until_commit) for a
    /// `CYCLE_TICK`, carrying the time of the following tick.
    pub fn defer_cycle_tick(
        &self,
        uow: &mut UnitOfWork,
        world_slug: &str,
        next_cycle_at: DateTime<Utc>,
    ) {
        self.defer(
            uow,
            world_slug,
            MessageType::CycleTick,
            None,
            Some(next_cycle_at),
        );
    }

    fn defer(
        &self,
        uow: &mut UnitOfWork,
        world_slug: &str,
        message_type: MessageType,
        actor: Option<UserId>,
        next_cycle_at: Option<DateTime<Utc>>,
    ) {
        let this = self.clone();
        let slug = world_slug.to_owned();
        uow.after_commit(move || {
            this.publish_now(&slug, message_type, actor, next_cycle_at);
        });
    }

    /// Read the committed world and publish it. Skips vanished worlds.
    fn publish_now(
        &self,
        world_slug: &str,
        message_type: MessageType,
        actor: Option<UserId>,
        next_cycle_at: Option<DateTime<Utc>>,
    ) {
        let snapshot = self
            .store
            .world_by_slug(world_slug)
            .and_then(|world| self.store.snapshot(world.id));
        let Some(snapshot) = snapshot else {
            warn!(
                world = world_slug,
                message_type = %message_type,
                "World vanished before broadcast, skipping"
            );
            return;
        };

        let payload = WorldBroadcast {
            message_type,
            board: snapshot.board,
            teams: snapshot.teams,
            player_id: actor,
            timestamp: self.clock.now().timestamp_millis(),
            next_cycle_at: next_cycle_at.map(|at| at.timestamp_millis()),
        };
        self.publisher.publish(&topic_for(world_slug), payload);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use parking_lot::Mutex;
    use reign_db::{Change, MemoryStore};
    use reign_types::{Square, World};

    use super::*;
    use crate::cycle::SystemClock;
    use crate::cycle::tests::world_with_cycle;

    /// Publisher that keeps everything it was handed.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingPublisher {
        pub(crate) sent: Mutex<Vec<(String, WorldBroadcast)>>,
    }

    impl RecordingPublisher {
        pub(crate) fn types(&self) -> Vec<MessageType> {
            self.sent.lock().iter().map(|(_, p)| p.message_type).collect()
        }
    }

    impl Publisher for RecordingPublisher {
        fn publish(&self, topic: &str, payload: WorldBroadcast) {
            self.sent.lock().push((topic.to_owned(), payload));
        }
    }

    fn setup() -> (Arc<MemoryStore>, Arc<RecordingPublisher>, BroadcastCoordinator, World) {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let coordinator =
            BroadcastCoordinator::new(store.clone(), publisher.clone(), Arc::new(SystemClock));
        let world = world_with_cycle(60, None);
        let mut uow = UnitOfWork::new();
        uow.put_world(world.clone()).stage(Change::ReplaceBoard {
            world_id: world.id,
            squares: vec![Square::unowned(world.id, 0, 0)],
        });
        uow.commit(store.as_ref()).unwrap();
        (store, publisher, coordinator, world)
    }

    #[test]
    fn publishes_committed_state_after_commit() {
        let (store, publisher, coordinator, world) = setup();
        let actor = UserId::new();
        let mut square = store.square_at(world.id, 0, 0).unwrap();
        square.owner_id = Some(actor);

        let mut uow = UnitOfWork::new();
        uow.put_square(square);
        coordinator.defer_until_commit(
            &mut uow,
            &world.slug,
            MessageType::SquareCaptured,
            Some(actor),
        );
        assert!(publisher.sent.lock().is_empty());
        uow.commit(store.as_ref()).unwrap();

        let sent = publisher.sent.lock();
        let (topic, payload) = sent.first().unwrap();
        assert_eq!(topic, "/topic/worlds/cycle");
        assert_eq!(payload.message_type, MessageType::SquareCaptured);
        assert_eq!(payload.player_id, Some(actor));
        assert_eq!(payload.board.first().unwrap().owner_id, Some(actor));
        assert!(payload.next_cycle_at.is_none());
    }

    #[test]
    fn failed_commit_publishes_nothing() {
        let (store, publisher, coordinator, world) = setup();
        let stale = store.square_at(world.id, 0, 0).unwrap();

        let mut winner = stale.clone();
        winner.defense_bonus = 1;
        let mut uow = UnitOfWork::new();
        uow.put_square(winner);
        uow.commit(store.as_ref()).unwrap();

        let mut loser = stale;
        loser.owner_id = Some(UserId::new());
        let mut uow = UnitOfWork::new();
        uow.put_square(loser);
        coordinator.defer_until_commit(&mut uow, &world.slug, MessageType::SquareCaptured, None);
        assert!(uow.commit(store.as_ref()).is_err());
        assert!(publisher.sent.lock().is_empty());
    }

    #[test]
    fn vanished_world_is_skipped() {
        let (store, publisher, coordinator, world) = setup();
        let mut uow = UnitOfWork::new();
        uow.stage(Change::DeleteWorld(world.id));
        coordinator.defer_until_commit(&mut uow, &world.slug, MessageType::WorldReset, None);
        uow.commit(store.as_ref()).unwrap();
        assert!(publisher.sent.lock().is_empty());
    }

    #[test]
    fn cycle_tick_carries_next_cycle_time() {
        let (store, publisher, coordinator, world) = setup();
        let next = Utc::now();
        let mut uow = UnitOfWork::new();
        coordinator.defer_cycle_tick(&mut uow, &world.slug, next);
        uow.commit(store.as_ref()).unwrap();
        assert_eq!(publisher.types(), vec![MessageType::CycleTick]);
        assert_eq!(
            publisher.sent.lock().first().unwrap().1.next_cycle_at,
            Some(next.timestamp_millis())
        );
    }

    #[tokio::test]
    async fn hub_delivers_envelopes_to_subscribers() {
        let hub = BroadcastHub::new();
        let mut rx = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);
        hub.publish(
            &topic_for("alpha"),
            WorldBroadcast {
                message_type: MessageType::WorldReset,
                board: Vec::new(),
                teams: Vec::new(),
                player_id: None,
                timestamp: 0,
                next_cycle_at: None,
            },
        );
        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.topic, "/topic/worlds/alpha");
        assert_eq!(envelope.payload.message_type, MessageType::WorldReset);
    }
}
