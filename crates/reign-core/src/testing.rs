//! Fixtures shared by the unit tests of this crate.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use reign_db::{Change, ChangeSet, DbError, MemoryStore, UnitOfWork, WorldStore};
use reign_types::{
    BoardType, Square, Team, TeamColor, TeamId, TeamMember, User, UserId, World, WorldId,
    WorldSnapshot,
};

use crate::broadcast::BroadcastCoordinator;
use crate::broadcast::tests::RecordingPublisher;
use crate::cycle::SystemClock;
use crate::cycle::tests::world_with_cycle;

pub(crate) struct Fixture {
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) publisher: Arc<RecordingPublisher>,
    pub(crate) coordinator: BroadcastCoordinator,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let coordinator =
            BroadcastCoordinator::new(store.clone(), publisher.clone(), Arc::new(SystemClock));
        Self {
            store,
            publisher,
            coordinator,
        }
    }

    /// Store a world with a freshly generated `size` by `size` board.
    pub(crate) fn world(&self, slug: &str, board_type: BoardType, size: u32) -> World {
        let mut world = world_with_cycle(60, Some(Utc::now()));
        world.slug = slug.to_owned();
        world.board_type = board_type;
        world.board_size = size;
        let n = i32::try_from(size).unwrap();
        let squares = (0..n)
            .flat_map(|x| (0..n).map(move |y| (x, y)))
            .map(|(x, y)| Square::unowned(world.id, x, y))
            .collect();
        let mut uow = UnitOfWork::new();
        uow.put_world(world.clone()).stage(Change::ReplaceBoard {
            world_id: world.id,
            squares,
        });
        uow.commit(self.store.as_ref()).unwrap();
        self.store.world(world.id).unwrap()
    }

    pub(crate) fn user(&self, username: &str) -> UserId {
        let user = User {
            id: UserId::new(),
            username: username.to_owned(),
        };
        let mut uow = UnitOfWork::new();
        uow.put_user(user.clone());
        uow.commit(self.store.as_ref()).unwrap();
        user.id
    }

    /// Store a team in `world` whose only member is `creator`.
    pub(crate) fn team(&self, world: &World, color: TeamColor, creator: UserId) -> TeamId {
        let team = Team {
            id: TeamId::new(),
            world_id: world.id,
            name: format!("team-{}", color.as_str()),
            color,
            creator_id: creator,
            created_at: Utc::now(),
            version: 0,
        };
        let mut uow = UnitOfWork::new();
        uow.put_team(team.clone())
            .put_member(TeamMember::new(team.id, creator, Utc::now()));
        uow.commit(self.store.as_ref()).unwrap();
        team.id
    }

    pub(crate) fn join(&self, team_id: TeamId, user: UserId) {
        add_member(self.store.as_ref(), team_id, user);
    }

    /// Force ownership of a square, bypassing the capture rules.
    pub(crate) fn own(&self, world: &World, x: i32, y: i32, owner: UserId, bonus: u32) {
        let mut square = self.store.square_at(world.id, x, y).unwrap();
        square.owner_id = Some(owner);
        square.defense_bonus = bonus;
        let mut uow = UnitOfWork::new();
        uow.put_square(square);
        uow.commit(self.store.as_ref()).unwrap();
    }

    pub(crate) fn square(&self, world: &World, x: i32, y: i32) -> Square {
        self.store.square_at(world.id, x, y).unwrap()
    }

    pub(crate) fn store_dyn(&self) -> Arc<dyn WorldStore> {
        self.store.clone()
    }
}

/// Add `user` to a team, rewriting the team row like the services do.
pub(crate) fn add_member(store: &dyn WorldStore, team_id: TeamId, user: UserId) {
    let team = store.team(team_id).unwrap();
    let mut uow = UnitOfWork::new();
    uow.put_team(team)
        .put_member(TeamMember::new(team_id, user, Utc::now()));
    uow.commit(store).unwrap();
}

type Interleaved = Box<dyn FnOnce(&MemoryStore) + Send>;

/// Store wrapper for concurrency tests.
///
/// Writes can be switched to fail with a conflict, or a competing write
/// can be committed to the inner store just before the next write lands.
/// `rejected` counts every conflict returned, forced or real.
pub(crate) struct FlakyStore {
    inner: Arc<MemoryStore>,
    failing: AtomicBool,
    interleaved: Mutex<Option<Interleaved>>,
    rejected: AtomicUsize,
}

impl FlakyStore {
    pub(crate) const fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
            interleaved: Mutex::new(None),
            rejected: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Run `write` against the inner store right before the next `apply`.
    pub(crate) fn before_next_write<F>(&self, write: F)
    where
        F: FnOnce(&MemoryStore) + Send + 'static,
    {
        *self.interleaved.lock() = Some(Box::new(write));
    }

    pub(crate) fn rejected(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }
}

impl WorldStore for FlakyStore {
    fn world(&self, id: WorldId) -> Option<World> {
        self.inner.world(id)
    }

    fn world_by_slug(&self, slug: &str) -> Option<World> {
        self.inner.world_by_slug(slug)
    }

    fn worlds(&self) -> Vec<World> {
        self.inner.worlds()
    }

    fn square_at(&self, world_id: WorldId, x: i32, y: i32) -> Option<Square> {
        self.inner.square_at(world_id, x, y)
    }

    fn board(&self, world_id: WorldId) -> Vec<Square> {
        self.inner.board(world_id)
    }

    fn team(&self, id: TeamId) -> Option<Team> {
        self.inner.team(id)
    }

    fn teams_in_world(&self, world_id: WorldId) -> Vec<Team> {
        self.inner.teams_in_world(world_id)
    }

    fn members_of_team(&self, team_id: TeamId) -> Vec<TeamMember> {
        self.inner.members_of_team(team_id)
    }

    fn membership(&self, user_id: UserId, world_id: WorldId) -> Option<(Team, TeamMember)> {
        self.inner.membership(user_id, world_id)
    }

    fn memberships_of_user(&self, user_id: UserId) -> Vec<(Team, TeamMember)> {
        self.inner.memberships_of_user(user_id)
    }

    fn user(&self, id: UserId) -> Option<User> {
        self.inner.user(id)
    }

    fn snapshot(&self, world_id: WorldId) -> Option<WorldSnapshot> {
        self.inner.snapshot(world_id)
    }

    fn apply(&self, changes: ChangeSet) -> Result<(), DbError> {
        let interleaved = self.interleaved.lock().take();
        if let Some(write) = interleaved {
            write(&self.inner);
        }
        let result = if self.failing.load(Ordering::SeqCst) {
            Err(DbError::Conflict {
                entity: "square",
                id: "any".to_owned(),
                reason: "writes disabled".to_owned(),
            })
        } else {
            self.inner.apply(changes)
        };
        if result.as_ref().is_err_and(DbError::is_conflict) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
        }
        result
    }
}
