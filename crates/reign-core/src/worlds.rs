//! World lifecycle: creation with board generation, updates, deletion and
//! board resets.
//!
//! A world always owns exactly `board_size * board_size` squares. Creating a
//! world writes the world row and its board in one unit of work; changing
//! the board size wipes and regenerates the board in the same unit of work
//! as the world update. Scheduler side effects (start, restart, stop) are
//! attached as commit hooks, so a rejected write never touches the timers.

use std::sync::Arc;

use reign_db::{Change, UnitOfWork, WorldStore};
use reign_types::{BoardType, MessageType, Square, UserId, World, WorldId};
use tracing::info;

use crate::broadcast::BroadcastCoordinator;
use crate::config::{SeedWorld, WorldDefaults};
use crate::cycle::Clock;
use crate::error::GameError;
use crate::scheduler::CycleScheduler;

/// Parameters of a new world. Unset fields come from [`WorldDefaults`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewWorld {
    /// Unique external key.
    pub slug: String,
    /// Display name; defaults to the slug.
    pub name: Option<String>,
    /// Creating user, if any.
    pub owner_id: Option<UserId>,
    /// Board topology.
    pub board_type: Option<BoardType>,
    /// Board edge length.
    pub board_size: Option<u32>,
    /// Whether the world is open to everyone.
    pub is_public: Option<bool>,
    /// Maximum number of players across all teams.
    pub max_players: Option<u32>,
    /// Maximum number of teams.
    pub max_teams: Option<u32>,
    /// Minimum number of teams.
    pub min_teams: Option<u32>,
    /// Maximum members per team.
    pub max_team_size: Option<u32>,
    /// Minimum members per team.
    pub min_team_size: Option<u32>,
    /// Whether players may create their own teams.
    pub allow_player_team_creation: Option<bool>,
    /// Seconds between regeneration ticks.
    pub cycle_duration_in_seconds: Option<u32>,
    /// Action points granted per member per tick.
    pub action_points_per_cycle: Option<u32>,
    /// Cap on a member's action points.
    pub max_action_points: Option<u32>,
}

impl NewWorld {
    /// A world with the given slug and every other field defaulted.
    pub fn named(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            ..Self::default()
        }
    }
}

impl From<&SeedWorld> for NewWorld {
    fn from(seed: &SeedWorld) -> Self {
        Self {
            slug: seed.slug.clone(),
            name: seed.name.clone(),
            board_type: seed.board_type,
            board_size: seed.board_size,
            cycle_duration_in_seconds: seed.cycle_duration_in_seconds,
            action_points_per_cycle: seed.action_points_per_cycle,
            max_action_points: seed.max_action_points,
            ..Self::default()
        }
    }
}

/// Fields to change on an existing world. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldPatch {
    /// Display name.
    pub name: Option<String>,
    /// Board topology.
    pub board_type: Option<BoardType>,
    /// Board edge length. A change regenerates the board.
    pub board_size: Option<u32>,
    /// Whether the world is open to everyone.
    pub is_public: Option<bool>,
    /// Maximum number of players across all teams.
    pub max_players: Option<u32>,
    /// Maximum number of teams.
    pub max_teams: Option<u32>,
    /// Minimum number of teams.
    pub min_teams: Option<u32>,
    /// Maximum members per team.
    pub max_team_size: Option<u32>,
    /// Minimum members per team.
    pub min_team_size: Option<u32>,
    /// Whether players may create their own teams.
    pub allow_player_team_creation: Option<bool>,
    /// Seconds between regeneration ticks. A change restarts the timer.
    pub cycle_duration_in_seconds: Option<u32>,
    /// Action points granted per member per tick.
    pub action_points_per_cycle: Option<u32>,
    /// Cap on a member's action points.
    pub max_action_points: Option<u32>,
}

/// Which worlds a listing returns.
///
/// The default lists every public world.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldFilter {
    /// Also list private worlds owned by this user.
    pub viewer: Option<UserId>,
    /// Keep only public (`true`) or only private (`false`) worlds.
    pub is_public: Option<bool>,
    /// Keep only worlds with this board topology.
    pub board_type: Option<BoardType>,
    /// Case-insensitive substring the world name must contain. Blank
    /// matches everything.
    pub search: Option<String>,
    /// Drop worlds whose players across all teams reached `max_players`.
    pub hide_full: bool,
}

impl WorldFilter {
    /// Whether `world` passes every filter except `hide_full`.
    fn admits(&self, world: &World) -> bool {
        let visible =
            world.is_public || self.viewer.is_some_and(|viewer| world.owner_id == Some(viewer));
        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        visible
            && self.is_public.is_none_or(|public| world.is_public == public)
            && self.board_type.is_none_or(|kind| world.board_type == kind)
            && search.is_none_or(|needle| world.name.to_lowercase().contains(&needle))
    }
}

/// World management and board queries.
#[derive(Debug, Clone)]
pub struct WorldService {
    store: Arc<dyn WorldStore>,
    broadcasts: BroadcastCoordinator,
    scheduler: CycleScheduler,
    clock: Arc<dyn Clock>,
    defaults: WorldDefaults,
}

impl WorldService {
    /// Create the service.
    pub const fn new(
        store: Arc<dyn WorldStore>,
        broadcasts: BroadcastCoordinator,
        scheduler: CycleScheduler,
        clock: Arc<dyn Clock>,
        defaults: WorldDefaults,
    ) -> Self {
        Self {
            store,
            broadcasts,
            scheduler,
            clock,
            defaults,
        }
    }

    /// Create a world and its board, anchor its cycle at now, and start its
    /// timer once committed.
    ///
    /// # Errors
    ///
    /// - [`GameError::NotFound`] if an owner is given but does not exist.
    /// - [`GameError::InvalidArgument`] for a blank slug, a zero board size
    ///   or a zero cycle duration.
    /// - [`GameError::StateViolation`] if the slug is taken.
    /// - [`GameError::Store`] if the write fails.
    pub fn create_world(&self, params: NewWorld) -> Result<World, GameError> {
        self.insert_world(params, true)
    }

    fn insert_world(&self, params: NewWorld, start_cycle: bool) -> Result<World, GameError> {
        let slug = params.slug.trim().to_owned();
        if slug.is_empty() {
            return Err(GameError::invalid("world slug must not be blank"));
        }
        if self.store.world_by_slug(&slug).is_some() {
            return Err(GameError::violation(format!(
                "world slug '{slug}' is already taken"
            )));
        }
        if let Some(owner) = params.owner_id.filter(|owner| self.store.user(*owner).is_none()) {
            return Err(GameError::not_found(format!("user {owner}")));
        }

        let d = &self.defaults;
        let now = self.clock.now();
        let mut world = World {
            id: WorldId::new(),
            name: params.name.unwrap_or_else(|| slug.clone()),
            slug,
            owner_id: params.owner_id,
            board_type: params.board_type.unwrap_or(d.board_type),
            board_size: params.board_size.unwrap_or(d.board_size),
            is_public: params.is_public.unwrap_or(d.is_public),
            max_players: params.max_players.unwrap_or(d.max_players),
            max_teams: params.max_teams.unwrap_or(d.max_teams),
            min_teams: params.min_teams.unwrap_or(d.min_teams),
            max_team_size: params.max_team_size.unwrap_or(d.max_team_size),
            min_team_size: params.min_team_size.unwrap_or(d.min_team_size),
            allow_player_team_creation: params
                .allow_player_team_creation
                .unwrap_or(d.allow_player_team_creation),
            cycle_duration_in_seconds: params
                .cycle_duration_in_seconds
                .unwrap_or(d.cycle_duration_in_seconds),
            action_points_per_cycle: params
                .action_points_per_cycle
                .unwrap_or(d.action_points_per_cycle),
            max_action_points: params.max_action_points.unwrap_or(d.max_action_points),
            cycle_started_at: Some(now),
            created_at: now,
            version: 0,
        };
        validate(&world)?;

        let squares = generate_board(world.id, world.board_size)?;
        let mut uow = UnitOfWork::new();
        uow.put_world(world.clone()).stage(Change::ReplaceBoard {
            world_id: world.id,
            squares,
        });
        world.version = 1;
        if start_cycle {
            let scheduler = self.scheduler.clone();
            let committed = world.clone();
            uow.after_commit(move || scheduler.start(&committed));
        }
        uow.commit(self.store.as_ref())?;

        info!(
            world = %world.slug,
            world_id = %world.id,
            board_type = ?world.board_type,
            board_size = world.board_size,
            cycle_secs = world.cycle_duration_in_seconds,
            "World created"
        );
        Ok(world)
    }

    /// Create every seed world whose slug is not in the store yet.
    ///
    /// Seeded worlds are anchored but not scheduled; the startup call to
    /// [`CycleScheduler::initialize_all`] arms them together with the
    /// worlds already in the store. Returns how many worlds were created.
    ///
    /// # Errors
    ///
    /// Fails on the first seed that cannot be created.
    pub fn seed_worlds(&self, seeds: &[SeedWorld]) -> Result<usize, GameError> {
        let mut created: usize = 0;
        for seed in seeds {
            if self.store.world_by_slug(seed.slug.trim()).is_some() {
                continue;
            }
            self.insert_world(NewWorld::from(seed), false)?;
            created = created.saturating_add(1);
        }
        Ok(created)
    }

    /// Apply `patch` to a world.
    ///
    /// A new board size regenerates the board and broadcasts `WORLD_RESET`;
    /// a new cycle duration restarts the world's timer.
    ///
    /// # Errors
    ///
    /// - [`GameError::NotFound`] if the world does not exist.
    /// - [`GameError::InvalidArgument`] for a zero board size or cycle.
    /// - [`GameError::Store`] if the world changed concurrently.
    pub fn update_world(&self, world_slug: &str, patch: WorldPatch) -> Result<World, GameError> {
        let current = self.world_by_slug(world_slug)?;
        let mut world = current.clone();
        if let Some(name) = patch.name {
            world.name = name;
        }
        world.board_type = patch.board_type.unwrap_or(world.board_type);
        world.board_size = patch.board_size.unwrap_or(world.board_size);
        world.is_public = patch.is_public.unwrap_or(world.is_public);
        world.max_players = patch.max_players.unwrap_or(world.max_players);
        world.max_teams = patch.max_teams.unwrap_or(world.max_teams);
        world.min_teams = patch.min_teams.unwrap_or(world.min_teams);
        world.max_team_size = patch.max_team_size.unwrap_or(world.max_team_size);
        world.min_team_size = patch.min_team_size.unwrap_or(world.min_team_size);
        world.allow_player_team_creation = patch
            .allow_player_team_creation
            .unwrap_or(world.allow_player_team_creation);
        world.cycle_duration_in_seconds = patch
            .cycle_duration_in_seconds
            .unwrap_or(world.cycle_duration_in_seconds);
        world.action_points_per_cycle = patch
            .action_points_per_cycle
            .unwrap_or(world.action_points_per_cycle);
        world.max_action_points = patch.max_action_points.unwrap_or(world.max_action_points);
        validate(&world)?;

        let regenerate = world.board_size != current.board_size;
        let retime = world.cycle_duration_in_seconds != current.cycle_duration_in_seconds;

        let mut uow = UnitOfWork::new();
        uow.put_world(world.clone());
        if regenerate {
            uow.stage(Change::ReplaceBoard {
                world_id: world.id,
                squares: generate_board(world.id, world.board_size)?,
            });
            self.broadcasts
                .defer_until_commit(&mut uow, &world.slug, MessageType::WorldReset, None);
        }
        world.version = world.version.saturating_add(1);
        if retime {
            let scheduler = self.scheduler.clone();
            let committed = world.clone();
            uow.after_commit(move || scheduler.reschedule(&committed));
        }
        uow.commit(self.store.as_ref())?;

        info!(
            world = %world.slug,
            board_regenerated = regenerate,
            cycle_restarted = retime,
            "World updated"
        );
        Ok(world)
    }

    /// Delete a world with its board, teams and memberships, and stop its
    /// timer.
    ///
    /// # Errors
    ///
    /// - [`GameError::NotFound`] if the world does not exist.
    /// - [`GameError::Store`] if the write fails.
    pub fn delete_world(&self, world_slug: &str) -> Result<(), GameError> {
        let world = self.world_by_slug(world_slug)?;
        let mut uow = UnitOfWork::new();
        uow.stage(Change::DeleteWorld(world.id));
        let scheduler = self.scheduler.clone();
        let world_id = world.id;
        uow.after_commit(move || scheduler.stop(world_id));
        uow.commit(self.store.as_ref())?;

        info!(world = %world.slug, world_id = %world.id, "World deleted");
        Ok(())
    }

    /// Release every square of the world and broadcast `WORLD_RESET`.
    ///
    /// # Errors
    ///
    /// - [`GameError::NotFound`] if the world does not exist.
    /// - [`GameError::Store`] if the write fails.
    pub fn reset_world_board(
        &self,
        world_slug: &str,
        actor: Option<UserId>,
    ) -> Result<(), GameError> {
        let world = self.world_by_slug(world_slug)?;
        let mut uow = UnitOfWork::new();
        uow.stage(Change::ResetBoard(world.id));
        self.broadcasts
            .defer_until_commit(&mut uow, &world.slug, MessageType::WorldReset, actor);
        uow.commit(self.store.as_ref())?;

        info!(world = %world.slug, "World board reset");
        Ok(())
    }

    /// Look a world up by slug.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::NotFound`] if no world has this slug.
    pub fn world_by_slug(&self, world_slug: &str) -> Result<World, GameError> {
        self.store
            .world_by_slug(world_slug)
            .ok_or_else(|| GameError::not_found(format!("world {world_slug}")))
    }

    /// The world's squares, ordered by `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::NotFound`] if no world has this slug.
    pub fn world_board(&self, world_slug: &str) -> Result<Vec<Square>, GameError> {
        let world = self.world_by_slug(world_slug)?;
        Ok(self.store.board(world.id))
    }

    /// Every world.
    pub fn all_worlds(&self) -> Vec<World> {
        self.store.worlds()
    }

    /// Worlds visible to the filter's viewer that pass every filter.
    pub fn list_worlds(&self, filter: &WorldFilter) -> Vec<World> {
        self.store
            .worlds()
            .into_iter()
            .filter(|world| filter.admits(world))
            .filter(|world| !filter.hide_full || !self.is_full(world))
            .collect()
    }

    /// Whether the players across all teams reached `max_players`.
    fn is_full(&self, world: &World) -> bool {
        let players: usize = self
            .store
            .teams_in_world(world.id)
            .iter()
            .map(|team| self.store.member_count(team.id))
            .sum();
        u32::try_from(players).unwrap_or(u32::MAX) >= world.max_players
    }
}

fn validate(world: &World) -> Result<(), GameError> {
    if world.board_size == 0 {
        return Err(GameError::invalid("board size must be at least 1"));
    }
    if world.cycle_duration_in_seconds == 0 {
        return Err(GameError::invalid(
            "cycle duration must be greater than zero",
        ));
    }
    Ok(())
}

/// Every `(x, y)` of an `n x n` board, unowned.
fn generate_board(world_id: WorldId, size: u32) -> Result<Vec<Square>, GameError> {
    let n = i32::try_from(size).map_err(|_| GameError::invalid("board size is too large"))?;
    Ok((0..n)
        .flat_map(|x| (0..n).map(move |y| Square::unowned(world_id, x, y)))
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use reign_types::TeamColor;

    use super::*;
    use crate::cycle::SystemClock;
    use crate::testing::Fixture;

    fn service(fx: &Fixture) -> WorldService {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let scheduler = CycleScheduler::new(fx.store_dyn(), fx.coordinator.clone(), clock.clone());
        WorldService::new(
            fx.store_dyn(),
            fx.coordinator.clone(),
            scheduler,
            clock,
            WorldDefaults::default(),
        )
    }

    #[tokio::test]
    async fn create_world_generates_board_and_starts_cycle() {
        let fx = Fixture::new();
        let svc = service(&fx);
        let world = svc
            .create_world(NewWorld {
                board_size: Some(4),
                board_type: Some(BoardType::Square),
                ..NewWorld::named("  meadow ")
            })
            .unwrap();

        assert_eq!(world.slug, "meadow");
        assert_eq!(world.name, "meadow");
        assert!(world.cycle_started_at.is_some());
        assert_eq!(world.max_team_size, 3);
        assert_eq!(svc.world_board("meadow").unwrap().len(), 16);
        assert_eq!(fx.store.world(world.id).unwrap().version, world.version);
        assert!(svc.scheduler.is_scheduled(world.id));
    }

    #[tokio::test]
    async fn create_world_validation() {
        let fx = Fixture::new();
        let svc = service(&fx);
        svc.create_world(NewWorld::named("taken")).unwrap();

        assert!(matches!(
            svc.create_world(NewWorld::named("taken")),
            Err(GameError::StateViolation(_))
        ));
        assert!(matches!(
            svc.create_world(NewWorld::named(" ")),
            Err(GameError::InvalidArgument(_))
        ));
        assert!(matches!(
            svc.create_world(NewWorld {
                board_size: Some(0),
                ..NewWorld::named("empty")
            }),
            Err(GameError::InvalidArgument(_))
        ));
        assert!(matches!(
            svc.create_world(NewWorld {
                cycle_duration_in_seconds: Some(0),
                ..NewWorld::named("frozen")
            }),
            Err(GameError::InvalidArgument(_))
        ));
        assert_eq!(svc.all_worlds().len(), 1);
        assert_eq!(svc.scheduler.scheduled_count(), 1);
    }

    #[tokio::test]
    async fn resizing_regenerates_the_board() {
        let fx = Fixture::new();
        let svc = service(&fx);
        let world = svc
            .create_world(NewWorld {
                board_size: Some(3),
                ..NewWorld::named("grow")
            })
            .unwrap();
        let owner = fx.user("owner");
        fx.own(&world, 0, 0, owner, 1);

        let updated = svc
            .update_world(
                "grow",
                WorldPatch {
                    board_size: Some(5),
                    name: Some("Grown".to_owned()),
                    ..WorldPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Grown");
        let board = svc.world_board("grow").unwrap();
        assert_eq!(board.len(), 25);
        assert!(board.iter().all(|s| s.owner_id.is_none()));
        assert_eq!(fx.publisher.types(), vec![MessageType::WorldReset]);
    }

    #[tokio::test]
    async fn changing_the_cycle_restarts_the_timer() {
        let fx = Fixture::new();
        let svc = service(&fx);
        let world = svc.create_world(NewWorld::named("tempo")).unwrap();
        let before = svc.scheduler.next_cycle_at(world.id).unwrap();

        let updated = svc
            .update_world(
                "tempo",
                WorldPatch {
                    cycle_duration_in_seconds: Some(30),
                    ..WorldPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.cycle_duration_in_seconds, 30);
        let after = svc.scheduler.next_cycle_at(world.id).unwrap();
        assert!(after < before);
        assert_eq!(svc.scheduler.scheduled_count(), 1);
        assert!(fx.publisher.types().is_empty());

        assert!(matches!(
            svc.update_world(
                "tempo",
                WorldPatch {
                    cycle_duration_in_seconds: Some(0),
                    ..WorldPatch::default()
                }
            ),
            Err(GameError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn delete_world_cascades_and_stops_cycle() {
        let fx = Fixture::new();
        let svc = service(&fx);
        let world = svc.create_world(NewWorld::named("doomed")).unwrap();
        let user = fx.user("u");
        let team = fx.team(&world, TeamColor::Green, user);

        svc.delete_world("doomed").unwrap();
        assert!(!svc.scheduler.is_scheduled(world.id));
        assert!(fx.store.team(team).is_none());
        assert!(fx.store.board(world.id).is_empty());
        assert!(matches!(
            svc.delete_world("doomed"),
            Err(GameError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn reset_board_releases_squares_and_broadcasts() {
        let fx = Fixture::new();
        let svc = service(&fx);
        let world = svc
            .create_world(NewWorld {
                board_size: Some(2),
                ..NewWorld::named("wipe")
            })
            .unwrap();
        let owner = fx.user("owner");
        fx.own(&world, 1, 1, owner, 2);

        svc.reset_world_board("wipe", Some(owner)).unwrap();
        let square = fx.square(&world, 1, 1);
        assert!(square.owner_id.is_none());
        assert_eq!(square.defense_bonus, 0);

        let sent = fx.publisher.sent.lock();
        let (topic, payload) = sent.first().unwrap();
        assert_eq!(topic, "/topic/worlds/wipe");
        assert_eq!(payload.message_type, MessageType::WorldReset);
        assert_eq!(payload.player_id, Some(owner));
    }

    #[tokio::test]
    async fn seeding_skips_existing_slugs() {
        let fx = Fixture::new();
        let svc = service(&fx);
        svc.create_world(NewWorld::named("alpha")).unwrap();
        let seeds = vec![
            SeedWorld {
                slug: "alpha".to_owned(),
                name: None,
                board_type: None,
                board_size: None,
                cycle_duration_in_seconds: None,
                action_points_per_cycle: None,
                max_action_points: None,
            },
            SeedWorld {
                slug: "beta".to_owned(),
                name: Some("Beta".to_owned()),
                board_type: Some(BoardType::Square),
                board_size: Some(2),
                cycle_duration_in_seconds: Some(10),
                action_points_per_cycle: None,
                max_action_points: Some(5),
            },
        ];

        assert_eq!(svc.seed_worlds(&seeds).unwrap(), 1);
        let beta = svc.world_by_slug("beta").unwrap();
        assert_eq!(beta.name, "Beta");
        assert_eq!(beta.max_action_points, 5);
        assert!(beta.cycle_started_at.is_some());
        assert_eq!(svc.world_board("beta").unwrap().len(), 4);
        assert_eq!(svc.seed_worlds(&seeds).unwrap(), 0);

        // Seeding leaves arming to the startup initializer.
        assert!(!svc.scheduler.is_scheduled(beta.id));
        assert_eq!(svc.scheduler.initialize_all(), 2);
        assert!(svc.scheduler.is_scheduled(beta.id));
        assert_eq!(svc.scheduler.scheduled_count(), 2);
    }

    #[tokio::test]
    async fn unknown_owner_is_not_found() {
        let fx = Fixture::new();
        let svc = service(&fx);
        let err = svc
            .create_world(NewWorld {
                owner_id: Some(UserId::new()),
                ..NewWorld::named("orphan")
            })
            .unwrap_err();
        assert!(matches!(err, GameError::NotFound(_)));
        assert!(svc.all_worlds().is_empty());
        assert_eq!(svc.scheduler.scheduled_count(), 0);

        let owner = fx.user("owner");
        let world = svc
            .create_world(NewWorld {
                owner_id: Some(owner),
                ..NewWorld::named("owned")
            })
            .unwrap();
        assert_eq!(world.owner_id, Some(owner));
    }

    fn slugs(worlds: Vec<World>) -> Vec<String> {
        let mut slugs: Vec<String> = worlds.into_iter().map(|w| w.slug).collect();
        slugs.sort();
        slugs
    }

    /// A public square meadow for two, a public hive, and alice's private vault.
    fn listing_fixture(fx: &Fixture, svc: &WorldService) -> (UserId, World) {
        let alice = fx.user("alice");
        let meadow = svc
            .create_world(NewWorld {
                name: Some("Green Meadow".to_owned()),
                board_type: Some(BoardType::Square),
                board_size: Some(2),
                max_players: Some(2),
                ..NewWorld::named("meadow")
            })
            .unwrap();
        svc.create_world(NewWorld {
            name: Some("Hive".to_owned()),
            board_type: Some(BoardType::Hexagon),
            board_size: Some(2),
            ..NewWorld::named("hive")
        })
        .unwrap();
        svc.create_world(NewWorld {
            name: Some("Secret Vault".to_owned()),
            owner_id: Some(alice),
            is_public: Some(false),
            board_type: Some(BoardType::Square),
            board_size: Some(2),
            ..NewWorld::named("vault")
        })
        .unwrap();
        (alice, meadow)
    }

    #[tokio::test]
    async fn listing_shows_public_and_owned_worlds() {
        let fx = Fixture::new();
        let svc = service(&fx);
        let (alice, _) = listing_fixture(&fx, &svc);
        let bob = fx.user("bob");

        assert_eq!(slugs(svc.list_worlds(&WorldFilter::default())), ["hive", "meadow"]);
        let as_alice = WorldFilter {
            viewer: Some(alice),
            ..WorldFilter::default()
        };
        assert_eq!(slugs(svc.list_worlds(&as_alice)), ["hive", "meadow", "vault"]);
        let as_bob = WorldFilter {
            viewer: Some(bob),
            ..WorldFilter::default()
        };
        assert_eq!(slugs(svc.list_worlds(&as_bob)), ["hive", "meadow"]);
        let private_only = WorldFilter {
            is_public: Some(false),
            ..as_alice
        };
        assert_eq!(slugs(svc.list_worlds(&private_only)), ["vault"]);
    }

    #[tokio::test]
    async fn listing_filters_by_board_type_and_name() {
        let fx = Fixture::new();
        let svc = service(&fx);
        let (alice, _) = listing_fixture(&fx, &svc);

        let squares = WorldFilter {
            board_type: Some(BoardType::Square),
            ..WorldFilter::default()
        };
        assert_eq!(slugs(svc.list_worlds(&squares)), ["meadow"]);
        let owned_squares = WorldFilter {
            viewer: Some(alice),
            ..squares
        };
        assert_eq!(slugs(svc.list_worlds(&owned_squares)), ["meadow", "vault"]);

        let search = |text: &str| WorldFilter {
            search: Some(text.to_owned()),
            ..WorldFilter::default()
        };
        assert_eq!(slugs(svc.list_worlds(&search(" MEADOW "))), ["meadow"]);
        assert_eq!(slugs(svc.list_worlds(&search("   "))), ["hive", "meadow"]);
        assert!(svc.list_worlds(&search("secret")).is_empty());
    }

    #[tokio::test]
    async fn listing_can_hide_full_worlds() {
        let fx = Fixture::new();
        let svc = service(&fx);
        let (_, meadow) = listing_fixture(&fx, &svc);
        let hide_full = WorldFilter {
            hide_full: true,
            ..WorldFilter::default()
        };

        let a = fx.user("a");
        let team = fx.team(&meadow, TeamColor::Red, a);
        assert_eq!(slugs(svc.list_worlds(&hide_full)), ["hive", "meadow"]);

        fx.join(team, fx.user("b"));
        assert_eq!(slugs(svc.list_worlds(&hide_full)), ["hive"]);
        assert_eq!(
            slugs(svc.list_worlds(&WorldFilter::default())),
            ["hive", "meadow"]
        );
    }
}
