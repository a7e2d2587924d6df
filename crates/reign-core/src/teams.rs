//! Team membership: create, join, leave, and user cleanup.
//!
//! Membership is what lets a player act in a world, and every change to it
//! is broadcast to the world's observers after commit. A user holds at most
//! one membership per world; the store enforces this too.
//!
//! Every membership insert or delete rewrites the team row at the version
//! it was read at. Two units of work that change the same roster therefore
//! conflict, and the loser is re-evaluated on fresh state: a join that
//! raced another join sees the team full, and a leave that raced a join no
//! longer disbands the team.

use std::collections::BTreeSet;
use std::sync::Arc;

use reign_db::{Change, UnitOfWork, WorldStore};
use reign_types::{MessageType, Team, TeamColor, TeamId, TeamMember, TeamView, UserId, World};
use tracing::info;

use crate::authz::can_act;
use crate::broadcast::BroadcastCoordinator;
use crate::cycle::Clock;
use crate::error::GameError;
use crate::retry::with_retry;

/// Team operations for players.
#[derive(Debug, Clone)]
pub struct TeamService {
    store: Arc<dyn WorldStore>,
    broadcasts: BroadcastCoordinator,
    clock: Arc<dyn Clock>,
}

impl TeamService {
    /// Create the service.
    pub const fn new(
        store: Arc<dyn WorldStore>,
        broadcasts: BroadcastCoordinator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            broadcasts,
            clock,
        }
    }

    /// Found a new team with `user` as its creator and first member.
    ///
    /// The colour is matched case-insensitively against
    /// [`TeamColor::ALL`].
    ///
    /// # Errors
    ///
    /// - [`GameError::NotFound`] if the world or user does not exist.
    /// - [`GameError::InvalidArgument`] for a blank name or unknown colour.
    /// - [`GameError::StateViolation`] if the world is private, forbids
    ///   player teams, is at its team limit, the user is already on a team
    ///   here, or the name or colour is taken.
    pub fn create_team(
        &self,
        world_slug: &str,
        name: &str,
        color: &str,
        user: UserId,
    ) -> Result<TeamView, GameError> {
        let world = self.world(world_slug)?;
        if !world.is_public {
            return Err(GameError::violation("cannot join a private world"));
        }
        if !world.allow_player_team_creation {
            return Err(GameError::violation(
                "player team creation is not allowed in this world",
            ));
        }
        self.require_user(user)?;
        if can_act(self.store.as_ref(), user, world.id) {
            return Err(GameError::violation(
                "user is already in a team in this world",
            ));
        }

        let teams = self.store.teams_in_world(world.id);
        if u32::try_from(teams.len()).unwrap_or(u32::MAX) >= world.max_teams {
            return Err(GameError::violation(
                "maximum number of teams reached for this world",
            ));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(GameError::invalid("team name must not be blank"));
        }
        if teams.iter().any(|t| t.name == name) {
            return Err(GameError::violation(
                "team name already exists in this world",
            ));
        }
        let color = TeamColor::parse(color).ok_or_else(|| {
            GameError::invalid(
                "invalid team color, must be one of: red, blue, green, yellow, purple, teal",
            )
        })?;
        if teams.iter().any(|t| t.color == color) {
            return Err(GameError::violation("color is already taken by another team"));
        }

        let now = self.clock.now();
        let team = Team {
            id: TeamId::new(),
            world_id: world.id,
            name: name.to_owned(),
            color,
            creator_id: user,
            created_at: now,
            version: 0,
        };
        let mut uow = UnitOfWork::new();
        uow.put_team(team.clone())
            .put_member(TeamMember::new(team.id, user, now));
        self.broadcasts
            .defer_until_commit(&mut uow, &world.slug, MessageType::TeamCreated, Some(user));
        uow.commit(self.store.as_ref())?;

        info!(world = %world.slug, team = %team.name, color = %color, "Team created");
        self.team_view(&world, team.id)
    }

    /// Add `user` to an existing team.
    ///
    /// # Errors
    ///
    /// - [`GameError::NotFound`] if the world, user or team does not exist.
    /// - [`GameError::InvalidArgument`] if the team plays in another world.
    /// - [`GameError::StateViolation`] if the world is private, the user is
    ///   already on a team here, or the team is full.
    /// - [`GameError::Store`] if the roster keeps changing concurrently.
    pub fn join_team(
        &self,
        world_slug: &str,
        team_id: TeamId,
        user: UserId,
    ) -> Result<TeamView, GameError> {
        with_retry(|| self.try_join_team(world_slug, team_id, user))
    }

    fn try_join_team(
        &self,
        world_slug: &str,
        team_id: TeamId,
        user: UserId,
    ) -> Result<TeamView, GameError> {
        let world = self.world(world_slug)?;
        if !world.is_public {
            return Err(GameError::violation("cannot join a private world"));
        }
        self.require_user(user)?;
        if can_act(self.store.as_ref(), user, world.id) {
            return Err(GameError::violation(
                "user is already in a team in this world",
            ));
        }
        let team = self
            .store
            .team(team_id)
            .ok_or_else(|| GameError::not_found(format!("team {team_id}")))?;
        if team.world_id != world.id {
            return Err(GameError::invalid("team does not belong to this world"));
        }
        let members = u32::try_from(self.store.member_count(team.id)).unwrap_or(u32::MAX);
        if members >= world.max_team_size {
            return Err(GameError::violation("team is full"));
        }

        let mut uow = UnitOfWork::new();
        uow.put_team(team.clone())
            .put_member(TeamMember::new(team.id, user, self.clock.now()));
        self.broadcasts
            .defer_until_commit(&mut uow, &world.slug, MessageType::TeamJoined, Some(user));
        uow.commit(self.store.as_ref())?;

        info!(world = %world.slug, team = %team.name, user = %user, "Player joined team");
        self.team_view(&world, team.id)
    }

    /// Remove `user` from their team in the world.
    ///
    /// Their squares in this world are released, and the team is deleted if
    /// they were its last member.
    ///
    /// # Errors
    ///
    /// - [`GameError::NotFound`] if the world does not exist.
    /// - [`GameError::StateViolation`] if the user is on no team here.
    /// - [`GameError::Store`] if the roster keeps changing concurrently.
    pub fn leave_team(&self, world_slug: &str, user: UserId) -> Result<(), GameError> {
        with_retry(|| self.try_leave_team(world_slug, user))
    }

    fn try_leave_team(&self, world_slug: &str, user: UserId) -> Result<(), GameError> {
        let world = self.world(world_slug)?;
        if !can_act(self.store.as_ref(), user, world.id) {
            return Err(GameError::violation("user is not in a team in this world"));
        }
        let (team, member) = self
            .store
            .membership(user, world.id)
            .ok_or_else(|| GameError::violation("user is not in a team in this world"))?;

        let mut uow = UnitOfWork::new();
        uow.stage(Change::ReleaseSquares {
            user_id: user,
            world_id: Some(world.id),
        })
        .stage(Change::DeleteMember(member.id));
        let disbanded = self.store.member_count(team.id) <= 1;
        if disbanded {
            uow.delete_team(&team);
        } else {
            uow.put_team(team.clone());
        }
        self.broadcasts
            .defer_until_commit(&mut uow, &world.slug, MessageType::PlayerLeft, Some(user));
        uow.commit(self.store.as_ref())?;

        info!(world = %world.slug, team = %team.name, user = %user, disbanded, "Player left team");
        Ok(())
    }

    /// Release every square and membership a user holds, in every world.
    ///
    /// Emptied teams are deleted. Each affected world gets one
    /// `USER_DELETED` broadcast. Returns the number of affected worlds.
    ///
    /// # Errors
    ///
    /// - [`GameError::NotFound`] if the user does not exist.
    /// - [`GameError::Store`] if a roster keeps changing concurrently.
    pub fn cleanup_user_data(&self, user: UserId) -> Result<usize, GameError> {
        with_retry(|| self.try_cleanup_user_data(user))
    }

    fn try_cleanup_user_data(&self, user: UserId) -> Result<usize, GameError> {
        self.require_user(user)?;
        let memberships = self.store.memberships_of_user(user);

        let mut uow = UnitOfWork::new();
        uow.stage(Change::ReleaseSquares {
            user_id: user,
            world_id: None,
        });
        let mut affected = BTreeSet::new();
        for (team, member) in &memberships {
            uow.stage(Change::DeleteMember(member.id));
            if self.store.member_count(team.id) <= 1 {
                uow.delete_team(team);
            } else {
                uow.put_team(team.clone());
            }
            if let Some(world) = self.store.world(team.world_id) {
                affected.insert(world.slug);
            }
        }
        for slug in &affected {
            self.broadcasts
                .defer_until_commit(&mut uow, slug, MessageType::UserDeleted, Some(user));
        }
        uow.commit(self.store.as_ref())?;

        info!(user = %user, worlds = affected.len(), "User data cleaned up");
        Ok(affected.len())
    }

    /// Teams of the world that still have room.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::NotFound`] if the world does not exist.
    pub fn available_teams(&self, world_slug: &str) -> Result<Vec<TeamView>, GameError> {
        let world = self.world(world_slug)?;
        let max = usize::try_from(world.max_team_size).unwrap_or(usize::MAX);
        Ok(self
            .views(&world)
            .into_iter()
            .filter(|t| t.members.len() < max)
            .collect())
    }

    /// Every team of the world, with members.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::NotFound`] if the world does not exist.
    pub fn teams_in_world(&self, world_slug: &str) -> Result<Vec<TeamView>, GameError> {
        let world = self.world(world_slug)?;
        Ok(self.views(&world))
    }

    /// The team `user` plays for in the world, if any.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::NotFound`] if the world does not exist.
    pub fn user_team(&self, world_slug: &str, user: UserId) -> Result<Option<TeamView>, GameError> {
        let world = self.world(world_slug)?;
        let Some((team, _)) = self.store.membership(user, world.id) else {
            return Ok(None);
        };
        Ok(self.views(&world).into_iter().find(|t| t.id == team.id))
    }

    /// Whether `user` plays for any team in the world.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::NotFound`] if the world does not exist.
    pub fn is_user_in_team(&self, world_slug: &str, user: UserId) -> Result<bool, GameError> {
        let world = self.world(world_slug)?;
        Ok(can_act(self.store.as_ref(), user, world.id))
    }

    fn world(&self, world_slug: &str) -> Result<World, GameError> {
        self.store
            .world_by_slug(world_slug)
            .ok_or_else(|| GameError::not_found(format!("world {world_slug}")))
    }

    fn require_user(&self, user: UserId) -> Result<(), GameError> {
        self.store
            .user(user)
            .map(|_| ())
            .ok_or_else(|| GameError::not_found(format!("user {user}")))
    }

    fn views(&self, world: &World) -> Vec<TeamView> {
        self.store
            .snapshot(world.id)
            .map(|s| s.teams)
            .unwrap_or_default()
    }

    fn team_view(&self, world: &World, team_id: TeamId) -> Result<TeamView, GameError> {
        self.views(world)
            .into_iter()
            .find(|t| t.id == team_id)
            .ok_or_else(|| GameError::not_found(format!("team {team_id}")))
    }
}
