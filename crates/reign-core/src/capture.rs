//! Territory capture and defense.
//!
//! A square is either unowned, owned without a defense bonus, or owned
//! with a bonus of `k > 0`. A capture against a defended square burns one
//! point of bonus instead of changing hands, so a square defended to `k`
//! takes `k + 1` captures to take.
//!
//! Teams grow outward: once a team owns any square, every further capture
//! must touch one of its squares (see [`Topology`]). A team with no squares
//! may claim any unowned square to bootstrap.
//!
//! Both operations read fresh state, stage the square in a unit of work
//! with a deferred broadcast, and commit. When the store reports a write
//! conflict the whole evaluation is repeated on fresh state, up to
//! [`MAX_ATTEMPTS`] times.
//!
//! [`MAX_ATTEMPTS`]: crate::retry::MAX_ATTEMPTS

use std::collections::HashSet;
use std::sync::Arc;

use reign_db::{UnitOfWork, WorldStore};
use reign_types::{MessageType, Square, UserId, World};
use tracing::debug;

use crate::authz::can_act;
use crate::broadcast::BroadcastCoordinator;
use crate::error::GameError;
use crate::retry::with_retry;
use crate::topology::{Topology, in_bounds};

/// What a successful capture did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// An unowned square was claimed.
    Claimed(Square),
    /// A defended square lost one point of bonus and kept its owner.
    Weakened(Square),
    /// An undefended enemy square changed hands.
    Conquered {
        /// The square as written.
        square: Square,
        /// Who held it before.
        previous_owner: UserId,
    },
}

impl CaptureOutcome {
    /// The square as written.
    pub const fn square(&self) -> &Square {
        match self {
            Self::Claimed(square) | Self::Weakened(square) | Self::Conquered { square, .. } => {
                square
            }
        }
    }
}

/// Capture and defend operations.
#[derive(Debug, Clone)]
pub struct CaptureEngine {
    store: Arc<dyn WorldStore>,
    broadcasts: BroadcastCoordinator,
}

impl CaptureEngine {
    /// Create an engine over `store`.
    pub const fn new(store: Arc<dyn WorldStore>, broadcasts: BroadcastCoordinator) -> Self {
        Self { store, broadcasts }
    }

    /// Attempt to capture the square at `(x, y)` for `actor`.
    ///
    /// # Errors
    ///
    /// - [`GameError::NotFound`] if the world or square does not exist.
    /// - [`GameError::InvalidArgument`] if the coordinates are off the board
    ///   or the actor already owns the square.
    /// - [`GameError::StateViolation`] if the actor is on no team in this
    ///   world, the square is not adjacent to the team's territory, or the
    ///   team has no territory to attack from.
    /// - [`GameError::Store`] if the write keeps conflicting.
    pub fn capture(
        &self,
        world_slug: &str,
        x: i32,
        y: i32,
        actor: UserId,
    ) -> Result<CaptureOutcome, GameError> {
        with_retry(|| self.try_capture(world_slug, x, y, actor))
    }

    /// Defend a square the actor owns, setting its bonus to exactly 1.
    ///
    /// # Errors
    ///
    /// - [`GameError::NotFound`] if the world or square does not exist.
    /// - [`GameError::InvalidArgument`] if the coordinates are off the board
    ///   or the actor does not own the square.
    /// - [`GameError::StateViolation`] if the actor is on no team here.
    /// - [`GameError::Store`] if the write keeps conflicting.
    pub fn defend(
        &self,
        world_slug: &str,
        x: i32,
        y: i32,
        actor: UserId,
    ) -> Result<Square, GameError> {
        with_retry(|| self.try_defend(world_slug, x, y, actor))
    }

    fn try_capture(
        &self,
        world_slug: &str,
        x: i32,
        y: i32,
        actor: UserId,
    ) -> Result<CaptureOutcome, GameError> {
        let store = self.store.as_ref();
        let world = self.acting_world(world_slug, actor)?;
        let square = target_square(store, &world, x, y)?;

        let teammates = team_of(store, &world, actor)?;
        let board = store.board(world.id);
        let team_square_count = board
            .iter()
            .filter(|s| s.owner_id.is_some_and(|owner| teammates.contains(&owner)))
            .count();

        let topology = Topology::from(world.board_type);
        let has_adjacent_teammate_square = topology
            .neighbors_on_board(x, y, world.board_size)
            .into_iter()
            .filter_map(|(nx, ny)| board.iter().find(|s| s.x == nx && s.y == ny))
            .any(|n| n.owner_id.is_some_and(|owner| teammates.contains(&owner)));

        if team_square_count > 0 && !has_adjacent_teammate_square {
            return Err(GameError::violation(
                "team must own a neighboring square to capture this square",
            ));
        }

        let previous_owner = match square.owner_id {
            None => None,
            Some(owner) if owner == actor => {
                return Err(GameError::invalid("square is already owned by the player"));
            }
            Some(_) if team_square_count == 0 => {
                return Err(GameError::violation(
                    "team must own at least one square to capture an enemy square",
                ));
            }
            Some(owner) => Some(owner),
        };

        let mut written = square;
        let weakened = previous_owner.is_some() && written.defense_bonus > 0;
        if weakened {
            written.defense_bonus = written.defense_bonus.saturating_sub(1);
        } else {
            written.owner_id = Some(actor);
        }

        let square = self.commit_square(&world, written, MessageType::SquareCaptured, actor)?;
        Ok(match previous_owner {
            None => CaptureOutcome::Claimed(square),
            Some(_) if weakened => CaptureOutcome::Weakened(square),
            Some(previous_owner) => CaptureOutcome::Conquered {
                square,
                previous_owner,
            },
        })
    }

    fn try_defend(
        &self,
        world_slug: &str,
        x: i32,
        y: i32,
        actor: UserId,
    ) -> Result<Square, GameError> {
        let world = self.acting_world(world_slug, actor)?;
        let mut square = target_square(self.store.as_ref(), &world, x, y)?;
        if !square.is_owned_by(actor) {
            return Err(GameError::invalid("square is not owned by the player"));
        }
        square.defense_bonus = 1;
        self.commit_square(&world, square, MessageType::SquareDefended, actor)
    }

    /// Resolve the world and check that `actor` may act in it.
    fn acting_world(&self, world_slug: &str, actor: UserId) -> Result<World, GameError> {
        let world = self
            .store
            .world_by_slug(world_slug)
            .ok_or_else(|| GameError::not_found(format!("world {world_slug}")))?;
        if !can_act(self.store.as_ref(), actor, world.id) {
            return Err(GameError::violation(
                "player must be in a team to perform actions",
            ));
        }
        Ok(world)
    }

    fn commit_square(
        &self,
        world: &World,
        square: Square,
        message_type: MessageType,
        actor: UserId,
    ) -> Result<Square, GameError> {
        let mut uow = UnitOfWork::new();
        uow.put_square(square.clone());
        self.broadcasts
            .defer_until_commit(&mut uow, &world.slug, message_type, Some(actor));
        uow.commit(self.store.as_ref())?;
        debug!(
            world = %world.slug,
            x = square.x,
            y = square.y,
            actor = %actor,
            %message_type,
            "Square written"
        );
        Ok(Square {
            version: square.version.saturating_add(1),
            ..square
        })
    }
}

fn target_square(store: &dyn WorldStore, world: &World, x: i32, y: i32) -> Result<Square, GameError> {
    if !in_bounds(x, y, world.board_size) {
        return Err(GameError::invalid(format!(
            "({x}, {y}) is outside the {0}x{0} board",
            world.board_size
        )));
    }
    store
        .square_at(world.id, x, y)
        .ok_or_else(|| GameError::not_found(format!("square ({x}, {y})")))
}

/// User ids of every member of the actor's team in `world`.
fn team_of(store: &dyn WorldStore, world: &World, actor: UserId) -> Result<HashSet<UserId>, GameError> {
    let (team, _) = store
        .membership(actor, world.id)
        .ok_or_else(|| GameError::violation("player must be in a team to perform actions"))?;
    Ok(store
        .members_of_team(team.id)
        .into_iter()
        .map(|m| m.user_id)
        .collect())
}
