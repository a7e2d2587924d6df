//! The store primitive consumed by the game core.
//!
//! Every read returns an owned copy of committed state; nothing handed out
//! by a [`WorldStore`] aliases rows inside it. Writes only happen through
//! [`WorldStore::apply`], normally via
//! [`UnitOfWork::commit`](crate::unit_of_work::UnitOfWork::commit).

use reign_types::{
    Square, Team, TeamId, TeamMember, User, UserId, World, WorldId, WorldSnapshot,
};

use crate::error::DbError;
use crate::unit_of_work::ChangeSet;

/// Durable storage of worlds, squares, teams, memberships and users.
pub trait WorldStore: Send + Sync {
    /// Look up a world by identifier.
    fn world(&self, id: WorldId) -> Option<World>;

    /// Look up a world by its slug.
    fn world_by_slug(&self, slug: &str) -> Option<World>;

    /// Every stored world.
    fn worlds(&self) -> Vec<World>;

    /// The square at `(x, y)` in a world.
    fn square_at(&self, world_id: WorldId, x: i32, y: i32) -> Option<Square>;

    /// Every square of a world, ordered by `(x, y)`.
    fn board(&self, world_id: WorldId) -> Vec<Square>;

    /// Look up a team by identifier.
    fn team(&self, id: TeamId) -> Option<Team>;

    /// Every team of a world.
    fn teams_in_world(&self, world_id: WorldId) -> Vec<Team>;

    /// Every membership of a team.
    fn members_of_team(&self, team_id: TeamId) -> Vec<TeamMember>;

    /// The team and membership a user holds in a world, if any.
    fn membership(&self, user_id: UserId, world_id: WorldId) -> Option<(Team, TeamMember)>;

    /// Every team and membership a user holds, across all worlds.
    fn memberships_of_user(&self, user_id: UserId) -> Vec<(Team, TeamMember)>;

    /// Look up a user by identifier.
    fn user(&self, id: UserId) -> Option<User>;

    /// Board plus teams with members, read in one consistent pass.
    ///
    /// Returns `None` if the world does not exist.
    fn snapshot(&self, world_id: WorldId) -> Option<WorldSnapshot>;

    /// Apply a change set atomically.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Conflict`] if any versioned row changed since it
    /// was read, or an I/O error if the durable write failed. On error no
    /// change is visible.
    fn apply(&self, changes: ChangeSet) -> Result<(), DbError>;

    /// Number of members in a team.
    fn member_count(&self, team_id: TeamId) -> usize {
        self.members_of_team(team_id).len()
    }
}

impl core::fmt::Debug for dyn WorldStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("dyn WorldStore")
    }
}
