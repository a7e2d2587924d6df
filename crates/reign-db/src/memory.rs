//! In-process implementation of [`WorldStore`].
//!
//! All tables live behind one [`RwLock`]. Reads take the read lock and
//! clone what they return. A commit takes the write lock, validates every
//! staged change against the committed rows, and only then applies the
//! whole change set, so readers never observe half of a unit of work.
//!
//! On its own the store is volatile and serves tests and single-process
//! runs. [`PgStore`](crate::pg_store::PgStore) keeps one as its read model
//! and uses [`MemoryStore::check`] to reject stale writes before they reach
//! the database.

use std::collections::{BTreeMap, HashSet};

use parking_lot::RwLock;
use reign_types::{
    MemberView, Square, Team, TeamId, TeamMember, TeamMemberId, TeamView, User, UserId, World,
    WorldId, WorldSnapshot,
};
use tracing::debug;

use crate::error::DbError;
use crate::store::WorldStore;
use crate::unit_of_work::{Change, ChangeSet};

/// Committed rows of every table, as loaded from a durable backend.
#[derive(Debug, Clone, Default)]
pub struct TableRows {
    /// User accounts.
    pub users: Vec<User>,
    /// Worlds, including their cycle anchors.
    pub worlds: Vec<World>,
    /// Squares of every world.
    pub squares: Vec<Square>,
    /// Teams of every world.
    pub teams: Vec<Team>,
    /// Memberships of every team.
    pub members: Vec<TeamMember>,
}

/// Squares are keyed by `(world, x, y)`, which also orders a board.
type BoardKey = (WorldId, i32, i32);

/// Committed rows.
#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    worlds: BTreeMap<WorldId, World>,
    squares: BTreeMap<BoardKey, Square>,
    teams: BTreeMap<TeamId, Team>,
    members: BTreeMap<TeamMemberId, TeamMember>,
}

const fn board_range(world_id: WorldId) -> core::ops::RangeInclusive<BoardKey> {
    (world_id, i32::MIN, i32::MIN)..=(world_id, i32::MAX, i32::MAX)
}

pub(crate) fn conflict(entity: &'static str, id: impl ToString, reason: &str) -> DbError {
    DbError::Conflict {
        entity,
        id: id.to_string(),
        reason: reason.to_owned(),
    }
}

/// Check a versioned write against the committed row.
///
/// `stored` is the committed version, if the row exists.
fn check_version(
    entity: &'static str,
    id: impl ToString,
    staged: u64,
    stored: Option<u64>,
) -> Result<(), DbError> {
    match (staged, stored) {
        (0, None) => Ok(()),
        (0, Some(_)) => Err(conflict(entity, id, "row already exists")),
        (_, None) => Err(conflict(entity, id, "row no longer exists")),
        (read, Some(current)) if read == current => Ok(()),
        (_, Some(_)) => Err(conflict(entity, id, "row was modified concurrently")),
    }
}

fn release(square: &mut Square) {
    square.owner_id = None;
    square.defense_bonus = 0;
    square.version = square.version.saturating_add(1);
}

impl Tables {
    fn from_rows(rows: TableRows) -> Self {
        let mut tables = Self::default();
        for user in rows.users {
            tables.users.insert(user.id, user);
        }
        for world in rows.worlds {
            tables.worlds.insert(world.id, world);
        }
        for square in rows.squares {
            tables
                .squares
                .insert((square.world_id, square.x, square.y), square);
        }
        for team in rows.teams {
            tables.teams.insert(team.id, team);
        }
        for member in rows.members {
            tables.members.insert(member.id, member);
        }
        tables
    }

    /// World a team plays in, looking at staged team inserts as well.
    fn team_world(&self, team_id: TeamId, changes: &[Change]) -> Option<WorldId> {
        self.teams.get(&team_id).map(|t| t.world_id).or_else(|| {
            changes.iter().find_map(|change| match change {
                Change::PutTeam(team) if team.id == team_id => Some(team.world_id),
                _ => None,
            })
        })
    }

    fn validate(&self, changes: &[Change]) -> Result<(), DbError> {
        for change in changes {
            match change {
                Change::PutWorld(world) => {
                    check_version(
                        "world",
                        world.id,
                        world.version,
                        self.worlds.get(&world.id).map(|w| w.version),
                    )?;
                    let slug_taken = self
                        .worlds
                        .values()
                        .any(|w| w.slug == world.slug && w.id != world.id);
                    if slug_taken {
                        return Err(conflict("world", &world.slug, "slug already in use"));
                    }
                }
                Change::PutSquare(square) => {
                    let stored = self.squares.get(&(square.world_id, square.x, square.y));
                    if stored.is_some_and(|e| square.version != 0 && e.id != square.id) {
                        return Err(conflict("square", square.id, "board was regenerated"));
                    }
                    check_version(
                        "square",
                        square.id,
                        square.version,
                        stored.map(|s| s.version),
                    )?;
                }
                Change::PutMember(member) => {
                    check_version(
                        "member",
                        member.id,
                        member.version,
                        self.members.get(&member.id).map(|m| m.version),
                    )?;
                    if member.version == 0 {
                        self.check_single_membership(member, changes)?;
                    }
                }
                Change::DeleteMember(id) => {
                    if !self.members.contains_key(id) {
                        return Err(conflict("member", id, "row no longer exists"));
                    }
                }
                Change::PutTeam(team) => {
                    check_version(
                        "team",
                        team.id,
                        team.version,
                        self.teams.get(&team.id).map(|t| t.version),
                    )?;
                    self.check_team_identity(team)?;
                }
                Change::DeleteTeam { id, version } => match self.teams.get(id) {
                    None => return Err(conflict("team", id, "row no longer exists")),
                    Some(stored) if stored.version != *version => {
                        return Err(conflict("team", id, "row was modified concurrently"));
                    }
                    Some(_) => {}
                },
                Change::PutUser(_)
                | Change::DeleteUser(_)
                | Change::DeleteWorld(_)
                | Change::ReplaceBoard { .. }
                | Change::ResetBoard(_)
                | Change::ReleaseSquares { .. } => {}
            }
        }
        Ok(())
    }

    /// Team names and colours are unique per world.
    fn check_team_identity(&self, team: &Team) -> Result<(), DbError> {
        let rivals = self
            .teams
            .values()
            .filter(|t| t.world_id == team.world_id && t.id != team.id);
        for rival in rivals {
            if rival.name == team.name {
                return Err(conflict("team", team.id, "name already in use in this world"));
            }
            if rival.color == team.color {
                return Err(conflict("team", team.id, "colour already in use in this world"));
            }
        }
        Ok(())
    }

    /// A user may hold at most one membership per world.
    fn check_single_membership(
        &self,
        member: &TeamMember,
        changes: &[Change],
    ) -> Result<(), DbError> {
        let Some(world_id) = self.team_world(member.team_id, changes) else {
            return Err(conflict("member", member.id, "team does not exist"));
        };
        let leaving: HashSet<TeamMemberId> = changes
            .iter()
            .filter_map(|change| match change {
                Change::DeleteMember(id) => Some(*id),
                _ => None,
            })
            .collect();
        let already_member = self.members.values().any(|existing| {
            existing.user_id == member.user_id
                && !leaving.contains(&existing.id)
                && self
                    .teams
                    .get(&existing.team_id)
                    .is_some_and(|t| t.world_id == world_id)
        });
        if already_member {
            return Err(conflict(
                "member",
                member.user_id,
                "user already belongs to a team in this world",
            ));
        }
        Ok(())
    }

    fn apply_all(&mut self, changes: ChangeSet) {
        for change in changes {
            self.apply_one(change);
        }
    }

    fn apply_one(&mut self, change: Change) {
        match change {
            Change::PutUser(user) => {
                self.users.insert(user.id, user);
            }
            Change::DeleteUser(id) => {
                self.users.remove(&id);
            }
            Change::PutWorld(mut world) => {
                world.version = world.version.saturating_add(1);
                self.worlds.insert(world.id, world);
            }
            Change::DeleteWorld(id) => {
                self.worlds.remove(&id);
                self.squares.retain(|(world_id, _, _), _| *world_id != id);
                let doomed: HashSet<TeamId> = self
                    .teams
                    .values()
                    .filter(|t| t.world_id == id)
                    .map(|t| t.id)
                    .collect();
                self.members.retain(|_, m| !doomed.contains(&m.team_id));
                self.teams.retain(|team_id, _| !doomed.contains(team_id));
            }
            Change::PutSquare(mut square) => {
                square.version = square.version.saturating_add(1);
                self.squares
                    .insert((square.world_id, square.x, square.y), square);
            }
            Change::ReplaceBoard { world_id, squares } => {
                self.squares.retain(|(owner, _, _), _| *owner != world_id);
                for mut square in squares {
                    square.world_id = world_id;
                    square.version = 1;
                    self.squares.insert((world_id, square.x, square.y), square);
                }
            }
            Change::ResetBoard(world_id) => {
                for square in self.squares.range_mut(board_range(world_id)).map(|(_, s)| s) {
                    if square.owner_id.is_some() || square.defense_bonus > 0 {
                        release(square);
                    }
                }
            }
            Change::ReleaseSquares { user_id, world_id } => {
                let owned = self.squares.values_mut().filter(|s| {
                    s.owner_id == Some(user_id) && world_id.is_none_or(|w| s.world_id == w)
                });
                for square in owned {
                    release(square);
                }
            }
            Change::PutTeam(mut team) => {
                team.version = team.version.saturating_add(1);
                self.teams.insert(team.id, team);
            }
            Change::DeleteTeam { id, .. } => {
                self.teams.remove(&id);
                self.members.retain(|_, m| m.team_id != id);
            }
            Change::PutMember(mut member) => {
                member.version = member.version.saturating_add(1);
                self.members.insert(member.id, member);
            }
            Change::DeleteMember(id) => {
                self.members.remove(&id);
            }
        }
    }

    fn members_of(&self, team_id: TeamId) -> Vec<TeamMember> {
        let mut members: Vec<TeamMember> = self
            .members
            .values()
            .filter(|m| m.team_id == team_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.id.cmp(&b.id)));
        members
    }

    fn teams_of(&self, world_id: WorldId) -> Vec<Team> {
        self.teams
            .values()
            .filter(|t| t.world_id == world_id)
            .cloned()
            .collect()
    }

    fn team_view(&self, team: Team) -> TeamView {
        let members = self
            .members_of(team.id)
            .into_iter()
            .map(|member| MemberView {
                id: member.id,
                user_id: member.user_id,
                username: self
                    .users
                    .get(&member.user_id)
                    .map(|u| u.username.clone())
                    .unwrap_or_default(),
                current_action_points: member.current_action_points,
                joined_at: member.joined_at,
            })
            .collect();
        TeamView {
            id: team.id,
            name: team.name,
            color: team.color,
            creator_id: team.creator_id,
            created_at: team.created_at,
            members,
        }
    }
}

/// The in-process world store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding rows read from a durable backend.
    pub fn from_rows(rows: TableRows) -> Self {
        Self {
            tables: RwLock::new(Tables::from_rows(rows)),
        }
    }

    /// Validate a change set against the committed rows without applying it.
    ///
    /// # Errors
    ///
    /// Returns the [`DbError::Conflict`] that [`WorldStore::apply`] would
    /// return for the same change set.
    pub fn check(&self, changes: &[Change]) -> Result<(), DbError> {
        self.tables.read().validate(changes)
    }
}

impl WorldStore for MemoryStore {
    fn world(&self, id: WorldId) -> Option<World> {
        self.tables.read().worlds.get(&id).cloned()
    }

    fn world_by_slug(&self, slug: &str) -> Option<World> {
        self.tables
            .read()
            .worlds
            .values()
            .find(|w| w.slug == slug)
            .cloned()
    }

    fn worlds(&self) -> Vec<World> {
        self.tables.read().worlds.values().cloned().collect()
    }

    fn square_at(&self, world_id: WorldId, x: i32, y: i32) -> Option<Square> {
        self.tables.read().squares.get(&(world_id, x, y)).cloned()
    }

    fn board(&self, world_id: WorldId) -> Vec<Square> {
        self.tables
            .read()
            .squares
            .range(board_range(world_id))
            .map(|(_, s)| s.clone())
            .collect()
    }

    fn team(&self, id: TeamId) -> Option<Team> {
        self.tables.read().teams.get(&id).cloned()
    }

    fn teams_in_world(&self, world_id: WorldId) -> Vec<Team> {
        self.tables.read().teams_of(world_id)
    }

    fn members_of_team(&self, team_id: TeamId) -> Vec<TeamMember> {
        self.tables.read().members_of(team_id)
    }

    fn membership(&self, user_id: UserId, world_id: WorldId) -> Option<(Team, TeamMember)> {
        let tables = self.tables.read();
        tables
            .members
            .values()
            .filter(|m| m.user_id == user_id)
            .find_map(|m| {
                tables
                    .teams
                    .get(&m.team_id)
                    .filter(|t| t.world_id == world_id)
                    .map(|t| (t.clone(), m.clone()))
            })
    }

    fn memberships_of_user(&self, user_id: UserId) -> Vec<(Team, TeamMember)> {
        let tables = self.tables.read();
        tables
            .members
            .values()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| tables.teams.get(&m.team_id).map(|t| (t.clone(), m.clone())))
            .collect()
    }

    fn user(&self, id: UserId) -> Option<User> {
        self.tables.read().users.get(&id).cloned()
    }

    fn snapshot(&self, world_id: WorldId) -> Option<WorldSnapshot> {
        let tables = self.tables.read();
        if !tables.worlds.contains_key(&world_id) {
            return None;
        }
        let board = tables
            .squares
            .range(board_range(world_id))
            .map(|(_, s)| s.clone())
            .collect();
        let teams = tables
            .teams_of(world_id)
            .into_iter()
            .map(|team| tables.team_view(team))
            .collect();
        Some(WorldSnapshot { board, teams })
    }

    fn apply(&self, changes: ChangeSet) -> Result<(), DbError> {
        let count = changes.len();
        let mut tables = self.tables.write();
        tables.validate(&changes)?;
        tables.apply_all(changes);
        debug!(changes = count, "Unit of work committed");
        Ok(())
    }
}
