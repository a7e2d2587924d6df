//! [`WorldStore`] backed by `PostgreSQL`.
//!
//! Reads are served from an in-process [`MemoryStore`] that mirrors the
//! committed tables; it is loaded once by [`PgStore::open`]. Every change
//! set is written in one `PostgreSQL` transaction. Versioned rows are
//! updated with `... WHERE id = $1 AND version = $n` and the transaction is
//! rolled back unless exactly one row was affected, so a stale unit of work
//! is rejected by the database itself even if the mirror missed a write.
//! Only after the transaction commits is the mirror updated.
//!
//! Commits are serialised by one writer lock and block the calling thread
//! with [`tokio::task::block_in_place`], which requires the multi-threaded
//! runtime. One process owns a database at a time.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reign_types::{
    BoardType, Square, Team, TeamColor, TeamId, TeamMember, User, UserId, World, WorldId,
    WorldSnapshot,
};
use sqlx::error::ErrorKind;
use sqlx::postgres::{PgArguments, PgQueryResult};
use sqlx::query::Query;
use sqlx::{PgConnection, PgPool, Postgres};
use tokio::runtime::Handle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::DbError;
use crate::memory::{MemoryStore, TableRows, conflict};
use crate::postgres::PostgresPool;
use crate::store::WorldStore;
use crate::unit_of_work::{Change, ChangeSet};

// =========================================================================
// Rows
// =========================================================================

/// A row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
}

/// A row from the `worlds` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct WorldRow {
    id: Uuid,
    slug: String,
    name: String,
    owner_id: Option<Uuid>,
    board_type: String,
    board_size: i64,
    is_public: bool,
    max_players: i64,
    max_teams: i64,
    min_teams: i64,
    max_team_size: i64,
    min_team_size: i64,
    allow_player_team_creation: bool,
    cycle_duration_in_seconds: i64,
    action_points_per_cycle: i64,
    max_action_points: i64,
    cycle_started_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    version: i64,
}

/// A row from the `squares` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct SquareRow {
    id: Uuid,
    world_id: Uuid,
    x: i32,
    y: i32,
    owner_id: Option<Uuid>,
    defense_bonus: i64,
    version: i64,
}

/// A row from the `teams` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct TeamRow {
    id: Uuid,
    world_id: Uuid,
    name: String,
    color: String,
    creator_id: Uuid,
    created_at: DateTime<Utc>,
    version: i64,
}

/// A row from the `team_members` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct MemberRow {
    id: Uuid,
    team_id: Uuid,
    user_id: Uuid,
    current_action_points: i64,
    joined_at: DateTime<Utc>,
    version: i64,
}

fn to_u32(column: &str, value: i64) -> Result<u32, DbError> {
    u32::try_from(value).map_err(|err| DbError::Decode(format!("{column} = {value}: {err}")))
}

fn to_u64(column: &str, value: i64) -> Result<u64, DbError> {
    u64::try_from(value).map_err(|err| DbError::Decode(format!("{column} = {value}: {err}")))
}

fn db_version(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id.into(),
            username: row.username,
        }
    }
}

impl TryFrom<WorldRow> for World {
    type Error = DbError;

    fn try_from(row: WorldRow) -> Result<Self, Self::Error> {
        let board_type = BoardType::parse(&row.board_type)
            .ok_or_else(|| DbError::Decode(format!("board_type = {}", row.board_type)))?;
        Ok(Self {
            id: row.id.into(),
            slug: row.slug,
            name: row.name,
            owner_id: row.owner_id.map(UserId::from),
            board_type,
            board_size: to_u32("board_size", row.board_size)?,
            is_public: row.is_public,
            max_players: to_u32("max_players", row.max_players)?,
            max_teams: to_u32("max_teams", row.max_teams)?,
            min_teams: to_u32("min_teams", row.min_teams)?,
            max_team_size: to_u32("max_team_size", row.max_team_size)?,
            min_team_size: to_u32("min_team_size", row.min_team_size)?,
            allow_player_team_creation: row.allow_player_team_creation,
            cycle_duration_in_seconds: to_u32(
                "cycle_duration_in_seconds",
                row.cycle_duration_in_seconds,
            )?,
            action_points_per_cycle: to_u32("action_points_per_cycle", row.action_points_per_cycle)?,
            max_action_points: to_u32("max_action_points", row.max_action_points)?,
            cycle_started_at: row.cycle_started_at,
            created_at: row.created_at,
            version: to_u64("version", row.version)?,
        })
    }
}

impl TryFrom<SquareRow> for Square {
    type Error = DbError;

    fn try_from(row: SquareRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            world_id: row.world_id.into(),
            x: row.x,
            y: row.y,
            owner_id: row.owner_id.map(UserId::from),
            defense_bonus: to_u32("defense_bonus", row.defense_bonus)?,
            version: to_u64("version", row.version)?,
        })
    }
}

impl TryFrom<TeamRow> for Team {
    type Error = DbError;

    fn try_from(row: TeamRow) -> Result<Self, Self::Error> {
        let color = TeamColor::parse(&row.color)
            .ok_or_else(|| DbError::Decode(format!("color = {}", row.color)))?;
        Ok(Self {
            id: row.id.into(),
            world_id: row.world_id.into(),
            name: row.name,
            color,
            creator_id: row.creator_id.into(),
            created_at: row.created_at,
            version: to_u64("version", row.version)?,
        })
    }
}

impl TryFrom<MemberRow> for TeamMember {
    type Error = DbError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            team_id: row.team_id.into(),
            user_id: row.user_id.into(),
            current_action_points: to_u32("current_action_points", row.current_action_points)?,
            joined_at: row.joined_at,
            version: to_u64("version", row.version)?,
        })
    }
}

fn decode_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, DbError>
where
    T: TryFrom<R, Error = DbError>,
{
    rows.into_iter().map(T::try_from).collect()
}

async fn load_tables(pool: &PgPool) -> Result<TableRows, DbError> {
    let users = sqlx::query_as::<_, UserRow>("SELECT id, username FROM users")
        .fetch_all(pool)
        .await?;

    let worlds = sqlx::query_as::<_, WorldRow>(
        r"SELECT id, slug, name, owner_id, board_type, board_size, is_public, max_players,
                 max_teams, min_teams, max_team_size, min_team_size,
                 allow_player_team_creation, cycle_duration_in_seconds,
                 action_points_per_cycle, max_action_points, cycle_started_at,
                 created_at, version
          FROM worlds",
    )
    .fetch_all(pool)
    .await?;

    let squares = sqlx::query_as::<_, SquareRow>(
        "SELECT id, world_id, x, y, owner_id, defense_bonus, version FROM squares",
    )
    .fetch_all(pool)
    .await?;

    let teams = sqlx::query_as::<_, TeamRow>(
        "SELECT id, world_id, name, color, creator_id, created_at, version FROM teams",
    )
    .fetch_all(pool)
    .await?;

    let members = sqlx::query_as::<_, MemberRow>(
        r"SELECT id, team_id, user_id, current_action_points, joined_at, version
          FROM team_members",
    )
    .fetch_all(pool)
    .await?;

    Ok(TableRows {
        users: users.into_iter().map(User::from).collect(),
        worlds: decode_all(worlds)?,
        squares: decode_all(squares)?,
        teams: decode_all(teams)?,
        members: decode_all(members)?,
    })
}

// =========================================================================
// Writes
// =========================================================================

/// Map constraint violations to conflicts; anything else is a database
/// failure.
fn classify(entity: &'static str, id: impl ToString, err: sqlx::Error) -> DbError {
    let kind = err.as_database_error().map(|db| db.kind());
    match kind {
        Some(ErrorKind::UniqueViolation) => conflict(entity, id, "row already exists"),
        Some(ErrorKind::ForeignKeyViolation) => {
            conflict(entity, id, "referenced row no longer exists")
        }
        _ => DbError::Postgres(err),
    }
}

/// Require that a guarded statement touched exactly one row.
fn expect_one(
    result: &PgQueryResult,
    entity: &'static str,
    id: impl ToString,
    reason: &str,
) -> Result<(), DbError> {
    if result.rows_affected() == 1 {
        Ok(())
    } else {
        Err(conflict(entity, id, reason))
    }
}

/// Why a guarded update or delete matched no row.
const STALE: &str = "row was modified concurrently";

/// Bind the world columns as `$1..$18`.
fn bind_world<'q>(
    query: Query<'q, Postgres, PgArguments>,
    world: &'q World,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(world.id.into_inner())
        .bind(world.slug.as_str())
        .bind(world.name.as_str())
        .bind(world.owner_id.map(UserId::into_inner))
        .bind(world.board_type.as_str())
        .bind(i64::from(world.board_size))
        .bind(world.is_public)
        .bind(i64::from(world.max_players))
        .bind(i64::from(world.max_teams))
        .bind(i64::from(world.min_teams))
        .bind(i64::from(world.max_team_size))
        .bind(i64::from(world.min_team_size))
        .bind(world.allow_player_team_creation)
        .bind(i64::from(world.cycle_duration_in_seconds))
        .bind(i64::from(world.action_points_per_cycle))
        .bind(i64::from(world.max_action_points))
        .bind(world.cycle_started_at)
        .bind(world.created_at)
}

async fn put_world(conn: &mut PgConnection, world: &World) -> Result<(), DbError> {
    if world.version == 0 {
        bind_world(
            sqlx::query(
                r"INSERT INTO worlds
                  (id, slug, name, owner_id, board_type, board_size, is_public, max_players,
                   max_teams, min_teams, max_team_size, min_team_size,
                   allow_player_team_creation, cycle_duration_in_seconds,
                   action_points_per_cycle, max_action_points, cycle_started_at,
                   created_at, version)
                  VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                          $16, $17, $18, 1)",
            ),
            world,
        )
        .execute(&mut *conn)
        .await
        .map_err(|err| classify("world", world.id, err))?;
        return Ok(());
    }

    let result = bind_world(
        sqlx::query(
            r"UPDATE worlds SET
                slug = $2, name = $3, owner_id = $4, board_type = $5, board_size = $6,
                is_public = $7, max_players = $8, max_teams = $9, min_teams = $10,
                max_team_size = $11, min_team_size = $12, allow_player_team_creation = $13,
                cycle_duration_in_seconds = $14, action_points_per_cycle = $15,
                max_action_points = $16, cycle_started_at = $17, created_at = $18,
                version = version + 1
              WHERE id = $1 AND version = $19",
        ),
        world,
    )
    .bind(db_version(world.version))
    .execute(&mut *conn)
    .await
    .map_err(|err| classify("world", world.id, err))?;
    expect_one(&result, "world", world.id, STALE)
}

async fn put_square(conn: &mut PgConnection, square: &Square) -> Result<(), DbError> {
    let owner = square.owner_id.map(UserId::into_inner);
    let bonus = i64::from(square.defense_bonus);

    if square.version == 0 {
        sqlx::query(
            r"INSERT INTO squares (id, world_id, x, y, owner_id, defense_bonus, version)
              VALUES ($1, $2, $3, $4, $5, $6, 1)",
        )
        .bind(square.id.into_inner())
        .bind(square.world_id.into_inner())
        .bind(square.x)
        .bind(square.y)
        .bind(owner)
        .bind(bonus)
        .execute(&mut *conn)
        .await
        .map_err(|err| classify("square", square.id, err))?;
        return Ok(());
    }

    let result = sqlx::query(
        r"UPDATE squares SET owner_id = $2, defense_bonus = $3, version = version + 1
          WHERE id = $1 AND version = $4",
    )
    .bind(square.id.into_inner())
    .bind(owner)
    .bind(bonus)
    .bind(db_version(square.version))
    .execute(&mut *conn)
    .await?;
    expect_one(&result, "square", square.id, STALE)
}

async fn replace_board(
    conn: &mut PgConnection,
    world_id: WorldId,
    squares: &[Square],
) -> Result<(), DbError> {
    sqlx::query("DELETE FROM squares WHERE world_id = $1")
        .bind(world_id.into_inner())
        .execute(&mut *conn)
        .await?;

    if squares.is_empty() {
        return Ok(());
    }

    // Pre-allocate arrays for the UNNEST-based batch insert.
    let len = squares.len();
    let mut ids = Vec::with_capacity(len);
    let mut xs = Vec::with_capacity(len);
    let mut ys = Vec::with_capacity(len);
    let mut owners: Vec<Option<Uuid>> = Vec::with_capacity(len);
    let mut bonuses = Vec::with_capacity(len);
    for square in squares {
        ids.push(square.id.into_inner());
        xs.push(square.x);
        ys.push(square.y);
        owners.push(square.owner_id.map(UserId::into_inner));
        bonuses.push(i64::from(square.defense_bonus));
    }

    sqlx::query(
        r"INSERT INTO squares (id, world_id, x, y, owner_id, defense_bonus, version)
          SELECT b.id, $1, b.x, b.y, b.owner_id, b.defense_bonus, 1
          FROM UNNEST($2::UUID[], $3::INTEGER[], $4::INTEGER[], $5::UUID[], $6::BIGINT[])
            AS b(id, x, y, owner_id, defense_bonus)",
    )
    .bind(world_id.into_inner())
    .bind(&ids)
    .bind(&xs)
    .bind(&ys)
    .bind(&owners)
    .bind(&bonuses)
    .execute(&mut *conn)
    .await
    .map_err(|err| classify("world", world_id, err))?;

    debug!(world_id = %world_id, squares = len, "Board replaced (batch UNNEST)");
    Ok(())
}

async fn put_team(conn: &mut PgConnection, team: &Team) -> Result<(), DbError> {
    if team.version == 0 {
        sqlx::query(
            r"INSERT INTO teams (id, world_id, name, color, creator_id, created_at, version)
              VALUES ($1, $2, $3, $4, $5, $6, 1)",
        )
        .bind(team.id.into_inner())
        .bind(team.world_id.into_inner())
        .bind(team.name.as_str())
        .bind(team.color.as_str())
        .bind(team.creator_id.into_inner())
        .bind(team.created_at)
        .execute(&mut *conn)
        .await
        .map_err(|err| classify("team", team.id, err))?;
        return Ok(());
    }

    let result = sqlx::query(
        r"UPDATE teams SET name = $2, color = $3, version = version + 1
          WHERE id = $1 AND version = $4",
    )
    .bind(team.id.into_inner())
    .bind(team.name.as_str())
    .bind(team.color.as_str())
    .bind(db_version(team.version))
    .execute(&mut *conn)
    .await
    .map_err(|err| classify("team", team.id, err))?;
    expect_one(&result, "team", team.id, STALE)
}

async fn put_member(conn: &mut PgConnection, member: &TeamMember) -> Result<(), DbError> {
    let points = i64::from(member.current_action_points);

    if member.version == 0 {
        // The world is copied from the team so one membership per world is a
        // plain unique constraint.
        let result = sqlx::query(
            r"INSERT INTO team_members
              (id, team_id, world_id, user_id, current_action_points, joined_at, version)
              SELECT $1, t.id, t.world_id, $3, $4, $5, 1 FROM teams t WHERE t.id = $2",
        )
        .bind(member.id.into_inner())
        .bind(member.team_id.into_inner())
        .bind(member.user_id.into_inner())
        .bind(points)
        .bind(member.joined_at)
        .execute(&mut *conn)
        .await
        .map_err(|err| classify("member", member.id, err))?;
        return expect_one(&result, "member", member.id, "team does not exist");
    }

    let result = sqlx::query(
        r"UPDATE team_members m SET
            team_id = t.id, world_id = t.world_id, current_action_points = $3,
            version = m.version + 1
          FROM teams t
          WHERE m.id = $1 AND m.version = $4 AND t.id = $2",
    )
    .bind(member.id.into_inner())
    .bind(member.team_id.into_inner())
    .bind(points)
    .bind(db_version(member.version))
    .execute(&mut *conn)
    .await
    .map_err(|err| classify("member", member.id, err))?;
    expect_one(&result, "member", member.id, STALE)
}

async fn write_change(conn: &mut PgConnection, change: &Change) -> Result<(), DbError> {
    match change {
        Change::PutUser(user) => {
            sqlx::query(
                r"INSERT INTO users (id, username) VALUES ($1, $2)
                  ON CONFLICT (id) DO UPDATE SET username = EXCLUDED.username",
            )
            .bind(user.id.into_inner())
            .bind(user.username.as_str())
            .execute(&mut *conn)
            .await?;
        }
        Change::DeleteUser(id) => {
            sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(id.into_inner())
                .execute(&mut *conn)
                .await?;
        }
        Change::PutWorld(world) => put_world(conn, world).await?,
        Change::DeleteWorld(id) => {
            sqlx::query("DELETE FROM worlds WHERE id = $1")
                .bind(id.into_inner())
                .execute(&mut *conn)
                .await?;
        }
        Change::PutSquare(square) => put_square(conn, square).await?,
        Change::ReplaceBoard { world_id, squares } => {
            replace_board(conn, *world_id, squares).await?;
        }
        Change::ResetBoard(world_id) => {
            sqlx::query(
                r"UPDATE squares SET owner_id = NULL, defense_bonus = 0, version = version + 1
                  WHERE world_id = $1 AND (owner_id IS NOT NULL OR defense_bonus > 0)",
            )
            .bind(world_id.into_inner())
            .execute(&mut *conn)
            .await?;
        }
        Change::ReleaseSquares { user_id, world_id } => {
            sqlx::query(
                r"UPDATE squares SET owner_id = NULL, defense_bonus = 0, version = version + 1
                  WHERE owner_id = $1 AND ($2::UUID IS NULL OR world_id = $2)",
            )
            .bind(user_id.into_inner())
            .bind(world_id.map(WorldId::into_inner))
            .execute(&mut *conn)
            .await?;
        }
        Change::PutTeam(team) => put_team(conn, team).await?,
        Change::DeleteTeam { id, version } => {
            let result = sqlx::query("DELETE FROM teams WHERE id = $1 AND version = $2")
                .bind(id.into_inner())
                .bind(db_version(*version))
                .execute(&mut *conn)
                .await?;
            expect_one(&result, "team", id, STALE)?;
        }
        Change::PutMember(member) => put_member(conn, member).await?,
        Change::DeleteMember(id) => {
            let result = sqlx::query("DELETE FROM team_members WHERE id = $1")
                .bind(id.into_inner())
                .execute(&mut *conn)
                .await?;
            expect_one(&result, "member", id, "row no longer exists")?;
        }
    }
    Ok(())
}

/// Write a change set in one transaction.
///
/// Dropping the transaction on an early return rolls it back.
async fn write_change_set(pool: &PgPool, changes: &[Change]) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;
    for change in changes {
        write_change(&mut tx, change).await?;
    }
    tx.commit().await?;
    Ok(())
}

// =========================================================================
// Store
// =========================================================================

/// Durable [`WorldStore`] over a `PostgreSQL` pool.
pub struct PgStore {
    pool: PgPool,
    mirror: MemoryStore,
    writer: Mutex<()>,
    runtime: Handle,
}

impl core::fmt::Debug for PgStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PgStore")
            .field("mirror", &self.mirror)
            .finish_non_exhaustive()
    }
}

impl PgStore {
    /// Load every table into the read model and bind commits to the
    /// current runtime.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if a table cannot be read, or
    /// [`DbError::Decode`] if a stored row is out of range.
    pub async fn open(pool: &PostgresPool) -> Result<Self, DbError> {
        let rows = load_tables(pool.pool()).await?;
        info!(
            users = rows.users.len(),
            worlds = rows.worlds.len(),
            squares = rows.squares.len(),
            teams = rows.teams.len(),
            members = rows.members.len(),
            "World store loaded from PostgreSQL"
        );
        Ok(Self {
            pool: pool.pool().clone(),
            mirror: MemoryStore::from_rows(rows),
            writer: Mutex::new(()),
            runtime: Handle::current(),
        })
    }
}

impl WorldStore for PgStore {
    fn world(&self, id: WorldId) -> Option<World> {
        self.mirror.world(id)
    }

    fn world_by_slug(&self, slug: &str) -> Option<World> {
        self.mirror.world_by_slug(slug)
    }

    fn worlds(&self) -> Vec<World> {
        self.mirror.worlds()
    }

    fn square_at(&self, world_id: WorldId, x: i32, y: i32) -> Option<Square> {
        self.mirror.square_at(world_id, x, y)
    }

    fn board(&self, world_id: WorldId) -> Vec<Square> {
        self.mirror.board(world_id)
    }

    fn team(&self, id: TeamId) -> Option<Team> {
        self.mirror.team(id)
    }

    fn teams_in_world(&self, world_id: WorldId) -> Vec<Team> {
        self.mirror.teams_in_world(world_id)
    }

    fn members_of_team(&self, team_id: TeamId) -> Vec<TeamMember> {
        self.mirror.members_of_team(team_id)
    }

    fn membership(&self, user_id: UserId, world_id: WorldId) -> Option<(Team, TeamMember)> {
        self.mirror.membership(user_id, world_id)
    }

    fn memberships_of_user(&self, user_id: UserId) -> Vec<(Team, TeamMember)> {
        self.mirror.memberships_of_user(user_id)
    }

    fn user(&self, id: UserId) -> Option<User> {
        self.mirror.user(id)
    }

    fn snapshot(&self, world_id: WorldId) -> Option<WorldSnapshot> {
        self.mirror.snapshot(world_id)
    }

    fn apply(&self, changes: ChangeSet) -> Result<(), DbError> {
        let writer = self.writer.lock();
        self.mirror.check(&changes)?;
        tokio::task::block_in_place(|| {
            self.runtime
                .block_on(write_change_set(&self.pool, &changes))
        })?;
        let applied = self.mirror.apply(changes).inspect_err(|err| {
            error!(error = %err, "Read model rejected a committed change set");
        });
        drop(writer);
        applied
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn world_row() -> WorldRow {
        WorldRow {
            id: Uuid::now_v7(),
            slug: "meadow".to_owned(),
            name: "Meadow".to_owned(),
            owner_id: None,
            board_type: "HEXAGON".to_owned(),
            board_size: 5,
            is_public: true,
            max_players: 8,
            max_teams: 4,
            min_teams: 2,
            max_team_size: 2,
            min_team_size: 1,
            allow_player_team_creation: true,
            cycle_duration_in_seconds: 60,
            action_points_per_cycle: 3,
            max_action_points: 9,
            cycle_started_at: None,
            created_at: Utc::now(),
            version: 4,
        }
    }

    #[test]
    fn world_row_decodes_into_domain_world() {
        let row = world_row();
        let id = row.id;
        let world = World::try_from(row).unwrap();
        assert_eq!(world.id.into_inner(), id);
        assert_eq!(world.board_type, BoardType::Hexagon);
        assert_eq!(world.board_size, 5);
        assert_eq!(world.version, 4);
    }

    #[test]
    fn out_of_range_columns_are_decode_errors() {
        let mut negative = world_row();
        negative.max_players = -1;
        assert!(matches!(World::try_from(negative), Err(DbError::Decode(_))));

        let mut unknown = world_row();
        unknown.board_type = "TRIANGLE".to_owned();
        assert!(matches!(World::try_from(unknown), Err(DbError::Decode(_))));
    }

    #[test]
    fn team_colour_is_stored_lowercase() {
        let row = TeamRow {
            id: Uuid::now_v7(),
            world_id: Uuid::now_v7(),
            name: "Reds".to_owned(),
            color: "red".to_owned(),
            creator_id: Uuid::now_v7(),
            created_at: Utc::now(),
            version: 1,
        };
        let team = Team::try_from(row).unwrap();
        assert_eq!(team.color, TeamColor::Red);
        assert_eq!(team.color.as_str(), "red");
    }

    #[test]
    fn versions_saturate_at_the_column_range() {
        assert_eq!(db_version(7), 7);
        assert_eq!(db_version(u64::MAX), i64::MAX);
    }
}
