//! Core entity structs and the broadcast snapshot payload.
//!
//! Entities carry a `version` counter owned by the store: it is the version
//! the row was read at, and the store rejects a write whose version no
//! longer matches (see `reign-db`). A version of `0` marks a row that has
//! never been committed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{BoardType, MessageType, TeamColor};
use crate::ids::{SquareId, TeamId, TeamMemberId, UserId, WorldId};

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// A player account, reduced to what the game needs to display and clean up.
///
/// Credentials and sessions live outside the game core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct User {
    /// Unique user identifier.
    pub id: UserId,
    /// Display name.
    pub username: String,
}

// ---------------------------------------------------------------------------
// Worlds
// ---------------------------------------------------------------------------

/// One independent game instance: a board, its teams, and its cycle cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct World {
    /// Unique world identifier.
    pub id: WorldId,
    /// Unique, stable external key used in topics and URLs.
    pub slug: String,
    /// Human-readable name.
    pub name: String,
    /// Account that created the world, if any.
    pub owner_id: Option<UserId>,
    /// Cell shape of the board.
    pub board_type: BoardType,
    /// Edge length `N` of the `N x N` board.
    pub board_size: u32,
    /// Whether players may create or join teams.
    pub is_public: bool,
    /// Upper bound on players across all teams.
    pub max_players: u32,
    /// Upper bound on the number of teams.
    pub max_teams: u32,
    /// Lower bound on the number of teams for a meaningful game.
    pub min_teams: u32,
    /// Upper bound on members per team.
    pub max_team_size: u32,
    /// Lower bound on members per team.
    pub min_team_size: u32,
    /// Whether players (not just the owner) may create teams.
    pub allow_player_team_creation: bool,
    /// Length of one regeneration cycle. Always greater than zero.
    pub cycle_duration_in_seconds: u32,
    /// Action points granted to every member per cycle.
    pub action_points_per_cycle: u32,
    /// Cap on a member's action points.
    pub max_action_points: u32,
    /// Start of the current cycle window. `None` until the scheduler
    /// initializer anchors the world.
    pub cycle_started_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Store row version.
    #[serde(default)]
    pub version: u64,
}

// ---------------------------------------------------------------------------
// Squares
// ---------------------------------------------------------------------------

/// A single board cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Square {
    /// Unique square identifier.
    pub id: SquareId,
    /// The world this square belongs to.
    pub world_id: WorldId,
    /// Column, `0 <= x < N`.
    pub x: i32,
    /// Row, `0 <= y < N`.
    pub y: i32,
    /// Player currently holding the square.
    pub owner_id: Option<UserId>,
    /// Capture attempts the square still absorbs before changing hands.
    pub defense_bonus: u32,
    /// Store row version.
    #[serde(default)]
    pub version: u64,
}

impl Square {
    /// A fresh, unowned, undefended square that has never been stored.
    pub fn unowned(world_id: WorldId, x: i32, y: i32) -> Self {
        Self {
            id: SquareId::new(),
            world_id,
            x,
            y,
            owner_id: None,
            defense_bonus: 0,
            version: 0,
        }
    }

    /// Whether `user` is the current owner.
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner_id == Some(user)
    }
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

/// A group of players inside one world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Team {
    /// Unique team identifier.
    pub id: TeamId,
    /// The world this team plays in.
    pub world_id: WorldId,
    /// Name, unique per world.
    pub name: String,
    /// Colour, unique per world.
    pub color: TeamColor,
    /// Player who created the team.
    pub creator_id: UserId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Store row version. Every membership change rewrites the team row,
    /// so two units of work that both change the roster cannot both commit.
    #[serde(default)]
    pub version: u64,
}

/// Membership of one user in one team.
///
/// A user holds at most one membership per world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TeamMember {
    /// Unique membership identifier.
    pub id: TeamMemberId,
    /// The team joined.
    pub team_id: TeamId,
    /// The member.
    pub user_id: UserId,
    /// Spendable action points, within `[0, max_action_points]`.
    pub current_action_points: u32,
    /// When the user joined.
    pub joined_at: DateTime<Utc>,
    /// Store row version.
    #[serde(default)]
    pub version: u64,
}

impl TeamMember {
    /// A new membership with zero action points that has never been stored.
    pub fn new(team_id: TeamId, user_id: UserId, joined_at: DateTime<Utc>) -> Self {
        Self {
            id: TeamMemberId::new(),
            team_id,
            user_id,
            current_action_points: 0,
            joined_at,
            version: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot payload
// ---------------------------------------------------------------------------

/// A team member as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct MemberView {
    /// Membership identifier.
    pub id: TeamMemberId,
    /// The member's account.
    pub user_id: UserId,
    /// The member's display name (empty if the account is gone).
    pub username: String,
    /// Spendable action points.
    pub current_action_points: u32,
    /// When the user joined.
    pub joined_at: DateTime<Utc>,
}

/// A team with its members, as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TeamView {
    /// Team identifier.
    pub id: TeamId,
    /// Team name.
    pub name: String,
    /// Team colour.
    pub color: TeamColor,
    /// Player who created the team.
    pub creator_id: UserId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Current members.
    pub members: Vec<MemberView>,
}

/// Fully materialized board and teams of one world. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct WorldSnapshot {
    /// Every square of the board.
    pub board: Vec<Square>,
    /// Every team with its members.
    pub teams: Vec<TeamView>,
}

/// The payload published on `/topic/worlds/{slug}`.
///
/// Always a full snapshot, never a diff, so any single delivery brings a
/// client back in sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct WorldBroadcast {
    /// What triggered the broadcast.
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Every square of the board.
    pub board: Vec<Square>,
    /// Every team with its members.
    pub teams: Vec<TeamView>,
    /// Player whose action caused the broadcast (absent for cycle ticks).
    pub player_id: Option<UserId>,
    /// Publish time in epoch milliseconds.
    pub timestamp: i64,
    /// Next cycle tick in epoch milliseconds, only for `CYCLE_TICK`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[ts(optional)]
    pub next_cycle_at: Option<i64>,
}

// ---------------------------------------------------------------------------
// Scheduler inspection
// ---------------------------------------------------------------------------

/// Scheduling state of one world, as reported by the inspection endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CycleInfo {
    /// The scheduled world.
    pub world_id: WorldId,
    /// Its slug, or `unknown` if the world no longer exists.
    pub world_slug: String,
    /// Its display name, or `unknown` if the world no longer exists.
    pub world_name: String,
    /// Whether a timer is armed and has not finished.
    pub is_active: bool,
    /// Cycle length, when the world still exists.
    pub cycle_duration_seconds: Option<u32>,
    /// When the next tick is due, when the world still exists.
    pub next_cycle_at: Option<DateTime<Utc>>,
    /// Seconds until the next tick, when the world still exists.
    pub time_until_next_cycle: Option<u64>,
}
