//! Enumeration types shared by the store, the game core and the wire.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Board topology
// ---------------------------------------------------------------------------

/// Shape of the cells on a world's board.
///
/// The topology only changes which cells count as neighbours; the board is
/// always stored as an `N x N` grid of `(x, y)` coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum BoardType {
    /// Square cells with four orthogonal neighbours.
    Square,
    /// Offset-row hexagonal cells with six neighbours.
    #[default]
    Hexagon,
}

impl BoardType {
    /// Upper-case name as stored and sent on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Square => "SQUARE",
            Self::Hexagon => "HEXAGON",
        }
    }

    /// Parse a board type name, ignoring ASCII case.
    pub fn parse(name: &str) -> Option<Self> {
        [Self::Square, Self::Hexagon]
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

// ---------------------------------------------------------------------------
// Team colours
// ---------------------------------------------------------------------------

/// The fixed palette a team may pick its colour from.
///
/// Colours are unique per world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum TeamColor {
    /// Red.
    Red,
    /// Blue.
    Blue,
    /// Green.
    Green,
    /// Yellow.
    Yellow,
    /// Purple.
    Purple,
    /// Teal.
    Teal,
}

impl TeamColor {
    /// Every selectable colour, in palette order.
    pub const ALL: [Self; 6] = [
        Self::Red,
        Self::Blue,
        Self::Green,
        Self::Yellow,
        Self::Purple,
        Self::Teal,
    ];

    /// Lower-case name as stored and sent on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Purple => "purple",
            Self::Teal => "teal",
        }
    }

    /// Parse a colour name, ignoring ASCII case.
    ///
    /// Returns `None` for anything outside the palette.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|color| color.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl core::fmt::Display for TeamColor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Broadcast message types
// ---------------------------------------------------------------------------

/// What triggered a world broadcast.
///
/// Every variant carries the same full snapshot payload; the type only tells
/// clients which change caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum MessageType {
    /// A capture attempt changed a square (ownership or defense bonus).
    SquareCaptured,
    /// A player reinforced one of their squares.
    SquareDefended,
    /// A team was created together with its creator's membership.
    TeamCreated,
    /// A player joined an existing team.
    TeamJoined,
    /// A player left their team and lost their squares.
    PlayerLeft,
    /// A user account was removed and its squares were released.
    UserDeleted,
    /// The whole board was reset to unowned.
    WorldReset,
    /// The cycle scheduler regenerated action points.
    CycleTick,
}

impl MessageType {
    /// Wire name of the message type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SquareCaptured => "SQUARE_CAPTURED",
            Self::SquareDefended => "SQUARE_DEFENDED",
            Self::TeamCreated => "TEAM_CREATED",
            Self::TeamJoined => "TEAM_JOINED",
            Self::PlayerLeft => "PLAYER_LEFT",
            Self::UserDeleted => "USER_DELETED",
            Self::WorldReset => "WORLD_RESET",
            Self::CycleTick => "CYCLE_TICK",
        }
    }
}

impl core::fmt::Display for MessageType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_parse_is_case_insensitive() {
        assert_eq!(TeamColor::parse("Teal"), Some(TeamColor::Teal));
        assert_eq!(TeamColor::parse(" RED "), Some(TeamColor::Red));
        assert_eq!(TeamColor::parse("orange"), None);
    }

    #[test]
    fn message_type_wire_name_matches_serde() {
        for kind in [MessageType::CycleTick, MessageType::SquareCaptured, MessageType::WorldReset] {
            let json = serde_json::to_string(&kind).ok();
            assert_eq!(json, Some(format!("\"{}\"", kind.as_str())));
        }
    }

    #[test]
    fn board_type_uses_upper_case_tags() {
        let json = serde_json::to_string(&BoardType::Hexagon).ok();
        assert_eq!(json.as_deref(), Some("\"HEXAGON\""));
        assert_eq!(BoardType::parse("square"), Some(BoardType::Square));
        assert_eq!(BoardType::parse("triangle"), None);
    }
}
