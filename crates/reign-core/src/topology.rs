//! Board neighbourhoods.
//!
//! Square boards use the four orthogonal neighbours. Hexagon boards use an
//! offset-row layout: the four orthogonal neighbours plus the two diagonal
//! cells above and below, shifted left on even rows and right on odd rows.
//! Callers drop coordinates that fall outside the board.

use reign_types::BoardType;

/// Neighbour strategy for a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Four orthogonal neighbours.
    Square,
    /// Orthogonal neighbours plus the two row-parity diagonals.
    Hexagon,
}

impl From<BoardType> for Topology {
    fn from(board_type: BoardType) -> Self {
        match board_type {
            BoardType::Square => Self::Square,
            BoardType::Hexagon => Self::Hexagon,
        }
    }
}

impl Topology {
    /// Candidate neighbour coordinates of `(x, y)`, unfiltered.
    pub fn neighbors_of(self, x: i32, y: i32) -> Vec<(i32, i32)> {
        let mut cells = vec![
            (x.saturating_sub(1), y),
            (x.saturating_add(1), y),
            (x, y.saturating_sub(1)),
            (x, y.saturating_add(1)),
        ];
        if self == Self::Hexagon {
            let shifted = if y.rem_euclid(2) == 0 {
                x.saturating_sub(1)
            } else {
                x.saturating_add(1)
            };
            cells.push((shifted, y.saturating_sub(1)));
            cells.push((shifted, y.saturating_add(1)));
        }
        cells
    }

    /// Neighbours of `(x, y)` that lie on an `size` by `size` board.
    pub fn neighbors_on_board(self, x: i32, y: i32, size: u32) -> Vec<(i32, i32)> {
        self.neighbors_of(x, y)
            .into_iter()
            .filter(|&(nx, ny)| in_bounds(nx, ny, size))
            .collect()
    }
}

/// Whether `(x, y)` lies on an `size` by `size` board.
pub fn in_bounds(x: i32, y: i32, size: u32) -> bool {
    let Ok(size) = i32::try_from(size) else {
        return x >= 0 && y >= 0;
    };
    (0..size).contains(&x) && (0..size).contains(&y)
}
