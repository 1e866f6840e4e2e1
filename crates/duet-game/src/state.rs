//! The board, the turn tracker, and the win detector.

use duet_protocol::{Coord, Outcome, Role};
use serde::{Deserialize, Serialize};

use crate::{MoveError, Snapshot, SyncError};

/// Side length of the square grid.
pub const GRID: usize = 3;

/// A row-major grid of cells.
pub type Board = [[Cell; GRID]; GRID];

/// One square of the board.
///
/// On the wire an empty cell is `""` and a marked cell is the role's mark,
/// so a board serializes as `[["X","",""],["","O",""],["","",""]]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Cell {
    #[default]
    Empty,
    Marked(Role),
}

impl Cell {
    pub fn is_empty(self) -> bool {
        self == Self::Empty
    }

    /// The role that marked this cell, if any.
    pub fn role(self) -> Option<Role> {
        match self {
            Self::Empty => None,
            Self::Marked(role) => Some(role),
        }
    }
}

impl From<Cell> for String {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Empty => String::new(),
            Cell::Marked(role) => role.mark().to_string(),
        }
    }
}

impl TryFrom<String> for Cell {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "" => Ok(Self::Empty),
            "X" => Ok(Self::Marked(Role::X)),
            "O" => Ok(Self::Marked(Role::O)),
            other => Err(format!("invalid cell {other:?}")),
        }
    }
}

/// A peer's authoritative copy of the game.
///
/// Invariants:
/// - a marked cell is never cleared;
/// - the number of marks equals the number of applied moves;
/// - `turn` flips on every applied move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    board: Board,
    turn: Role,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    /// An empty board with [`Role::STARTING`] to move.
    pub fn new() -> Self {
        Self {
            board: [[Cell::Empty; GRID]; GRID],
            turn: Role::STARTING,
        }
    }

    /// The role whose move is currently accepted.
    pub fn turn(&self) -> Role {
        self.turn
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// The cell at `coord`, or `None` if it is off the board.
    pub fn cell(&self, coord: Coord) -> Option<Cell> {
        let (row, col) = to_index(coord)?;
        Some(self.board[row][col])
    }

    /// Number of marked cells.
    pub fn mark_count(&self) -> usize {
        self.board
            .iter()
            .flatten()
            .filter(|cell| !cell.is_empty())
            .count()
    }

    /// Checks whether `role` may mark `coord` right now. Never mutates.
    ///
    /// Checks run in a fixed order: turn, then bounds, then occupancy.
    pub fn validate(&self, role: Role, coord: Coord) -> Result<(), MoveError> {
        if role != self.turn {
            return Err(MoveError::OutOfTurn {
                role,
                turn: self.turn,
            });
        }
        let (row, col) = to_index(coord).ok_or(MoveError::OutOfBounds { coord })?;
        if !self.board[row][col].is_empty() {
            return Err(MoveError::CellOccupied { coord });
        }
        Ok(())
    }

    /// Marks `coord` for `role` and passes the turn.
    ///
    /// Performs no validation: the caller must have called
    /// [`validate`](Self::validate) first. An off-board `coord` marks
    /// nothing but still passes the turn.
    pub fn apply(&mut self, role: Role, coord: Coord) {
        if let Some((row, col)) = to_index(coord) {
            self.board[row][col] = Cell::Marked(role);
        }
        self.turn = self.turn.other();
    }

    /// Returns the result if the game is over.
    ///
    /// Lines are scanned rows first, then columns, then the main and anti
    /// diagonal. A full board with no line is a draw.
    pub fn check_winner(&self) -> Option<Outcome> {
        let b = &self.board;
        let line = |cells: [Cell; GRID]| -> Option<Role> {
            let first = cells[0].role()?;
            cells.iter().all(|c| *c == cells[0]).then_some(first)
        };

        let rows = (0..GRID).map(|r| [b[r][0], b[r][1], b[r][2]]);
        let cols = (0..GRID).map(|c| [b[0][c], b[1][c], b[2][c]]);
        let diagonals = [
            [b[0][0], b[1][1], b[2][2]],
            [b[0][2], b[1][1], b[2][0]],
        ];

        if let Some(winner) = rows.chain(cols).chain(diagonals).find_map(line) {
            return Some(Outcome::Winner(winner));
        }
        if b.iter().flatten().all(|c| !c.is_empty()) {
            return Some(Outcome::Draw);
        }
        None
    }

    /// Copies the full board and turn.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            board: self.board,
            turn: self.turn,
        }
    }

    /// Replaces this state wholesale with `snapshot`.
    ///
    /// The snapshot is checked first; on error `self` is left untouched.
    pub fn restore(&mut self, snapshot: Snapshot) -> Result<(), SyncError> {
        snapshot.verify()?;
        self.board = snapshot.board;
        self.turn = snapshot.turn;
        Ok(())
    }
}

fn to_index(coord: Coord) -> Option<(usize, usize)> {
    let row = usize::try_from(coord.row).ok().filter(|r| *r < GRID)?;
    let col = usize::try_from(coord.col).ok().filter(|c| *c < GRID)?;
    Some((row, col))
}
