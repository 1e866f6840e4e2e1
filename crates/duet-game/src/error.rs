//! Error types for the game layer.

use duet_protocol::{Coord, ProtocolError, Role};

use crate::GRID;

/// Why a move was refused.
///
/// The display text of each variant is what the player sees, so it is
/// phrased for them and travels over the wire unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    /// `role` tried to move while it was `turn`'s move.
    #[error("It is not your turn")]
    OutOfTurn { role: Role, turn: Role },

    /// The coordinate is outside the grid.
    #[error("Move out of bounds. Use rows and columns between 0 and {}.", GRID - 1)]
    OutOfBounds { coord: Coord },

    /// The target cell already carries a mark.
    #[error("This cell is not empty. Choose a different one.")]
    CellOccupied { coord: Coord },
}

/// Why a snapshot received from the opponent could not be restored.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The payload did not decode into a snapshot.
    #[error("malformed snapshot: {0}")]
    Decode(#[from] ProtocolError),

    /// The snapshot decoded but cannot come from a real game.
    #[error("inconsistent snapshot: {0}")]
    Inconsistent(String),
}
