//! Serializable copy of a [`GameState`](crate::GameState).

use std::fmt;

use duet_protocol::Role;
use serde::{Deserialize, Serialize};

use crate::{Board, Cell, SyncError};

/// The full board and turn, as exchanged during late-join sync.
///
/// JSON form: `{"board":[["X","",""],["","O",""],["","",""]],"turn":"X"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub board: Board,
    pub turn: Role,
}

impl Default for Snapshot {
    fn default() -> Self {
        crate::GameState::new().snapshot()
    }
}

impl Snapshot {
    /// Number of cells marked by `role`.
    pub fn count(&self, role: Role) -> usize {
        self.board
            .iter()
            .flatten()
            .filter(|cell| **cell == Cell::Marked(role))
            .count()
    }

    /// Checks that this board could come out of alternating play started
    /// by [`Role::STARTING`].
    pub fn verify(&self) -> Result<(), SyncError> {
        let first = self.count(Role::STARTING);
        let second = self.count(Role::STARTING.other());

        let expected_turn = if first == second {
            Role::STARTING
        } else if first == second + 1 {
            Role::STARTING.other()
        } else {
            return Err(SyncError::Inconsistent(format!(
                "{} has {first} marks and {} has {second}",
                Role::STARTING,
                Role::STARTING.other()
            )));
        };

        if self.turn != expected_turn {
            return Err(SyncError::Inconsistent(format!(
                "turn is {} but the marks say {expected_turn}",
                self.turn
            )));
        }
        Ok(())
    }
}

/// Draws the board as ASCII with the current turn on top.
impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Current turn: {}", self.turn)?;
        writeln!(f, "-------------")?;
        for row in &self.board {
            write!(f, "|")?;
            for cell in row {
                let mark = cell.role().map_or(" ", Role::mark);
                write!(f, " {mark} |")?;
            }
            writeln!(f)?;
            writeln!(f, "-------------")?;
        }
        Ok(())
    }
}
