//! Game state for Duet.
//!
//! A [`GameState`] is the board plus whose turn it is. It is a leaf: no
//! I/O, no async, no knowledge of peers. The reconciliation layer owns one
//! per peer and is the only thing that mutates it.
//!
//! # Key types
//!
//! - [`GameState`]: `validate` / `apply` / `check_winner`, kept
//!   split so a move can be checked on one side of the network and applied
//!   on both
//! - [`Snapshot`]: the serializable board + turn used for late-join sync
//! - [`MoveError`]: why a move was refused
//! - [`SyncError`]: why a received snapshot was not restored

mod error;
mod snapshot;
mod state;

pub use error::{MoveError, SyncError};
pub use snapshot::Snapshot;
pub use state::{Board, Cell, GRID, GameState};
