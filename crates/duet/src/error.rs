//! Unified error type for Duet.

use duet_game::{MoveError, SyncError};
use duet_protocol::ProtocolError;
use duet_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically. `Display` is transparent, so the user-facing
/// texts of [`ProtocolError::Format`] and [`MoveError`] survive wrapping
/// and can be sent over the wire as-is.
#[derive(Debug, thiserror::Error)]
pub enum DuetError {
    /// A transport-level error (bind, send, receive, disconnect).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A message could not be understood (bad topic, bad `row,col`).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A well-formed move broke the rules.
    #[error(transparent)]
    Move(#[from] MoveError),

    /// A state snapshot could not be restored.
    #[error(transparent)]
    Sync(#[from] SyncError),
}
