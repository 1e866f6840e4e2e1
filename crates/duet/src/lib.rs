//! # Duet
//!
//! Peer-to-peer reconciliation for two-player turn-based games.
//!
//! There is no server. Each [`Peer`] publishes on its own endpoint,
//! subscribes to its opponent's, and keeps a full copy of the game. The
//! two copies stay identical because a move is applied on both sides only
//! once the opponent has validated it, and a peer that joins late adopts
//! its opponent's board before playing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use duet::prelude::*;
//!
//! # async fn run() -> Result<(), DuetError> {
//! let mut handle = Peer::builder().role(Role::X).connect().await?.spawn();
//! handle.submit("0,0").await?;
//! while let Some(event) = handle.next_event().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! - `duet-transport`: topic-framed pub/sub over WebSocket
//! - `duet-protocol`: roles, coordinates, topics, wire messages
//! - `duet-game`: board rules and snapshots

pub mod config;
mod error;
mod link;
mod monitor;
mod peer;
mod reconcile;

pub use config::{PeerConfig, SyncPhase};
pub use error::DuetError;
pub use link::Link;
pub use monitor::Monitor;
pub use peer::{Peer, PeerBuilder, PeerHandle};
pub use reconcile::{Action, Inbound, Origin, PeerEvent, Reconciler};

pub use duet_game as game;
pub use duet_protocol as protocol;
pub use duet_transport as transport;

/// Common imports for Duet users.
pub mod prelude {
    pub use crate::{DuetError, Monitor, Peer, PeerBuilder, PeerConfig, PeerEvent, PeerHandle};
    pub use duet_game::{GameState, Snapshot};
    pub use duet_protocol::{Coord, Outcome, Role};
}
