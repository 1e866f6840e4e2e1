//! Peer configuration and the synchronization state machine.

use std::time::Duration;

use duet_protocol::{Role, RoleMap};

// ---------------------------------------------------------------------------
// PeerConfig
// ---------------------------------------------------------------------------

/// Configuration for one peer.
///
/// Both peers must agree on `endpoints`: each binds its own entry and
/// subscribes to the other.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// The seat this peer plays. Fixed for the life of the process.
    pub role: Role,

    /// Publisher address of each role, as `host:port`.
    pub endpoints: RoleMap<String>,

    /// How long a joining peer waits for the opponent's board before
    /// assuming it is first and starting fresh.
    pub sync_timeout: Duration,

    /// Delay between attempts to reach the opponent's publisher.
    pub reconnect_interval: Duration,

    /// Capacity of the bounded inbound and input channels.
    pub channel_size: usize,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            role: Role::STARTING,
            endpoints: RoleMap::new("127.0.0.1:5555".to_string(), "127.0.0.1:5556".to_string()),
            sync_timeout: Duration::from_secs(2),
            reconnect_interval: Duration::from_millis(100),
            channel_size: 64,
        }
    }
}

impl PeerConfig {
    /// Address this peer publishes on.
    pub fn own_endpoint(&self) -> &str {
        &self.endpoints[self.role]
    }

    /// Address of the opponent's publisher.
    pub fn opponent_endpoint(&self) -> &str {
        &self.endpoints[self.role.other()]
    }
}

// ---------------------------------------------------------------------------
// SyncPhase
// ---------------------------------------------------------------------------

/// Where a peer is in its session with the opponent.
///
/// Transitions are strictly ordered:
///
/// ```text
/// AwaitingOpponent → Synchronized → Finished
/// ```
///
/// - **AwaitingOpponent**: the peer asked for the opponent's board and is
///   waiting for an answer (bounded by `sync_timeout`).
/// - **Synchronized**: normal play.
/// - **Finished**: the game ended. Nothing is dispatched any more and the
///   transport is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    AwaitingOpponent,
    Synchronized,
    Finished,
}

impl SyncPhase {
    /// Returns the next phase, or `None` from `Finished`.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::AwaitingOpponent => Some(Self::Synchronized),
            Self::Synchronized => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    /// Returns `true` if moving to `target` is a forward step.
    ///
    /// Besides the single step, `AwaitingOpponent → Finished` is allowed:
    /// an opponent may end the game before any snapshot arrived.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
            || (self == Self::AwaitingOpponent && target == Self::Finished)
    }

    pub fn is_finished(self) -> bool {
        self == Self::Finished
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingOpponent => write!(f, "AwaitingOpponent"),
            Self::Synchronized => write!(f, "Synchronized"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}
