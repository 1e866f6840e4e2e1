//! The reconciliation protocol: turns inbound messages into game-state
//! changes and outbound messages.
//!
//! A [`Reconciler`] is pure. It owns the peer's [`GameState`] and answers
//! every [`Inbound`] message with a list of [`Action`]s for the caller to
//! carry out (publish, notify the local player, close the link). All I/O
//! lives in [`crate::peer`], which keeps this logic testable without a
//! runtime.
//!
//! Own moves are committed in two phases. A move typed locally is checked
//! and forwarded, but only applied when the opponent's acknowledgment comes
//! back. The opponent applies it the moment it validates it. Both boards
//! therefore change on the same accepted move and never diverge.

use duet_game::{GameState, MoveError, Snapshot, SyncError};
use duet_protocol::{Codec, Coord, JsonCodec, Message, Outcome, Role, Topic};

use crate::{DuetError, SyncPhase};

/// Where an inbound message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Typed by the local player and echoed into the inbound path.
    Local,
    /// Received from the opponent's publisher.
    Remote,
}

/// A message entering the single dispatch point of a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub origin: Origin,
    pub message: Message,
}

impl Inbound {
    pub fn local(message: Message) -> Self {
        Self {
            origin: Origin::Local,
            message,
        }
    }

    pub fn remote(message: Message) -> Self {
        Self {
            origin: Origin::Remote,
            message,
        }
    }
}

/// What the local player is told. This is the whole rendering surface:
/// the peer pushes these and never reads anything back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// Sync finished. `restored` is `true` if the opponent's board was
    /// adopted, `false` if this peer started (or kept) its own.
    Synchronized { restored: bool },
    /// Draw `role`'s mark at `coord`.
    CellMarked { coord: Coord, role: Role },
    /// A move was refused; show `reason`.
    Rejected { reason: String },
    /// The game is over.
    Finished(Outcome),
    /// The link to the opponent failed and the peer stopped.
    Disconnected { reason: String },
}

/// A side effect requested by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send to the opponent.
    Publish(Message),
    /// Tell the local player.
    Notify(PeerEvent),
    /// Release the transport. Always the last action of a finished game.
    Close,
}

/// Per-peer protocol state: the board, the sync phase, and the own move
/// waiting for acknowledgment.
#[derive(Debug)]
pub struct Reconciler<C: Codec = JsonCodec> {
    role: Role,
    phase: SyncPhase,
    game: GameState,
    pending: Option<Coord>,
    codec: C,
}

impl Reconciler<JsonCodec> {
    /// A reconciler for `role` with a fresh board, exchanging snapshots
    /// as JSON.
    pub fn new(role: Role) -> Self {
        Self::with_codec(role, JsonCodec)
    }
}

impl<C: Codec> Reconciler<C> {
    pub fn with_codec(role: Role, codec: C) -> Self {
        Self {
            role,
            phase: SyncPhase::AwaitingOpponent,
            game: GameState::new(),
            pending: None,
            codec,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    /// The own move sent to the opponent and not yet acknowledged.
    pub fn pending(&self) -> Option<Coord> {
        self.pending
    }

    /// First actions of a session: ask the opponent for its board.
    pub fn start(&self) -> Vec<Action> {
        tracing::debug!(role = %self.role, "requesting opponent state");
        vec![Action::Publish(Message::state_request(self.role))]
    }

    /// Called when the late-join wait expires without a state response.
    pub fn sync_timed_out(&mut self) -> Vec<Action> {
        if self.phase != SyncPhase::AwaitingOpponent {
            return Vec::new();
        }
        tracing::info!(role = %self.role, "no state from opponent, starting fresh");
        vec![self.enter_synchronized(false)]
    }

    /// Dispatches one inbound message.
    pub fn handle(&mut self, inbound: Inbound) -> Vec<Action> {
        let Inbound { origin, message } = inbound;

        if self.phase.is_finished() {
            tracing::debug!(role = %self.role, %message, "game finished, ignoring");
            return Vec::new();
        }
        tracing::debug!(role = %self.role, ?origin, %message, "dispatching");

        let opponent = self.role.other();
        match (origin, message.topic) {
            (Origin::Local, Topic::Move(role)) if role == self.role => {
                self.on_own_move(&message.payload)
            }
            (Origin::Remote, Topic::Move(role)) if role == opponent => {
                self.on_peer_move(&message.payload)
            }
            (Origin::Remote, Topic::Ack) => self.on_ack(&message.payload),
            (Origin::Remote, Topic::Error) => self.on_error(message.payload),
            (Origin::Remote, Topic::End) => self.on_end(&message.payload),
            (Origin::Remote, Topic::StateRequest) => self.on_state_request(&message.payload),
            (Origin::Remote, Topic::StateResponse) => self.on_state_response(&message.payload),
            (origin, topic) => {
                tracing::warn!(role = %self.role, ?origin, %topic, "unexpected message, ignoring");
                Vec::new()
            }
        }
    }

    // -- Moves --

    /// A move typed by the local player. Checked here, forwarded to the
    /// opponent, but not applied until acknowledged.
    fn on_own_move(&mut self, payload: &str) -> Vec<Action> {
        match self.check_own_move(payload) {
            Ok(coord) => {
                self.pending = Some(coord);
                tracing::debug!(role = %self.role, %coord, "own move sent, awaiting ack");
                vec![Action::Publish(Message::play(self.role, coord))]
            }
            Err(e) => {
                tracing::debug!(role = %self.role, error = %e, "own move rejected");
                vec![Action::Notify(PeerEvent::Rejected {
                    reason: e.to_string(),
                })]
            }
        }
    }

    fn check_own_move(&self, payload: &str) -> Result<Coord, DuetError> {
        let coord: Coord = payload.parse()?;
        // Until the outstanding move is settled the turn has effectively
        // passed, even though the board has not flipped it yet.
        if self.pending.is_some() {
            return Err(MoveError::OutOfTurn {
                role: self.role,
                turn: self.role.other(),
            }
            .into());
        }
        self.game.validate(self.role, coord)?;
        Ok(coord)
    }

    /// A move from the opponent: validate, apply, acknowledge, and end the
    /// game if this move decided it.
    fn on_peer_move(&mut self, payload: &str) -> Vec<Action> {
        let opponent = self.role.other();
        let coord = match self.check_peer_move(payload) {
            Ok(coord) => coord,
            Err(e) => {
                tracing::debug!(role = %self.role, error = %e, "opponent move rejected");
                return vec![Action::Publish(Message::error(&e))];
            }
        };

        let mut actions = self.settle_sync();
        self.game.apply(opponent, coord);
        actions.push(Action::Notify(PeerEvent::CellMarked {
            coord,
            role: opponent,
        }));
        actions.push(Action::Publish(Message::ack(coord)));

        if let Some(outcome) = self.game.check_winner() {
            actions.push(Action::Publish(Message::end(outcome)));
            actions.extend(self.finish(outcome));
        }
        actions
    }

    fn check_peer_move(&self, payload: &str) -> Result<Coord, DuetError> {
        let coord: Coord = payload.parse()?;
        self.game.validate(self.role.other(), coord)?;
        Ok(coord)
    }

    /// The opponent accepted the outstanding own move: apply it now.
    fn on_ack(&mut self, payload: &str) -> Vec<Action> {
        let coord: Coord = match payload.parse() {
            Ok(coord) => coord,
            Err(e) => {
                tracing::warn!(role = %self.role, error = %e, payload, "unreadable ack, ignoring");
                return Vec::new();
            }
        };
        let Some(pending) = self.pending else {
            tracing::warn!(role = %self.role, %coord, "ack without an outstanding move, ignoring");
            return Vec::new();
        };
        if pending != coord {
            tracing::warn!(role = %self.role, %pending, %coord, "ack does not match outstanding move, ignoring");
            return Vec::new();
        }

        self.pending = None;
        let mut actions = self.settle_sync();
        self.game.apply(self.role, coord);
        actions.push(Action::Notify(PeerEvent::CellMarked {
            coord,
            role: self.role,
        }));

        if self.game.check_winner().is_some() {
            // The opponent applied this move first and sends the result.
            tracing::debug!(role = %self.role, "deciding move acknowledged, awaiting end");
        }
        actions
    }

    /// The opponent refused something this peer sent.
    fn on_error(&mut self, reason: String) -> Vec<Action> {
        if let Some(coord) = self.pending.take() {
            tracing::debug!(role = %self.role, %coord, %reason, "outstanding move refused");
        }
        vec![Action::Notify(PeerEvent::Rejected { reason })]
    }

    // -- Termination --

    fn on_end(&mut self, payload: &str) -> Vec<Action> {
        let outcome: Outcome = match payload.parse() {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(role = %self.role, error = %e, payload, "unreadable end-of-game, ignoring");
                return Vec::new();
            }
        };
        let local = self.game.check_winner();
        if local != Some(outcome) {
            tracing::warn!(role = %self.role, %outcome, ?local, "opponent's result differs from local board");
        }
        self.finish(outcome)
    }

    fn finish(&mut self, outcome: Outcome) -> Vec<Action> {
        debug_assert!(self.phase.can_transition_to(SyncPhase::Finished));
        self.phase = SyncPhase::Finished;
        self.pending = None;
        tracing::info!(role = %self.role, %outcome, "game finished");
        vec![Action::Notify(PeerEvent::Finished(outcome)), Action::Close]
    }

    // -- Late-join sync --

    fn on_state_request(&self, asker: &str) -> Vec<Action> {
        tracing::debug!(role = %self.role, asker, "sending state");
        match self.codec.encode(&self.game.snapshot()) {
            Ok(bytes) => vec![Action::Publish(Message::state_response(
                String::from_utf8_lossy(&bytes),
            ))],
            Err(e) => {
                tracing::warn!(role = %self.role, error = %e, "could not encode state");
                Vec::new()
            }
        }
    }

    fn on_state_response(&mut self, payload: &str) -> Vec<Action> {
        if self.phase != SyncPhase::AwaitingOpponent {
            tracing::debug!(role = %self.role, "late or duplicate state response, ignoring");
            return Vec::new();
        }

        match self.restore_from(payload) {
            Ok(()) => {
                tracing::info!(
                    role = %self.role,
                    marks = self.game.mark_count(),
                    turn = %self.game.turn(),
                    "adopted opponent state"
                );
                let mut actions = vec![self.enter_synchronized(true)];
                actions.extend(self.marked_cells());
                actions
            }
            Err(e) => {
                tracing::warn!(role = %self.role, error = %e, "state sync failed, keeping local board");
                vec![self.enter_synchronized(false)]
            }
        }
    }

    fn restore_from(&mut self, payload: &str) -> Result<(), SyncError> {
        let snapshot: Snapshot = self.codec.decode(payload.as_bytes())?;
        // An own move sent during the wait stays outstanding. The opponent
        // answered the request before seeing that move, so its ack or error
        // still follows and settles it on top of this board.
        self.game.restore(snapshot)?;
        Ok(())
    }

    /// One `CellMarked` per occupied cell, for redrawing a restored board.
    fn marked_cells(&self) -> Vec<Action> {
        let mut actions = Vec::new();
        for (r, row) in self.game.board().iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if let Some(role) = cell.role() {
                    actions.push(Action::Notify(PeerEvent::CellMarked {
                        coord: Coord::new(r as i32, c as i32),
                        role,
                    }));
                }
            }
        }
        actions
    }

    /// A move settled while still awaiting a snapshot means the opponent
    /// is already playing on this board. A snapshot arriving after that
    /// would roll the move back, so sync is considered done.
    fn settle_sync(&mut self) -> Vec<Action> {
        if self.phase == SyncPhase::AwaitingOpponent {
            vec![self.enter_synchronized(false)]
        } else {
            Vec::new()
        }
    }

    fn enter_synchronized(&mut self, restored: bool) -> Action {
        debug_assert!(self.phase.can_transition_to(SyncPhase::Synchronized));
        self.phase = SyncPhase::Synchronized;
        tracing::info!(role = %self.role, restored, "synchronized");
        Action::Notify(PeerEvent::Synchronized { restored })
    }
}
