//! A read-only spectator that follows both publishers.

use duet_game::{GameState, Snapshot, SyncError};
use duet_protocol::{Codec, Coord, JsonCodec, Message, Outcome, Role, Topic};
use duet_transport::TransportError;
use tokio::sync::mpsc;

use crate::link::{Delivery, spawn_subscription};
use crate::{DuetError, PeerConfig, PeerEvent};

/// Rebuilds the board from the traffic of both peers.
///
/// A move counts once it is acknowledged, so the monitor draws exactly what
/// the players' boards hold. An `ok` published by one seat acknowledges the
/// other seat's move. A monitor started mid-game catches up from the first
/// `state_response` it sees while its board is still empty.
#[derive(Debug, Default)]
pub struct Monitor {
    board: GameState,
    outcome: Option<Outcome>,
}

impl Monitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn board(&self) -> &GameState {
        &self.board
    }

    /// The result, once an `end` has been seen.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Folds one message published by `publisher` into the board.
    pub fn observe(&mut self, publisher: Role, message: &Message) -> Vec<PeerEvent> {
        match message.topic {
            Topic::Move(role) => {
                tracing::info!(%role, payload = %message.payload, "move proposed");
                Vec::new()
            }
            Topic::Ack => self.on_ack(publisher.other(), &message.payload),
            Topic::Error => {
                tracing::info!(%publisher, reason = %message.payload, "move refused");
                vec![PeerEvent::Rejected {
                    reason: message.payload.clone(),
                }]
            }
            Topic::End => match message.payload.parse::<Outcome>() {
                Ok(outcome) => {
                    tracing::info!(%outcome, "game over");
                    self.outcome = Some(outcome);
                    vec![PeerEvent::Finished(outcome)]
                }
                Err(e) => {
                    tracing::warn!(error = %e, "unreadable end-of-game");
                    Vec::new()
                }
            },
            Topic::StateResponse => self.on_state_response(publisher, &message.payload),
            Topic::StateRequest => Vec::new(),
        }
    }

    fn on_state_response(&mut self, publisher: Role, payload: &str) -> Vec<PeerEvent> {
        if self.board.mark_count() > 0 || self.outcome.is_some() {
            return Vec::new();
        }
        let restored = JsonCodec
            .decode::<Snapshot>(payload.as_bytes())
            .map_err(SyncError::from)
            .and_then(|snapshot| self.board.restore(snapshot));
        if let Err(e) = restored {
            tracing::warn!(%publisher, error = %e, "unreadable state response");
            return Vec::new();
        }
        tracing::info!(
            %publisher,
            marks = self.board.mark_count(),
            turn = %self.board.turn(),
            "caught up from state response"
        );

        let mut events = Vec::new();
        for (r, row) in self.board.board().iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if let Some(role) = cell.role() {
                    events.push(PeerEvent::CellMarked {
                        coord: Coord::new(r as i32, c as i32),
                        role,
                    });
                }
            }
        }
        events
    }

    fn on_ack(&mut self, mover: Role, payload: &str) -> Vec<PeerEvent> {
        let coord: Coord = match payload.parse() {
            Ok(coord) => coord,
            Err(e) => {
                tracing::warn!(error = %e, payload, "unreadable ack");
                return Vec::new();
            }
        };
        if let Err(e) = self.board.validate(mover, coord) {
            tracing::warn!(%mover, %coord, error = %e, "acknowledged move does not fit the board");
            return Vec::new();
        }
        self.board.apply(mover, coord);
        vec![PeerEvent::CellMarked { coord, role: mover }]
    }

    /// Subscribes to both endpoints in `config` and forwards every event
    /// until the game ends or both publishers are gone.
    pub async fn run(
        mut self,
        config: &PeerConfig,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Option<Outcome>, DuetError> {
        let (x_tx, mut x_rx) = mpsc::channel::<Delivery>(config.channel_size);
        let (o_tx, mut o_rx) = mpsc::channel::<Delivery>(config.channel_size);
        let tasks = [
            spawn_subscription(
                config.endpoints[Role::X].clone(),
                Vec::new(),
                config.reconnect_interval,
                x_tx,
            ),
            spawn_subscription(
                config.endpoints[Role::O].clone(),
                Vec::new(),
                config.reconnect_interval,
                o_tx,
            ),
        ];
        tracing::info!("monitor waiting for moves");

        let (mut x_open, mut o_open) = (true, true);
        let result = loop {
            let (publisher, delivery) = tokio::select! {
                d = x_rx.recv(), if x_open => (Role::X, d),
                d = o_rx.recv(), if o_open => (Role::O, d),
                else => break Ok(self.outcome),
            };
            match delivery {
                Some(Ok(message)) => {
                    for event in self.observe(publisher, &message) {
                        let _ = events.send(event);
                    }
                    if self.outcome.is_some() {
                        break Ok(self.outcome);
                    }
                }
                Some(Err(TransportError::ConnectionClosed(_))) | None => {
                    tracing::info!(%publisher, "publisher gone");
                    match publisher {
                        Role::X => x_open = false,
                        Role::O => o_open = false,
                    }
                }
                Some(Err(e)) => break Err(e.into()),
            }
        };

        for task in &tasks {
            task.abort();
        }
        result
    }
}
