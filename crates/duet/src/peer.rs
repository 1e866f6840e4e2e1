//! A running peer: the inbound and outbound loops around a [`Reconciler`].
//!
//! ```text
//!  player input ──► outbound loop ──echo──┐
//!                                         ▼
//!  opponent ──► Link::recv ──────► inbound loop ──► Link::publish ──► opponent
//!                                    │  (owns the Reconciler)
//!                                    ├──► PeerEvent channel ──► UI
//!                                    └──► watch<Snapshot> ──► outbound loop, UI
//! ```
//!
//! Only the inbound loop touches the game state. Local input is echoed
//! into it rather than applied by the outbound loop, so every change goes
//! through one dispatch point in arrival order.

use std::time::Duration;

use duet_game::Snapshot;
use duet_protocol::{Message, Role, Topic};
use duet_transport::TransportError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::reconcile::{Action, Inbound, PeerEvent, Reconciler};
use crate::{DuetError, Link, PeerConfig, SyncPhase};

/// Builder for configuring and starting a [`Peer`].
///
/// # Example
///
/// ```rust,no_run
/// use duet::prelude::*;
///
/// # async fn run() -> Result<(), DuetError> {
/// let peer = Peer::builder()
///     .role(Role::O)
///     .endpoint(Role::X, "10.0.0.2:5555")
///     .connect()
///     .await?;
/// let handle = peer.spawn();
/// handle.submit("1,1").await?;
/// # Ok(())
/// # }
/// ```
pub struct PeerBuilder {
    config: PeerConfig,
}

impl PeerBuilder {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Self {
            config: PeerConfig::default(),
        }
    }

    /// Sets the seat this peer plays.
    pub fn role(mut self, role: Role) -> Self {
        self.config.role = role;
        self
    }

    /// Sets the publisher address of `role`.
    pub fn endpoint(mut self, role: Role, addr: impl Into<String>) -> Self {
        self.config.endpoints[role] = addr.into();
        self
    }

    pub fn sync_timeout(mut self, timeout: Duration) -> Self {
        self.config.sync_timeout = timeout;
        self
    }

    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.reconnect_interval = interval;
        self
    }

    pub fn channel_size(mut self, size: usize) -> Self {
        self.config.channel_size = size;
        self
    }

    /// The configuration built so far.
    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    /// Binds the publisher and starts subscribing to the opponent.
    pub async fn connect(self) -> Result<Peer, DuetError> {
        let link = Link::connect(&self.config).await?;
        Ok(Peer::new(self.config, link))
    }

    /// Uses an existing link instead of opening sockets.
    pub fn with_link(self, link: Link) -> Peer {
        Peer::new(self.config, link)
    }
}

impl Default for PeerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A peer that is connected but not yet running.
pub struct Peer {
    config: PeerConfig,
    link: Link,
}

impl Peer {
    pub fn builder() -> PeerBuilder {
        PeerBuilder::new()
    }

    pub fn new(config: PeerConfig, link: Link) -> Self {
        Self { config, link }
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    /// Starts the peer's loops and returns a handle to drive them.
    pub fn spawn(self) -> PeerHandle {
        let Peer { config, link } = self;
        let role = config.role;

        let (input_tx, input_rx) = mpsc::channel(config.channel_size);
        let (echo_tx, echo_rx) = mpsc::channel(config.channel_size);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (board_tx, board_rx) = watch::channel(Snapshot::default());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let outbound = tokio::spawn(outbound_loop(role, input_rx, echo_tx, board_rx.clone()));
        let inbound = InboundLoop {
            reconciler: Reconciler::new(role),
            link,
            echo: echo_rx,
            events: event_tx,
            board: board_tx,
            sync_timeout: config.sync_timeout,
            resend_interval: config.reconnect_interval,
        };
        let task = tokio::spawn(async move {
            inbound.run(shutdown_rx).await;
            outbound.abort();
        });

        PeerHandle {
            role,
            input: input_tx,
            events: event_rx,
            board: board_rx,
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

/// Handle to a running peer.
///
/// Dropping the handle stops the peer.
pub struct PeerHandle {
    role: Role,
    input: mpsc::Sender<String>,
    events: mpsc::UnboundedReceiver<PeerEvent>,
    board: watch::Receiver<Snapshot>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PeerHandle {
    pub fn role(&self) -> Role {
        self.role
    }

    /// Submits a move typed by the player, as `row,col`.
    ///
    /// The outcome arrives later as a [`PeerEvent`]: `CellMarked` once the
    /// opponent accepts it, `Rejected` otherwise.
    pub async fn submit(&self, text: impl Into<String>) -> Result<(), DuetError> {
        self.input
            .send(text.into())
            .await
            .map_err(|_| TransportError::Shutdown.into())
    }

    /// Waits for the next event. Returns `None` once the peer has stopped
    /// and every event has been read.
    pub async fn next_event(&mut self) -> Option<PeerEvent> {
        self.events.recv().await
    }

    /// The board as of the last dispatched message.
    pub fn board(&self) -> Snapshot {
        *self.board.borrow()
    }

    /// A receiver that is notified on every board change.
    pub fn board_watch(&self) -> watch::Receiver<Snapshot> {
        self.board.clone()
    }

    /// Asks the peer to stop. The transport is closed on the way out.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    /// Waits for the peer to stop on its own (game over, opponent gone,
    /// or after [`shutdown`](Self::shutdown)).
    pub async fn join(self) {
        let PeerHandle { task, shutdown, .. } = self;
        // Held so that joining does not count as dropping the handle.
        let _shutdown = shutdown;
        if let Err(e) = task.await {
            tracing::error!(error = %e, "peer task failed");
        }
    }
}

/// Forwards player input into the inbound loop, tagged with the own role.
async fn outbound_loop(
    role: Role,
    mut input: mpsc::Receiver<String>,
    echo: mpsc::Sender<Message>,
    board: watch::Receiver<Snapshot>,
) {
    while let Some(text) = input.recv().await {
        if board.borrow().turn != role {
            tracing::debug!(%role, "input while the opponent is to move");
        }
        if echo
            .send(Message::new(Topic::Move(role), text.trim()))
            .await
            .is_err()
        {
            break;
        }
    }
}

enum Flow {
    Continue,
    Stop,
}

struct InboundLoop {
    reconciler: Reconciler,
    link: Link,
    echo: mpsc::Receiver<Message>,
    events: mpsc::UnboundedSender<PeerEvent>,
    board: watch::Sender<Snapshot>,
    sync_timeout: Duration,
    resend_interval: Duration,
}

impl InboundLoop {
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        let role = self.reconciler.role();
        tracing::info!(%role, "peer started");

        let sync_deadline = tokio::time::sleep(self.sync_timeout);
        tokio::pin!(sync_deadline);
        // A request published before the opponent subscribed is lost, so
        // it is repeated for as long as the wait lasts.
        let mut resend = tokio::time::interval_at(
            Instant::now() + self.resend_interval,
            self.resend_interval,
        );
        resend.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut flow = self.perform(self.reconciler.start()).await;
        while let Flow::Continue = flow {
            let awaiting = self.reconciler.phase() == SyncPhase::AwaitingOpponent;
            let actions = tokio::select! {
                Some(message) = self.echo.recv() => {
                    self.reconciler.handle(Inbound::local(message))
                }
                received = self.link.recv() => match received {
                    Ok(Some(message)) => self.reconciler.handle(Inbound::remote(message)),
                    Ok(None) => {
                        self.disconnected("opponent closed the connection");
                        break;
                    }
                    Err(e) => {
                        self.disconnected(e.to_string());
                        break;
                    }
                },
                () = &mut sync_deadline, if awaiting => self.reconciler.sync_timed_out(),
                _ = resend.tick(), if awaiting => self.reconciler.start(),
                _ = &mut shutdown => {
                    tracing::info!(%role, "shutdown requested");
                    break;
                }
            };
            flow = self.perform(actions).await;
            self.board.send_replace(self.reconciler.game().snapshot());
        }

        self.link.close();
        tracing::info!(%role, phase = %self.reconciler.phase(), "peer stopped");
    }

    async fn perform(&self, actions: Vec<Action>) -> Flow {
        for action in actions {
            match action {
                Action::Publish(message) => {
                    if let Err(e) = self.link.publish(&message).await {
                        tracing::warn!(error = %e, %message, "publish failed");
                        self.disconnected(e.to_string());
                        return Flow::Stop;
                    }
                }
                Action::Notify(event) => {
                    // The UI may have gone away; the game does not depend on it.
                    let _ = self.events.send(event);
                }
                Action::Close => return Flow::Stop,
            }
        }
        Flow::Continue
    }

    fn disconnected(&self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(role = %self.reconciler.role(), %reason, "link lost");
        let _ = self.events.send(PeerEvent::Disconnected { reason });
    }
}
