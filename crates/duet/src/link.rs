//! The two-way connection between a peer and its opponent.
//!
//! A [`Link`] publishes on the peer's own endpoint and receives everything
//! the opponent publishes. Over sockets that is a [`Publisher`] plus a
//! background task pumping a [`Subscriber`] into a channel; in memory it is
//! a pair of cross-wired channels, used by tests and by embedders that run
//! both seats in one process.

use std::time::Duration;

use duet_protocol::{Message, Role, Topic};
use duet_transport::{Frame, Publisher, Subscriber, TransportError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{DuetError, PeerConfig};

/// One item handed from a subscription to its reader.
pub(crate) type Delivery = Result<Message, TransportError>;

/// Capacity of each direction of an in-memory pair.
const PAIR_CAPACITY: usize = 64;

enum Outlet {
    Socket(Publisher),
    Memory(mpsc::Sender<Delivery>),
}

/// A connection to the opponent.
pub struct Link {
    outlet: Outlet,
    incoming: mpsc::Receiver<Delivery>,
    tasks: Vec<JoinHandle<()>>,
}

impl Link {
    /// Binds this peer's publisher and starts subscribing to the opponent.
    ///
    /// Returns as soon as the publisher is bound. The subscription keeps
    /// retrying in the background until the opponent's publisher is up.
    pub async fn connect(config: &PeerConfig) -> Result<Self, DuetError> {
        let publisher = Publisher::bind(config.own_endpoint()).await?;
        let (tx, incoming) = mpsc::channel(config.channel_size);
        let pump = spawn_subscription(
            config.opponent_endpoint().to_string(),
            opponent_filters(config.role),
            config.reconnect_interval,
            tx,
        );
        tracing::info!(
            role = %config.role,
            publish = %publisher.local_addr(),
            subscribe = config.opponent_endpoint(),
            "link up"
        );

        Ok(Self {
            outlet: Outlet::Socket(publisher),
            incoming,
            tasks: vec![pump],
        })
    }

    /// Two links wired to each other in memory.
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::channel(PAIR_CAPACITY);
        let (b_tx, b_rx) = mpsc::channel(PAIR_CAPACITY);
        let a = Self {
            outlet: Outlet::Memory(b_tx),
            incoming: a_rx,
            tasks: Vec::new(),
        };
        let b = Self {
            outlet: Outlet::Memory(a_tx),
            incoming: b_rx,
            tasks: Vec::new(),
        };
        (a, b)
    }

    /// Sends a message to the opponent.
    ///
    /// Like any publish, this succeeds when nobody is listening.
    pub async fn publish(&self, message: &Message) -> Result<(), TransportError> {
        match &self.outlet {
            Outlet::Socket(publisher) => publisher.publish(&Frame::from(message)),
            Outlet::Memory(tx) => {
                if tx.send(Ok(message.clone())).await.is_err() {
                    tracing::debug!(%message, "opponent gone, message dropped");
                }
                Ok(())
            }
        }
    }

    /// Waits for the next message from the opponent.
    ///
    /// Over sockets a departed opponent shows up as
    /// [`TransportError::ConnectionClosed`]; an in-memory link returns
    /// `Ok(None)` once the other end is dropped.
    pub async fn recv(&mut self) -> Result<Option<Message>, TransportError> {
        self.incoming.recv().await.transpose()
    }

    /// Releases the transport. Taking `self` makes this happen once.
    pub fn close(self) {
        for task in &self.tasks {
            task.abort();
        }
        if let Outlet::Socket(publisher) = &self.outlet {
            publisher.close();
        }
    }
}

/// Topics a peer needs from its opponent: the opponent's moves and every
/// control topic.
fn opponent_filters(role: Role) -> Vec<String> {
    [
        Topic::Move(role.other()).as_str(),
        Topic::Ack.as_str(),
        Topic::Error.as_str(),
        Topic::End.as_str(),
        "state_",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Subscribes to `addr` and forwards every readable message to `tx`.
///
/// When the publisher goes away a `ConnectionClosed` naming `addr` is
/// forwarded; a receive error is forwarded as is. Either ends the
/// subscription.
pub(crate) fn spawn_subscription(
    addr: String,
    filters: Vec<String>,
    retry: Duration,
    tx: mpsc::Sender<Delivery>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut subscriber = Subscriber::connect(&addr, filters, retry).await;
        loop {
            match subscriber.recv().await {
                Ok(Some(frame)) => match Message::try_from(frame) {
                    Ok(message) => {
                        if tx.send(Ok(message)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(remote = %addr, error = %e, "skipping unreadable frame");
                    }
                },
                Ok(None) => {
                    tracing::info!(remote = %addr, "publisher closed");
                    let _ = tx
                        .send(Err(TransportError::ConnectionClosed(addr.clone())))
                        .await;
                    break;
                }
                Err(e) => {
                    tracing::warn!(remote = %addr, error = %e, "subscription failed");
                    let _ = tx.send(Err(e)).await;
                    break;
                }
            }
        }
        let _ = subscriber.close().await;
    })
}
