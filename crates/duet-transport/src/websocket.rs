//! WebSocket pub/sub implementation using `tokio-tungstenite`.
//!
//! The [`Publisher`] owns a listener. Every accepted connection becomes a
//! subscriber and gets its own task that forwards each published frame.
//! The [`Subscriber`] dials a publisher and filters frames by topic.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{Frame, TransportError};

/// How many frames a slow subscriber may fall behind before it starts
/// missing frames.
const FANOUT_CAPACITY: usize = 256;

type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The publishing half of a peer: binds an address and fans every frame
/// out to all connected subscribers.
pub struct Publisher {
    local_addr: SocketAddr,
    frames: broadcast::Sender<Vec<u8>>,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl Publisher {
    /// Binds a publisher to the given address and starts accepting
    /// subscribers in the background.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        let local_addr = listener.local_addr().map_err(TransportError::BindFailed)?;
        tracing::info!(%local_addr, "publisher listening");

        let (frames, _) = broadcast::channel(FANOUT_CAPACITY);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(accept_loop(listener, frames.clone(), shutdown_rx));

        Ok(Self {
            local_addr,
            frames,
            shutdown,
            accept_task,
        })
    }

    /// Returns the address the publisher is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of subscribers currently attached.
    pub fn subscriber_count(&self) -> usize {
        self.frames.receiver_count()
    }

    /// Publishes a frame to every connected subscriber.
    ///
    /// With no subscriber attached the frame is dropped and `Ok` is
    /// returned.
    pub fn publish(&self, frame: &Frame) -> Result<(), TransportError> {
        if *self.shutdown.borrow() {
            return Err(TransportError::Shutdown);
        }
        let bytes = frame.encode()?;
        if self.frames.send(bytes).is_err() {
            tracing::debug!(topic = %frame.topic, "no subscribers, frame dropped");
        }
        Ok(())
    }

    /// Stops accepting subscribers and closes every subscriber connection.
    pub fn close(&self) {
        if !self.shutdown.send_replace(true) {
            tracing::info!(local_addr = %self.local_addr, "publisher closed");
        }
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
        self.accept_task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    frames: broadcast::Sender<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    // Subscribe before the handshake so nothing published
                    // after `connect` returns on the other side is missed.
                    let rx = frames.subscribe();
                    tokio::spawn(serve_subscriber(stream, addr, rx, shutdown.clone()));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            },
            _ = shutdown.changed() => break,
        }
    }
}

async fn serve_subscriber(
    stream: TcpStream,
    addr: SocketAddr,
    mut frames: broadcast::Receiver<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::debug!(%addr, error = %e, "subscriber handshake failed");
            return;
        }
    };
    tracing::debug!(%addr, "subscriber attached");

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Ok(bytes) => {
                    if let Err(e) = ws.send(Message::Binary(bytes.into())).await {
                        tracing::debug!(%addr, error = %e, "subscriber send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(%addr, missed, "subscriber lagged, frames dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = ws.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                    tracing::debug!(%addr, "subscriber detached");
                    return;
                }
                Some(Ok(_)) => continue,
            },
            _ = shutdown.changed() => {
                // Flush what was published before `close`, so a final
                // end-of-game frame is not lost to the shutdown race.
                while let Ok(bytes) = frames.try_recv() {
                    if ws.send(Message::Binary(bytes.into())).await.is_err() {
                        break;
                    }
                }
                break;
            }
        }
    }

    let _ = ws.close(None).await;
}

/// The subscribing half of a peer: one connection to a remote publisher.
pub struct Subscriber {
    remote: String,
    filters: Vec<String>,
    ws: ClientStream,
}

impl Subscriber {
    /// Connects to a publisher, retrying every `retry` until it is
    /// reachable.
    ///
    /// This never gives up on its own. Wrap it in `tokio::time::timeout`
    /// or race it against a shutdown signal to bound the wait.
    pub async fn connect(addr: &str, filters: Vec<String>, retry: Duration) -> Self {
        let url = format!("ws://{addr}");
        loop {
            match tokio_tungstenite::connect_async(&url).await {
                Ok((ws, _)) => {
                    tracing::info!(remote = addr, "subscribed");
                    return Self {
                        remote: addr.to_string(),
                        filters,
                        ws,
                    };
                }
                Err(e) => {
                    tracing::trace!(remote = addr, error = %e, "publisher not reachable yet");
                    tokio::time::sleep(retry).await;
                }
            }
        }
    }

    /// Returns the address of the publisher this subscriber is attached to.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Receives the next frame matching this subscriber's filters.
    ///
    /// Returns `Ok(None)` when the publisher closes the connection.
    pub async fn recv(&mut self) -> Result<Option<Frame>, TransportError> {
        loop {
            let data = match self.ws.next().await {
                Some(Ok(Message::Binary(data))) => data.to_vec(),
                Some(Ok(Message::Text(text))) => text.as_bytes().to_vec(),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            };
            let frame = Frame::decode(&data)?;
            if frame.matches(&self.filters) {
                return Ok(Some(frame));
            }
        }
    }

    /// Closes the connection to the publisher.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.ws.close(None).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
        })
    }
}
