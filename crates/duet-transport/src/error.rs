/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The remote side closed the connection.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding the publisher socket failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// A frame could not be built or parsed.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}
