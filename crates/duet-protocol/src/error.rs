//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means a message could not be understood. It
//! never means a move was illegal; that is the game layer's business.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization of a structured payload failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization of a structured payload failed.
    ///
    /// Common causes: malformed JSON, missing fields, or a cell value
    /// that is neither empty nor a role mark.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame's topic is not one peers exchange.
    #[error("unknown topic: {0:?}")]
    UnknownTopic(String),

    /// A move payload is not `row,col`.
    ///
    /// The display text is sent verbatim to whoever typed the move, so it
    /// reads as an instruction rather than a diagnostic.
    #[error("The format is not correct, use (row,col)")]
    Format { input: String },

    /// The message is well-formed but makes no sense here, e.g. an
    /// unknown role mark or a non-UTF-8 payload.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
