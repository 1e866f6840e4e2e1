//! Publish/subscribe transport for Duet.
//!
//! A peer publishes [`Frame`]s on its own endpoint and subscribes to the
//! endpoint of its opponent. Every frame carries a topic; subscribers only
//! see frames whose topic matches one of their filters.
//!
//! Delivery is reliable and ordered per subscription, but a frame published
//! while nobody is subscribed is dropped. That is the usual pub/sub contract
//! and the layers above rely on it.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{Publisher, Subscriber};

/// Longest topic a frame can carry. The length is encoded in one byte.
pub const MAX_TOPIC_LEN: usize = u8::MAX as usize;

/// A single published message: a topic and an opaque payload.
///
/// On the wire a frame is `[topic_len: u8][topic bytes][payload bytes]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Creates a frame.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Encodes the frame into its wire form.
    pub fn encode(&self) -> Result<Vec<u8>, TransportError> {
        let topic = self.topic.as_bytes();
        if topic.len() > MAX_TOPIC_LEN {
            return Err(TransportError::InvalidFrame(format!(
                "topic is {} bytes, max is {MAX_TOPIC_LEN}",
                topic.len()
            )));
        }
        let mut out = Vec::with_capacity(1 + topic.len() + self.payload.len());
        out.push(topic.len() as u8);
        out.extend_from_slice(topic);
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Parses a frame from its wire form.
    pub fn decode(data: &[u8]) -> Result<Self, TransportError> {
        let (&len, rest) = data
            .split_first()
            .ok_or_else(|| TransportError::InvalidFrame("empty frame".into()))?;
        let len = len as usize;
        if rest.len() < len {
            return Err(TransportError::InvalidFrame(format!(
                "topic length {len} exceeds frame size {}",
                rest.len()
            )));
        }
        let (topic, payload) = rest.split_at(len);
        let topic = std::str::from_utf8(topic)
            .map_err(|e| TransportError::InvalidFrame(format!("topic is not UTF-8: {e}")))?;
        Ok(Self::new(topic, payload))
    }

    /// Returns `true` if the topic starts with any of `filters`.
    ///
    /// An empty filter list, or an empty filter, matches every topic.
    pub fn matches(&self, filters: &[String]) -> bool {
        filters.is_empty() || filters.iter().any(|f| self.topic.starts_with(f.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_wire_layout() {
        let frame = Frame::new("ok", "1,2");
        assert_eq!(frame.encode().unwrap(), b"\x02ok1,2".to_vec());
    }

    #[test]
    fn test_frame_decode_with_empty_payload() {
        let frame = Frame::decode(b"\x0dstate_request").unwrap();
        assert_eq!(frame.topic, "state_request");
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_frame_decode_rejects_empty_input() {
        assert!(matches!(
            Frame::decode(b""),
            Err(TransportError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_frame_decode_rejects_truncated_topic() {
        let err = Frame::decode(b"\x09end").unwrap_err();
        assert!(err.to_string().contains("exceeds frame size"));
    }

    #[test]
    fn test_frame_encode_rejects_long_topic() {
        let frame = Frame::new("t".repeat(MAX_TOPIC_LEN + 1), "");
        assert!(frame.encode().is_err());
    }

    #[test]
    fn test_frame_matches_prefix_filters() {
        let frame = Frame::new("state_response", "{}");
        assert!(frame.matches(&[]));
        assert!(frame.matches(&["state".to_string()]));
        assert!(frame.matches(&["X".to_string(), "state_response".to_string()]));
        assert!(!frame.matches(&["X".to_string(), "O".to_string()]));
        assert!(frame.matches(&[String::new()]));
    }
}
