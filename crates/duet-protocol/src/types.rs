//! Core protocol types for Duet's wire format.
//!
//! Every message two peers exchange is a `(topic, payload)` pair of UTF-8
//! strings. This module defines the closed set of topics, the payload
//! grammars, and conversions to and from transport frames.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use duet_transport::Frame;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// One of the two seats at the board.
///
/// A peer picks its role once at startup. The role's mark doubles as the
/// topic the peer publishes its moves on, so `X` moves travel on topic `"X"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    X,
    O,
}

impl Role {
    /// Both roles, in registry order.
    pub const ALL: [Role; 2] = [Role::X, Role::O];

    /// The role whose move a fresh game accepts first.
    pub const STARTING: Role = Role::X;

    /// The opposing role.
    pub fn other(self) -> Self {
        match self {
            Self::X => Self::O,
            Self::O => Self::X,
        }
    }

    /// The mark written on the board and used as the move topic.
    pub fn mark(self) -> &'static str {
        match self {
            Self::X => "X",
            Self::O => "O",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::O => 1,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mark())
    }
}

impl FromStr for Role {
    type Err = ProtocolError;

    /// Accepts `X` or `O` in either case, ignoring surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "X" | "x" => Ok(Self::X),
            "O" | "o" => Ok(Self::O),
            other => Err(ProtocolError::InvalidMessage(format!(
                "unknown role {other:?}, expected 'X' or 'O'"
            ))),
        }
    }
}

/// A fixed two-slot registry indexed by [`Role`].
///
/// With exactly two participants there is no need for a map; indexing is a
/// plain array access.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMap<T>([T; 2]);

impl<T> RoleMap<T> {
    /// Creates a registry from the `X` and `O` entries.
    pub fn new(x: T, o: T) -> Self {
        Self([x, o])
    }

    /// Iterates `(role, entry)` pairs in registry order.
    pub fn iter(&self) -> impl Iterator<Item = (Role, &T)> {
        Role::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T> Index<Role> for RoleMap<T> {
    type Output = T;

    fn index(&self, role: Role) -> &T {
        &self.0[role.index()]
    }
}

impl<T> IndexMut<Role> for RoleMap<T> {
    fn index_mut(&mut self, role: Role) -> &mut T {
        &mut self.0[role.index()]
    }
}

// ---------------------------------------------------------------------------
// Coord
// ---------------------------------------------------------------------------

/// A zero-based `(row, col)` board position as written in move payloads.
///
/// Coordinates are signed so that `"-1,0"` parses and is then rejected as
/// out of bounds by the game, instead of being lumped in with garbage input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub row: i32,
    pub col: i32,
}

impl Coord {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.row, self.col)
    }
}

impl FromStr for Coord {
    type Err = ProtocolError;

    /// Parses `row,col`. Whitespace around either number and one pair of
    /// surrounding parentheses are tolerated, since that is how the
    /// prompt spells it.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format_err = || ProtocolError::Format {
            input: s.to_string(),
        };

        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .unwrap_or(trimmed);

        let (row, col) = inner.split_once(',').ok_or_else(format_err)?;
        let row = row.trim().parse().map_err(|_| format_err())?;
        let col = col.trim().parse().map_err(|_| format_err())?;
        Ok(Self { row, col })
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Winner(Role),
    Draw,
}

impl Outcome {
    /// The literal end-of-game payload for a draw.
    pub const DRAW: &'static str = "Draw";
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Winner(role) => f.write_str(role.mark()),
            Self::Draw => f.write_str(Self::DRAW),
        }
    }
}

impl FromStr for Outcome {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case(Self::DRAW) {
            return Ok(Self::Draw);
        }
        s.parse().map(Self::Winner)
    }
}

// ---------------------------------------------------------------------------
// Topic
// ---------------------------------------------------------------------------

/// What a message is about. The closed set of topics peers exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// A move by the given role. Payload: `row,col`.
    Move(Role),
    /// The opponent accepted a move. Payload: the same `row,col`.
    Ack,
    /// A move was refused. Payload: a human-readable reason.
    Error,
    /// The game is over. Payload: `Draw` or the winner's mark.
    End,
    /// A (re)joining peer asks for the board. Payload: the asker's mark.
    StateRequest,
    /// Reply to [`Topic::StateRequest`]. Payload: an encoded snapshot.
    StateResponse,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Move(role) => role.mark(),
            Self::Ack => "ok",
            Self::Error => "error",
            Self::End => "end",
            Self::StateRequest => "state_request",
            Self::StateResponse => "state_response",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "X" => Ok(Self::Move(Role::X)),
            "O" => Ok(Self::Move(Role::O)),
            "ok" => Ok(Self::Ack),
            "error" => Ok(Self::Error),
            "end" => Ok(Self::End),
            "state_request" => Ok(Self::StateRequest),
            "state_response" => Ok(Self::StateResponse),
            other => Err(ProtocolError::UnknownTopic(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A topic and its UTF-8 payload. Transient: built, sent, dispatched, and
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: Topic,
    pub payload: String,
}

impl Message {
    pub fn new(topic: Topic, payload: impl Into<String>) -> Self {
        Self {
            topic,
            payload: payload.into(),
        }
    }

    /// A move by `role` at `coord`.
    pub fn play(role: Role, coord: Coord) -> Self {
        Self::new(Topic::Move(role), coord.to_string())
    }

    /// Acknowledges the move at `coord`.
    pub fn ack(coord: Coord) -> Self {
        Self::new(Topic::Ack, coord.to_string())
    }

    /// Refuses a move with a reason the other side will display.
    pub fn error(reason: impl fmt::Display) -> Self {
        Self::new(Topic::Error, reason.to_string())
    }

    pub fn end(outcome: Outcome) -> Self {
        Self::new(Topic::End, outcome.to_string())
    }

    pub fn state_request(asker: Role) -> Self {
        Self::new(Topic::StateRequest, asker.mark())
    }

    pub fn state_response(encoded: impl Into<String>) -> Self {
        Self::new(Topic::StateResponse, encoded)
    }

    /// Parses the payload as a `row,col` coordinate.
    pub fn coord(&self) -> Result<Coord, ProtocolError> {
        self.payload.parse()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.topic, self.payload)
    }
}

impl From<&Message> for Frame {
    fn from(msg: &Message) -> Self {
        Frame::new(msg.topic.as_str(), msg.payload.as_bytes())
    }
}

impl TryFrom<Frame> for Message {
    type Error = ProtocolError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let topic = frame.topic.parse()?;
        let payload = String::from_utf8(frame.payload)
            .map_err(|e| ProtocolError::InvalidMessage(format!("payload is not UTF-8: {e}")))?;
        Ok(Self { topic, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_other_is_involution() {
        for role in Role::ALL {
            assert_ne!(role.other(), role);
            assert_eq!(role.other().other(), role);
        }
    }

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!(" x ".parse::<Role>().unwrap(), Role::X);
        assert_eq!("O".parse::<Role>().unwrap(), Role::O);
        assert!("Z".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_map_indexing() {
        let mut map = RoleMap::new("127.0.0.1:5555", "127.0.0.1:5556");
        assert_eq!(map[Role::X], "127.0.0.1:5555");
        assert_eq!(map[Role::O], "127.0.0.1:5556");
        map[Role::O] = "10.0.0.2:7000";
        let pairs: Vec<_> = map.iter().collect();
        assert_eq!(
            pairs,
            vec![(Role::X, &"127.0.0.1:5555"), (Role::O, &"10.0.0.2:7000")]
        );
    }

    #[test]
    fn test_coord_parse_plain_and_decorated() {
        assert_eq!("0,2".parse::<Coord>().unwrap(), Coord::new(0, 2));
        assert_eq!(" 1 , 1 ".parse::<Coord>().unwrap(), Coord::new(1, 1));
        assert_eq!("(2,0)".parse::<Coord>().unwrap(), Coord::new(2, 0));
        assert_eq!("-1,5".parse::<Coord>().unwrap(), Coord::new(-1, 5));
    }

    #[test]
    fn test_coord_parse_rejects_garbage() {
        for input in ["abc", "", "1", "1,", ",1", "1,2,3", "a,b", "1;2"] {
            let err = input.parse::<Coord>().unwrap_err();
            assert!(
                matches!(err, ProtocolError::Format { .. }),
                "{input:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_format_error_text_is_user_facing() {
        let err = "abc".parse::<Coord>().unwrap_err();
        assert_eq!(err.to_string(), "The format is not correct, use (row,col)");
    }

    #[test]
    fn test_outcome_payloads() {
        assert_eq!(Outcome::Draw.to_string(), "Draw");
        assert_eq!(Outcome::Winner(Role::O).to_string(), "O");
        assert_eq!("Draw".parse::<Outcome>().unwrap(), Outcome::Draw);
        assert_eq!("X".parse::<Outcome>().unwrap(), Outcome::Winner(Role::X));
        assert!("nobody".parse::<Outcome>().is_err());
    }

    #[test]
    fn test_topic_strings_are_stable() {
        let topics = [
            (Topic::Move(Role::X), "X"),
            (Topic::Move(Role::O), "O"),
            (Topic::Ack, "ok"),
            (Topic::Error, "error"),
            (Topic::End, "end"),
            (Topic::StateRequest, "state_request"),
            (Topic::StateResponse, "state_response"),
        ];
        for (topic, wire) in topics {
            assert_eq!(topic.as_str(), wire);
            assert_eq!(wire.parse::<Topic>().unwrap(), topic);
        }
        assert!(matches!(
            "chat".parse::<Topic>(),
            Err(ProtocolError::UnknownTopic(t)) if t == "chat"
        ));
    }

    #[test]
    fn test_message_to_frame_and_back() {
        let msg = Message::play(Role::O, Coord::new(2, 1));
        let frame = Frame::from(&msg);
        assert_eq!(frame.topic, "O");
        assert_eq!(frame.payload, b"2,1");
        assert_eq!(Message::try_from(frame).unwrap(), msg);
    }

    #[test]
    fn test_frame_with_bad_payload_is_invalid() {
        let frame = Frame::new("error", vec![0xff, 0xfe]);
        assert!(matches!(
            Message::try_from(frame),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::state_request(Role::O).payload, "O");
        assert_eq!(Message::end(Outcome::Draw).payload, "Draw");
        assert_eq!(Message::ack(Coord::new(0, 0)).to_string(), "[ok] 0,0");
        assert_eq!(
            Message::play(Role::X, Coord::new(1, 2)).coord().unwrap(),
            Coord::new(1, 2)
        );
    }
}
