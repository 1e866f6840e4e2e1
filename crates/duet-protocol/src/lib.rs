//! Wire protocol for Duet.
//!
//! This crate defines what two peers say to each other:
//!
//! - **Types** ([`Role`], [`Topic`], [`Message`], [`Coord`], [`Outcome`]):
//!   the topic/payload pairs that travel between peers, and how their
//!   UTF-8 payloads are written and parsed.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how structured payloads
//!   (the state snapshot) are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while parsing.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (topic frames) and the
//! reconciliation logic (game state). It knows nothing about sockets or
//! boards, only about messages.
//!
//! ```text
//! Transport (Frame) → Protocol (Message) → Reconciler (GameState)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{Coord, Message, Outcome, Role, RoleMap, Topic};
