//! Wire protocol for Mindroom.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Messages** ([`ClientMessage`], [`ServerMessage`]): named events with
//!   a structured payload, e.g. `play-number {roomId, number}`.
//! - **Envelope** ([`Envelope`]): the frame every message travels in,
//!   stamped with a per-connection sequence number.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, messages out.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope<ClientMessage>) → Room layer
//! Room layer → Protocol (Envelope<ServerMessage>) → Transport (bytes)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{ClientMessage, Envelope, Recipient, ServerMessage};

// Domain types that appear in message payloads.
pub use mindroom_game::{
    GameStateView, PlayerId, Room, RoomCode, RoomConfig, RoomSummary,
};
