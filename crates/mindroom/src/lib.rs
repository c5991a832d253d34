//! # Mindroom
//!
//! Real-time server for a cooperative party game: every player is dealt
//! secret numbers and the team must play them onto a shared timeline in
//! ascending order, without talking, before it runs out of lives.
//!
//! The server is authoritative. Clients send named requests over a
//! WebSocket (`join-room`, `play-number`, ...); every room runs as its own
//! actor, persists each change through a [`RoomStore`](mindroom_room::RoomStore),
//! and broadcasts the new state to everyone seated.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mindroom::prelude::*;
//!
//! # async fn start() -> Result<(), MindroomError> {
//! let server = MindroomServerBuilder::new()
//!     .config(ServerConfig::from_env()?)
//!     .build(InMemoryStore::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{
    ConfigError, ENV_BIND_ADDR, ENV_EMPTY_ROOM_TTL_SECS, ENV_IDLE_TIMEOUT_SECS,
    ENV_MAX_PLAYERS, ENV_ROOM_CHANNEL_SIZE, ServerConfig,
};
pub use error::MindroomError;
pub use server::{MindroomServer, MindroomServerBuilder};

/// Everything needed to run a server or talk to one from Rust.
pub mod prelude {
    pub use crate::{ConfigError, MindroomError, MindroomServer, MindroomServerBuilder, ServerConfig};
    pub use mindroom_game::{
        GameEvent, GameEventKind, GameResult, GameStateView, GameStatus, MoveOutcome,
        MoveRejection, Player, PlayerId, Room, RoomCode, RoomConfig, RoomSummary,
    };
    pub use mindroom_protocol::{ClientMessage, Codec, Envelope, JsonCodec, ServerMessage};
    pub use mindroom_room::{InMemoryStore, RoomError, RoomLimits, RoomManager, RoomStore, StoreError};
}
