//! Game core for Mindroom.
//!
//! Everything in this crate is pure: no I/O, no clocks, no channels. The
//! room layer owns a [`Room`] per game and drives it through the functions
//! in [`rules`]; this crate only decides what a transition does.
//!
//! # Key types
//!
//! - [`Room`]: the authoritative state of one game instance
//! - [`Player`]: a seat in a room, holding its unplayed numbers
//! - [`GameEvent`]: one entry of the bounded per-room event log
//! - [`MoveOutcome`]: what a `play-number` did to the room
//! - [`GameStateView`]: the read-only projection sent to clients
//!
//! ```text
//! lobby ──start──→ playing ──all hands empty──→ victory
//!   ↑                 │
//!   │                 └──lives reach 0──→ game-over
//!   └─────────────reset (from any state)──────┘
//! ```

mod error;
mod ids;
pub mod numbers;
mod room;
pub mod rules;

pub use error::GameError;
pub use ids::{PlayerId, RoomCode, ROOM_CODE_ALPHABET, ROOM_CODE_LEN};
pub use room::{
    GameEvent, GameEventKind, GameResult, GameStatus, Player, Room,
    RoomConfig, RoomSummary,
};
pub use rules::{GameStateView, MoveOutcome, MoveRejection};
