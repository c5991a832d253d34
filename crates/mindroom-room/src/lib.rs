//! Room coordination for Mindroom.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns the
//! authoritative copy of its [`Room`](mindroom_game::Room). Every mutating
//! operation on a room is a command on that actor's channel, so operations
//! on one room apply one at a time while different rooms run independently.
//!
//! A command is applied to a working copy, persisted through the
//! [`RoomStore`], and only then committed and broadcast. A failed write
//! leaves the actor's copy equal to what is stored.
//!
//! # Key types
//!
//! - [`RoomStore`]: the persistence boundary; [`InMemoryStore`] ships
//! - [`RoomManager`]: creates rooms, routes connections, reaps empty rooms
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomLimits`]: bounds on room configuration and size

#![allow(async_fn_in_trait)]

mod config;
mod error;
mod lifecycle;
mod manager;
mod room;
mod store;

pub use config::RoomLimits;
pub use error::{RoomError, StoreError};
pub use lifecycle::{JoinOutcome, LeaveOutcome};
pub use manager::{DEFAULT_CHANNEL_SIZE, RoomManager};
pub use room::{PlayerSender, RoomHandle};
pub use store::{InMemoryStore, RoomStore};

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, used for event and creation stamps.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
