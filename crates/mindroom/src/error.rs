//! Unified error type for the Mindroom server.

use mindroom_game::GameError;
use mindroom_protocol::ProtocolError;
use mindroom_room::{RoomError, StoreError};
use mindroom_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps every crate-specific error.
///
/// `?` converts sub-crate errors automatically through the `#[from]`
/// impls, so server code only ever returns this one type.
#[derive(Debug, thiserror::Error)]
pub enum MindroomError {
    /// Connection, send, or receive failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room operation was refused or could not be persisted.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Bad server configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<StoreError> for MindroomError {
    fn from(err: StoreError) -> Self {
        Self::Room(err.into())
    }
}

impl From<GameError> for MindroomError {
    fn from(err: GameError) -> Self {
        Self::Room(err.into())
    }
}
