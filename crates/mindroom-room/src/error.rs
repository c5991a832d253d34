//! Error types for the room layer.

use mindroom_game::{GameError, MoveRejection, PlayerId, RoomCode};

/// Errors raised by a [`RoomStore`](crate::RoomStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No row exists for this code.
    #[error("room {0} not found in store")]
    NotFound(RoomCode),

    /// A row already exists for this code.
    #[error("room {0} already exists in store")]
    Conflict(RoomCode),

    /// A stored blob could not be encoded or decoded.
    #[error("stored room data is corrupt: {0}")]
    Codec(#[from] serde_json::Error),

    /// The backing store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur during room operations.
///
/// Everything except [`RoomError::Storage`] and [`RoomError::Unavailable`]
/// is a precondition failure: the room was not touched and only the
/// requester hears about it.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room {0} not found")]
    NotFound(RoomCode),

    #[error("player {0} is not in room {1}")]
    NotInRoom(PlayerId, RoomCode),

    /// The connection already holds a seat in another room.
    #[error("player {0} is already in room {1}")]
    AlreadyInRoom(PlayerId, RoomCode),

    #[error("room {0} has a game in progress")]
    GameInProgress(RoomCode),

    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// The action is reserved for the room's host.
    #[error("only the host can {0}")]
    NotHost(&'static str),

    /// Room settings outside the server's limits.
    #[error("invalid room configuration: {0}")]
    InvalidConfig(String),

    /// A move that never entered the game (no life is charged).
    #[error("move rejected: {0}")]
    MoveRejected(MoveRejection),

    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    /// The room's actor has stopped or its channel closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}

impl RoomError {
    /// The text sent to the client in an `error` message.
    ///
    /// Storage details stay in the server log.
    pub fn client_message(&self) -> String {
        match self {
            Self::Storage(_) => "internal error, please retry".to_string(),
            other => other.to_string(),
        }
    }
}
