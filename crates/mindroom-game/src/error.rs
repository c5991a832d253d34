//! Error types for the game core.

use crate::GameStatus;

/// Errors raised by game rules before any state is touched.
///
/// Every variant is recoverable: the room is left exactly as it was and the
/// caller reports the problem to whoever asked for the transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// Not enough players are seated to deal a game.
    #[error("at least {required} players are needed to start, found {found}")]
    InsufficientPlayers { required: usize, found: usize },

    /// The configured hands do not fit in the number range.
    #[error("{requested} numbers requested but only {available} are available")]
    CapacityExceeded { requested: usize, available: usize },

    /// The room's lifecycle state does not allow this transition.
    #[error("cannot {action} while the game is {state}")]
    InvalidState {
        action: &'static str,
        state: GameStatus,
    },

    /// A room code that does not match the code alphabet or length.
    #[error("invalid room code {0:?}")]
    InvalidRoomCode(String),
}
