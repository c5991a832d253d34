//! The room data model: players, lifecycle state, and the event log.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{MoveRejection, PlayerId, RoomCode};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Per-room game settings chosen at creation time.
///
/// Bounds are enforced by the room layer before a room is created; the
/// rules in this crate only assume the values fit in the number range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomConfig {
    /// Lives the team starts each game with.
    pub max_lives: u8,

    /// How many numbers each player is dealt on start.
    pub numbers_per_player: u8,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_lives: 3,
            numbers_per_player: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// GameStatus
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
/// Lobby → Playing → GameOver | Victory
///   ↑________________________|  (reset)
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum GameStatus {
    /// Players gather; the host may start.
    #[default]
    Lobby,
    /// Numbers are dealt and moves are accepted.
    Playing,
    /// The team ran out of lives.
    GameOver,
    /// Every dealt number was played in order.
    Victory,
}

impl GameStatus {
    /// Returns `true` once a game has ended, won or lost.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::GameOver | Self::Victory)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Lobby => "lobby",
            Self::Playing => "playing",
            Self::GameOver => "game-over",
            Self::Victory => "victory",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A seated player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Seat identity, taken from the player's connection.
    pub id: PlayerId,
    /// Display name chosen on join.
    pub name: String,
    /// Numbers dealt to this player and not yet played, ascending.
    pub numbers: Vec<u8>,
}

impl Player {
    /// Creates a player with an empty hand.
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            numbers: Vec::new(),
        }
    }

    /// Returns `true` if `number` is still in this player's hand.
    pub fn holds(&self, number: u8) -> bool {
        self.numbers.contains(&number)
    }
}

// ---------------------------------------------------------------------------
// GameEvent
// ---------------------------------------------------------------------------

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameResult {
    Victory,
    GameOver,
}

/// What happened, with the fields specific to each kind of event.
///
/// Serialized adjacently tagged, so a log entry reads
/// `{"id": 4, "type": "move-made", "data": {...}, "timestamp": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum GameEventKind {
    /// A number was played in order.
    #[serde(rename_all = "camelCase")]
    MoveMade {
        player_id: PlayerId,
        player_name: String,
        number: u8,
    },

    /// A play was wrong and cost the team a life.
    #[serde(rename_all = "camelCase")]
    MoveFailed {
        player_id: PlayerId,
        player_name: String,
        number: u8,
        reason: MoveRejection,
        lives_remaining: u8,
    },

    /// The host started a game and numbers were dealt.
    #[serde(rename_all = "camelCase")]
    GameStarted { player_count: usize },

    /// The game reached victory or game-over.
    GameEnded { result: GameResult },

    /// The host sent the room back to the lobby.
    GameReset,
}

/// One immutable entry in a room's event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Unique within the room, increasing in log order.
    pub id: u64,
    #[serde(flatten)]
    pub kind: GameEventKind,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// The authoritative state of one game instance.
///
/// Fields are public so the persistence layer can take a room apart and put
/// it back together; all mutation during play goes through [`crate::rules`]
/// and the room layer, which keep the invariants:
///
/// - `host_id`, when set, names a seated player
/// - `timeline` is strictly increasing and never shrinks while playing
/// - `lives` never goes below zero, and zero means [`GameStatus::GameOver`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// The room code, fixed at creation.
    pub id: RoomCode,
    /// Seated players in join order.
    pub players: Vec<Player>,
    /// Numbers successfully played this game, in play order.
    pub timeline: Vec<u8>,
    /// Lives left for the current game.
    pub lives: u8,
    pub config: RoomConfig,
    pub state: GameStatus,
    /// The player allowed to start and reset; `None` before the first join.
    pub host_id: Option<PlayerId>,
    /// The most recent events, oldest first.
    pub events: VecDeque<GameEvent>,
    /// Id handed to the next logged event.
    #[serde(default)]
    pub next_event_id: u64,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: u64,
}

impl Room {
    /// Creates an empty room in the lobby with a full set of lives.
    pub fn new(id: RoomCode, config: RoomConfig, created_at: u64) -> Self {
        Self {
            id,
            players: Vec::new(),
            timeline: Vec::new(),
            lives: config.max_lives,
            config,
            state: GameStatus::Lobby,
            host_id: None,
            events: VecDeque::new(),
            next_event_id: 1,
            created_at,
        }
    }

    /// Looks up a seated player.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Looks up a seated player for mutation.
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// Returns `true` if `id` holds a seat in this room.
    pub fn is_seated(&self, id: PlayerId) -> bool {
        self.player(id).is_some()
    }

    /// Returns `true` if `id` is the current host.
    pub fn is_host(&self, id: PlayerId) -> bool {
        self.host_id == Some(id)
    }

    /// Returns `true` when nobody is seated.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// A compact listing entry for this room.
    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            player_count: self.players.len(),
            state: self.state,
        }
    }
}

/// A room as it appears in room listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: RoomCode,
    pub player_count: usize,
    pub state: GameStatus,
}
