//! Game rules: pure transitions over a [`Room`].
//!
//! None of these functions log events, touch storage, or talk to clients.
//! They return what happened and leave it to the caller to record it with
//! [`add_game_event`] and broadcast it.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::numbers::generate_all_player_numbers_with;
use crate::{
    GameError, GameEvent, GameEventKind, GameStatus, PlayerId, Room,
};

/// Fewest seated players a game can start with.
pub const MIN_PLAYERS: usize = 2;

/// Most events a room keeps; older ones are dropped first.
pub const EVENT_LOG_CAPACITY: usize = 50;

// ---------------------------------------------------------------------------
// Move validation
// ---------------------------------------------------------------------------

/// Why a play was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoveRejection {
    /// The room is not in a running game.
    NotPlaying,
    /// The sender has no seat in the room.
    UnknownPlayer,
    /// The sender does not hold that number.
    NotHeld,
    /// The number is already on the timeline.
    AlreadyPlayed,
    /// Someone holds a lower number that has not been played yet.
    OutOfOrder,
}

impl MoveRejection {
    /// Returns `true` for rejections that cost the team a life.
    ///
    /// A play from outside a running game never entered the game, so only
    /// the in-game mistakes are charged.
    pub fn costs_life(self) -> bool {
        matches!(self, Self::NotHeld | Self::AlreadyPlayed | Self::OutOfOrder)
    }
}

impl fmt::Display for MoveRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotPlaying => "no game is in progress",
            Self::UnknownPlayer => "player is not seated in this room",
            Self::NotHeld => "player does not hold that number",
            Self::AlreadyPlayed => "number was already played",
            Self::OutOfOrder => "a lower number is still in someone's hand",
        };
        f.write_str(s)
    }
}

/// The result of [`make_move`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The number went onto the timeline.
    Played {
        /// Every hand is now empty and the room is in `victory`.
        victory: bool,
    },
    /// A wrong play that cost lives; nothing was appended.
    Failed {
        reason: MoveRejection,
        lives_lost: u8,
        /// Lives hit zero and the room is in `game-over`.
        game_over: bool,
    },
    /// The play was refused outright and the room was not touched.
    Rejected(MoveRejection),
}

impl MoveOutcome {
    /// The number landed on the timeline.
    pub fn success(&self) -> bool {
        matches!(self, Self::Played { .. })
    }

    /// This play emptied the last hand.
    pub fn victory(&self) -> bool {
        matches!(self, Self::Played { victory: true })
    }

    /// This play used up the last life.
    pub fn game_over(&self) -> bool {
        matches!(self, Self::Failed { game_over: true, .. })
    }

    /// Why the play did not land, whether or not it cost lives.
    pub fn error(&self) -> Option<MoveRejection> {
        match self {
            Self::Played { .. } => None,
            Self::Failed { reason, .. } | Self::Rejected(reason) => Some(*reason),
        }
    }

    /// Lives this play cost; zero unless it [`Failed`](Self::Failed).
    pub fn lives_lost(&self) -> u8 {
        match self {
            Self::Failed { lives_lost, .. } => *lives_lost,
            _ => 0,
        }
    }
}

/// The lowest number still held by anyone and not yet played.
pub fn expected_next(room: &Room) -> Option<u8> {
    room.players
        .iter()
        .flat_map(|p| p.numbers.iter().copied())
        .filter(|n| !room.timeline.contains(n))
        .min()
}

/// Checks a play without changing anything.
pub fn validate_move(
    room: &Room,
    player_id: PlayerId,
    number: u8,
) -> Result<(), MoveRejection> {
    if room.state != GameStatus::Playing {
        return Err(MoveRejection::NotPlaying);
    }
    let player = room.player(player_id).ok_or(MoveRejection::UnknownPlayer)?;
    if room.timeline.contains(&number) {
        return Err(MoveRejection::AlreadyPlayed);
    }
    if !player.holds(number) {
        return Err(MoveRejection::NotHeld);
    }
    if expected_next(room) != Some(number) {
        return Err(MoveRejection::OutOfOrder);
    }
    Ok(())
}

/// Applies a play.
///
/// A valid play moves the number from the player's hand to the timeline
/// and may finish the game as a victory. An invalid in-game play costs
/// exactly one life and may end the game. See [`MoveRejection::costs_life`]
/// for plays that are refused without cost.
pub fn make_move(room: &mut Room, player_id: PlayerId, number: u8) -> MoveOutcome {
    match validate_move(room, player_id, number) {
        Ok(()) => {
            room.timeline.push(number);
            if let Some(player) = room.player_mut(player_id) {
                player.numbers.retain(|n| *n != number);
            }
            let victory = room.players.iter().all(|p| p.numbers.is_empty());
            if victory {
                room.state = GameStatus::Victory;
            }
            MoveOutcome::Played { victory }
        }
        Err(reason) if reason.costs_life() => {
            let before = room.lives;
            room.lives = room.lives.saturating_sub(1);
            let game_over = room.lives == 0;
            if game_over {
                room.state = GameStatus::GameOver;
            }
            MoveOutcome::Failed {
                reason,
                lives_lost: before - room.lives,
                game_over,
            }
        }
        Err(reason) => MoveOutcome::Rejected(reason),
    }
}

// ---------------------------------------------------------------------------
// Lifecycle transitions
// ---------------------------------------------------------------------------

/// Deals a new game using the thread-local RNG.
pub fn start(room: &mut Room) -> Result<(), GameError> {
    start_with(room, &mut rand::rng())
}

/// Deals a new game from `rng`.
///
/// All preconditions are checked before the room is touched, so an error
/// leaves it exactly as it was.
pub fn start_with<R: Rng>(room: &mut Room, rng: &mut R) -> Result<(), GameError> {
    if room.state != GameStatus::Lobby {
        return Err(GameError::InvalidState {
            action: "start",
            state: room.state,
        });
    }
    if room.players.len() < MIN_PLAYERS {
        return Err(GameError::InsufficientPlayers {
            required: MIN_PLAYERS,
            found: room.players.len(),
        });
    }
    let hands = generate_all_player_numbers_with(
        rng,
        room.config.numbers_per_player,
        room.players.len(),
    )?;

    for (player, hand) in room.players.iter_mut().zip(hands) {
        player.numbers = hand;
    }
    room.timeline.clear();
    room.lives = room.config.max_lives;
    room.state = GameStatus::Playing;
    Ok(())
}

/// Sends the room back to the lobby from any state.
///
/// Hands, timeline and event log are cleared and lives restored. Players
/// and host are kept.
pub fn reset_game(room: &mut Room) {
    for player in &mut room.players {
        player.numbers.clear();
    }
    room.timeline.clear();
    room.events.clear();
    room.lives = room.config.max_lives;
    room.state = GameStatus::Lobby;
}

/// Appends an event, assigning it the room's next id, and trims the log to
/// [`EVENT_LOG_CAPACITY`].
pub fn add_game_event(
    room: &mut Room,
    kind: GameEventKind,
    timestamp: u64,
) -> &GameEvent {
    let id = room.next_event_id.max(1);
    room.next_event_id = id + 1;
    room.events.push_back(GameEvent {
        id,
        kind,
        timestamp,
    });
    while room.events.len() > EVENT_LOG_CAPACITY {
        room.events.pop_front();
    }
    // The push above guarantees a last element.
    &room.events[room.events.len() - 1]
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// What clients need to render a game without running the rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateView {
    pub state: GameStatus,
    pub lives: u8,
    pub max_lives: u8,
    pub numbers_per_player: u8,
    pub timeline: Vec<u8>,
    /// Percentage of dealt numbers played, rounded.
    pub progress: u8,
    /// Every number still in someone's hand, ascending.
    pub remaining_numbers: Vec<u8>,
    pub events: Vec<GameEvent>,
}

/// Builds the read-only projection of a room.
pub fn game_state(room: &Room) -> GameStateView {
    let total =
        room.players.len() * usize::from(room.config.numbers_per_player);
    let progress = if total == 0 {
        0
    } else {
        let pct = (room.timeline.len() as f64 * 100.0 / total as f64).round();
        pct.min(100.0) as u8
    };

    let mut remaining_numbers: Vec<u8> = room
        .players
        .iter()
        .flat_map(|p| p.numbers.iter().copied())
        .filter(|n| !room.timeline.contains(n))
        .collect();
    remaining_numbers.sort_unstable();

    GameStateView {
        state: room.state,
        lives: room.lives,
        max_lives: room.config.max_lives,
        numbers_per_player: room.config.numbers_per_player,
        timeline: room.timeline.clone(),
        progress,
        remaining_numbers,
        events: room.events.iter().cloned().collect(),
    }
}
