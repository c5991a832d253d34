//! Seating rules: who may join, who is host, and when a room dies.
//!
//! These are plain functions over a [`Room`] so the actor can apply them to
//! a working copy and throw the copy away if persisting fails.

use mindroom_game::rules::add_game_event;
use mindroom_game::{GameEventKind, GameResult, GameStatus, Player, PlayerId, Room};

use crate::RoomError;

/// What a join did to the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// A new seat was appended.
    Seated { host_changed: bool },
    /// The player already held a seat; nothing changed.
    AlreadySeated,
}

/// What a leave did to the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The room lives on without the player.
    Remained {
        host_changed: bool,
        /// The departure emptied the last hands and ended the game.
        game_ended: bool,
    },
    /// The room must be destroyed. `evicted` are the players still seated
    /// when it went down.
    Destroyed {
        evicted: Vec<PlayerId>,
        reason: &'static str,
    },
}

pub(crate) const REASON_HOST_LEFT: &str = "the host left the room";
pub(crate) const REASON_EMPTY: &str = "everyone left the room";

/// Seats `id` under `name`.
///
/// Rejoining with a seated id is a no-op. New seats are refused while a
/// game is being played or when the room is full. The first seat, or any
/// seat taken with `host_intent`, becomes host.
pub fn seat_player(
    room: &mut Room,
    id: PlayerId,
    name: &str,
    host_intent: bool,
    max_players: usize,
) -> Result<JoinOutcome, RoomError> {
    if room.is_seated(id) {
        return Ok(JoinOutcome::AlreadySeated);
    }
    if room.state == GameStatus::Playing {
        return Err(RoomError::GameInProgress(room.id.clone()));
    }
    if room.players.len() >= max_players {
        return Err(RoomError::RoomFull(room.id.clone()));
    }

    let name = match name.trim() {
        "" => format!("Player {}", id.0),
        trimmed => trimmed.to_string(),
    };
    room.players.push(Player::new(id, name));

    let host_changed = room.host_id.is_none() || host_intent;
    if host_changed {
        room.host_id = Some(id);
    }
    Ok(JoinOutcome::Seated { host_changed })
}

/// Removes `id`'s seat, migrating the host or ending the room as needed.
///
/// `timestamp` stamps the `game-ended` event when the departure completes
/// a game.
pub fn remove_player(
    room: &mut Room,
    id: PlayerId,
    timestamp: u64,
) -> Result<LeaveOutcome, RoomError> {
    let Some(seat) = room.players.iter().position(|p| p.id == id) else {
        return Err(RoomError::NotInRoom(id, room.id.clone()));
    };
    let was_host = room.is_host(id);
    room.players.remove(seat);

    if was_host && room.state == GameStatus::Lobby {
        let evicted = room.players.drain(..).map(|p| p.id).collect();
        room.host_id = None;
        return Ok(LeaveOutcome::Destroyed { evicted, reason: REASON_HOST_LEFT });
    }
    if room.players.is_empty() {
        room.host_id = None;
        return Ok(LeaveOutcome::Destroyed { evicted: Vec::new(), reason: REASON_EMPTY });
    }

    let host_changed = was_host;
    if was_host {
        room.host_id = room.players.first().map(|p| p.id);
    }

    // Nobody left holds a number, so no move can ever finish the game.
    let game_ended = room.state == GameStatus::Playing
        && room.players.iter().all(|p| p.numbers.is_empty());
    if game_ended {
        room.state = GameStatus::Victory;
        add_game_event(room, GameEventKind::GameEnded { result: GameResult::Victory }, timestamp);
    }

    Ok(LeaveOutcome::Remained { host_changed, game_ended })
}
