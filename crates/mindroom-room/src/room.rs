//! Room actor: an isolated Tokio task that owns one room.
//!
//! The actor is the only writer of its room. Commands arrive on a bounded
//! channel and are applied one at a time; while a store write is pending
//! the next command waits in the channel, so no operation ever observes
//! another's half-applied change.
//!
//! Every mutating command follows the same shape:
//!
//! ```text
//! clone room → apply rules to the clone → write to store → commit → broadcast
//! ```
//!
//! If the write fails, the clone is dropped and the requester gets an
//! error; subscribers hear nothing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mindroom_game::rules::{self, add_game_event};
use mindroom_game::{
    GameEventKind, GameResult, GameStatus, MoveOutcome, PlayerId, Room, RoomCode,
};
use mindroom_protocol::{Recipient, ServerMessage};
use tokio::sync::{mpsc, oneshot};

use crate::lifecycle::{self, JoinOutcome, LeaveOutcome};
use crate::{RoomError, RoomStore, StoreError};

/// Channel sender for delivering messages to one connection.
///
/// Unbounded so a slow client never stalls its room; each connection
/// drains its channel on a dedicated writer task.
pub type PlayerSender = mpsc::UnboundedSender<ServerMessage>;

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    Join {
        player_id: PlayerId,
        name: String,
        host_intent: bool,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<JoinOutcome, RoomError>>,
    },

    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<LeaveOutcome, RoomError>>,
    },

    Start {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    Play {
        player_id: PlayerId,
        number: u8,
        reply: oneshot::Sender<Result<MoveOutcome, RoomError>>,
    },

    Reset {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Copy of the current room.
    Snapshot { reply: oneshot::Sender<Room> },

    /// Delete the room, notify subscribers, and stop. Replies with the
    /// players that were still seated.
    Delete {
        reason: String,
        reply: oneshot::Sender<Result<Vec<PlayerId>, RoomError>>,
    },

    /// Delete the room if it has been empty for at least `ttl`.
    Expire {
        ttl: Duration,
        reply: oneshot::Sender<bool>,
    },
}

// ---------------------------------------------------------------------------
// RoomHandle
// ---------------------------------------------------------------------------

/// Handle to a running room actor.
///
/// Cheap to clone: it is just an `mpsc::Sender` and the room code. Every
/// method fails with [`RoomError::Unavailable`] once the actor has stopped.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomCode {
        &self.room_id
    }

    /// Sends a command built around a fresh reply channel and waits for
    /// the answer.
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    pub async fn join(
        &self,
        player_id: PlayerId,
        name: String,
        host_intent: bool,
        sender: PlayerSender,
    ) -> Result<JoinOutcome, RoomError> {
        self.request(|reply| RoomCommand::Join {
            player_id,
            name,
            host_intent,
            sender,
            reply,
        })
        .await?
    }

    pub async fn leave(&self, player_id: PlayerId) -> Result<LeaveOutcome, RoomError> {
        self.request(|reply| RoomCommand::Leave { player_id, reply }).await?
    }

    pub async fn start(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Start { player_id, reply }).await?
    }

    pub async fn play(&self, player_id: PlayerId, number: u8) -> Result<MoveOutcome, RoomError> {
        self.request(|reply| RoomCommand::Play { player_id, number, reply }).await?
    }

    pub async fn reset(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Reset { player_id, reply }).await?
    }

    pub async fn snapshot(&self) -> Result<Room, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    pub async fn delete(&self, reason: impl Into<String>) -> Result<Vec<PlayerId>, RoomError> {
        let reason = reason.into();
        self.request(|reply| RoomCommand::Delete { reason, reply }).await?
    }

    pub async fn expire(&self, ttl: Duration) -> Result<bool, RoomError> {
        self.request(|reply| RoomCommand::Expire { ttl, reply }).await
    }
}

// ---------------------------------------------------------------------------
// RoomActor
// ---------------------------------------------------------------------------

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<S: RoomStore> {
    store: Arc<S>,
    room: Room,
    max_players: usize,
    /// Per-player outbound channels, one per seated player.
    subscribers: HashMap<PlayerId, PlayerSender>,
    /// When the room last had nobody seated.
    empty_since: Option<Instant>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl<S: RoomStore> RoomActor<S> {
    /// Runs the actor loop until the room is destroyed or every handle
    /// is dropped.
    async fn run(mut self) {
        tracing::info!(room_id = %self.room.id, "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            let destroyed = match cmd {
                RoomCommand::Join {
                    player_id,
                    name,
                    host_intent,
                    sender,
                    reply,
                } => {
                    let result = self.handle_join(player_id, name, host_intent, sender).await;
                    let _ = reply.send(result);
                    false
                }
                RoomCommand::Leave { player_id, reply } => {
                    let result = self.handle_leave(player_id).await;
                    let destroyed = matches!(result, Ok(LeaveOutcome::Destroyed { .. }));
                    let _ = reply.send(result);
                    destroyed
                }
                RoomCommand::Start { player_id, reply } => {
                    let _ = reply.send(self.handle_start(player_id).await);
                    false
                }
                RoomCommand::Play {
                    player_id,
                    number,
                    reply,
                } => {
                    let _ = reply.send(self.handle_play(player_id, number).await);
                    false
                }
                RoomCommand::Reset { player_id, reply } => {
                    let _ = reply.send(self.handle_reset(player_id).await);
                    false
                }
                RoomCommand::Snapshot { reply } => {
                    let _ = reply.send(self.room.clone());
                    false
                }
                RoomCommand::Delete { reason, reply } => {
                    let result = self.handle_delete(reason).await;
                    let destroyed = result.is_ok();
                    let _ = reply.send(result);
                    destroyed
                }
                RoomCommand::Expire { ttl, reply } => {
                    let expired = self.handle_expire(ttl).await;
                    let _ = reply.send(expired);
                    expired
                }
            };
            if destroyed {
                break;
            }
        }

        tracing::info!(room_id = %self.room.id, "room actor stopped");
    }

    async fn handle_join(
        &mut self,
        player_id: PlayerId,
        name: String,
        host_intent: bool,
        sender: PlayerSender,
    ) -> Result<JoinOutcome, RoomError> {
        let mut working = self.room.clone();
        let outcome =
            lifecycle::seat_player(&mut working, player_id, &name, host_intent, self.max_players)?;

        match outcome {
            JoinOutcome::AlreadySeated => {
                self.subscribers.insert(player_id, sender);
                tracing::debug!(room_id = %self.room.id, %player_id, "player rejoined");
                self.push_state(Recipient::Player(player_id));
            }
            JoinOutcome::Seated { host_changed } => {
                // Seat and host go out in one row write.
                let written = self.store.update_room(&working).await;
                self.commit(working, written).await?;
                self.subscribers.insert(player_id, sender);
                self.empty_since = None;
                tracing::info!(
                    room_id = %self.room.id,
                    %player_id,
                    players = self.room.players.len(),
                    host = host_changed,
                    "player joined"
                );
                self.push_state(Recipient::All);
            }
        }
        Ok(outcome)
    }

    async fn handle_leave(&mut self, player_id: PlayerId) -> Result<LeaveOutcome, RoomError> {
        let mut working = self.room.clone();
        let outcome = lifecycle::remove_player(&mut working, player_id, crate::unix_millis())?;

        match &outcome {
            LeaveOutcome::Destroyed { evicted, reason } => {
                let written = self.store.delete_room(&working.id).await;
                self.commit(working, written).await?;
                self.subscribers.remove(&player_id);
                tracing::info!(
                    room_id = %self.room.id,
                    %player_id,
                    evicted = evicted.len(),
                    reason,
                    "room destroyed"
                );
                self.dispatch(
                    Recipient::All,
                    ServerMessage::RoomDeleted {
                        room_id: self.room.id.clone(),
                        reason: reason.to_string(),
                    },
                );
            }
            LeaveOutcome::Remained { host_changed, game_ended } => {
                let written = self.store.update_room(&working).await;
                self.commit(working, written).await?;
                self.subscribers.remove(&player_id);
                tracing::info!(
                    room_id = %self.room.id,
                    %player_id,
                    players = self.room.players.len(),
                    "player left"
                );
                if *host_changed {
                    if let Some(host) = self.room.host_id {
                        tracing::info!(room_id = %self.room.id, %host, "host migrated");
                    }
                }
                if *game_ended {
                    tracing::info!(room_id = %self.room.id, result = "victory", "game ended");
                }
                self.push_state(Recipient::All);
            }
        }
        Ok(outcome)
    }

    async fn handle_start(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        if !self.room.is_host(player_id) {
            return Err(RoomError::NotHost("start the game"));
        }

        let mut working = self.room.clone();
        rules::start(&mut working)?;
        let player_count = working.players.len();
        add_game_event(
            &mut working,
            GameEventKind::GameStarted { player_count },
            crate::unix_millis(),
        );

        let written = self.store.update_room(&working).await;
        self.commit(working, written).await?;
        tracing::info!(room_id = %self.room.id, players = player_count, "game started");
        self.push_state(Recipient::All);
        Ok(())
    }

    async fn handle_play(&mut self, player_id: PlayerId, number: u8) -> Result<MoveOutcome, RoomError> {
        let mut working = self.room.clone();
        let player_name = working
            .player(player_id)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        let outcome = rules::make_move(&mut working, player_id, number);
        let now = crate::unix_millis();

        match outcome {
            MoveOutcome::Rejected(reason) => {
                tracing::debug!(room_id = %self.room.id, %player_id, number, %reason, "move rejected");
                return Err(RoomError::MoveRejected(reason));
            }
            MoveOutcome::Played { victory } => {
                add_game_event(
                    &mut working,
                    GameEventKind::MoveMade { player_id, player_name, number },
                    now,
                );
                if victory {
                    add_game_event(
                        &mut working,
                        GameEventKind::GameEnded { result: GameResult::Victory },
                        now,
                    );
                }
            }
            MoveOutcome::Failed { reason, game_over, .. } => {
                let lives_remaining = working.lives;
                add_game_event(
                    &mut working,
                    GameEventKind::MoveFailed {
                        player_id,
                        player_name,
                        number,
                        reason,
                        lives_remaining,
                    },
                    now,
                );
                if game_over {
                    add_game_event(
                        &mut working,
                        GameEventKind::GameEnded { result: GameResult::GameOver },
                        now,
                    );
                }
            }
        }

        let written = self.store.update_room(&working).await;
        self.commit(working, written).await?;
        tracing::debug!(
            room_id = %self.room.id,
            %player_id,
            number,
            success = outcome.success(),
            lives = self.room.lives,
            "move applied"
        );
        if self.room.state.is_finished() {
            tracing::info!(room_id = %self.room.id, result = %self.room.state, "game ended");
        }
        self.push_state(Recipient::All);
        Ok(outcome)
    }

    async fn handle_reset(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        if !self.room.is_host(player_id) {
            return Err(RoomError::NotHost("reset the game"));
        }

        let mut working = self.room.clone();
        rules::reset_game(&mut working);
        add_game_event(&mut working, GameEventKind::GameReset, crate::unix_millis());

        let written = self.store.update_room(&working).await;
        self.commit(working, written).await?;
        tracing::info!(room_id = %self.room.id, "game reset");
        self.push_state(Recipient::All);
        Ok(())
    }

    async fn handle_delete(&self, reason: String) -> Result<Vec<PlayerId>, RoomError> {
        if let Err(err) = self.store.delete_room(&self.room.id).await {
            tracing::error!(room_id = %self.room.id, error = %err, "deleting room failed");
            return Err(err.into());
        }

        let evicted = self.room.players.iter().map(|p| p.id).collect();
        tracing::info!(room_id = %self.room.id, %reason, "room deleted");
        self.dispatch(
            Recipient::All,
            ServerMessage::RoomDeleted {
                room_id: self.room.id.clone(),
                reason,
            },
        );
        Ok(evicted)
    }

    async fn handle_expire(&self, ttl: Duration) -> bool {
        let idle = match self.empty_since {
            Some(since) if self.room.is_empty() => since.elapsed(),
            _ => return false,
        };
        if idle < ttl {
            return false;
        }

        match self.store.delete_room(&self.room.id).await {
            Ok(()) => {
                tracing::info!(room_id = %self.room.id, idle_secs = idle.as_secs(), "empty room expired");
                true
            }
            Err(err) => {
                tracing::error!(room_id = %self.room.id, error = %err, "deleting expired room failed");
                false
            }
        }
    }

    /// Adopts `working` if it was written, otherwise reloads from the store
    /// so memory matches whatever the store kept.
    async fn commit(
        &mut self,
        working: Room,
        written: Result<(), StoreError>,
    ) -> Result<(), RoomError> {
        match written {
            Ok(()) => {
                self.room = working;
                Ok(())
            }
            Err(err) => {
                tracing::error!(room_id = %self.room.id, error = %err, "persisting room failed");
                self.resync().await;
                Err(err.into())
            }
        }
    }

    async fn resync(&mut self) {
        match self.store.get_room(&self.room.id).await {
            Ok(Some(stored)) => {
                if stored != self.room {
                    tracing::warn!(room_id = %self.room.id, "partial write, reloaded room from store");
                    self.room = stored;
                }
            }
            Ok(None) => {
                tracing::warn!(room_id = %self.room.id, "room missing from store");
            }
            Err(err) => {
                tracing::error!(room_id = %self.room.id, error = %err, "reloading room failed");
            }
        }
    }

    /// Sends the room snapshot, plus the game projection outside the lobby.
    fn push_state(&self, recipient: Recipient) {
        self.dispatch(recipient, ServerMessage::RoomUpdated { room: self.room.clone() });
        if self.room.state != GameStatus::Lobby {
            self.dispatch(
                recipient,
                ServerMessage::GameStateUpdated {
                    projection: rules::game_state(&self.room),
                },
            );
        }
    }

    /// Delivers a message. Closed channels are skipped; their connection
    /// is already on its way out.
    fn dispatch(&self, recipient: Recipient, msg: ServerMessage) {
        match recipient {
            Recipient::All => {
                for sender in self.subscribers.values() {
                    let _ = sender.send(msg.clone());
                }
            }
            Recipient::Player(pid) => {
                if let Some(sender) = self.subscribers.get(&pid) {
                    let _ = sender.send(msg);
                }
            }
        }
    }
}

/// Spawns a room actor over `room` and returns a handle to it.
///
/// `channel_size` bounds the command queue; callers wait when it is full.
pub(crate) fn spawn_room<S: RoomStore>(
    store: Arc<S>,
    room: Room,
    max_players: usize,
    channel_size: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size.max(1));
    let room_id = room.id.clone();
    let empty_since = room.is_empty().then(Instant::now);

    let actor = RoomActor {
        store,
        room,
        max_players,
        subscribers: HashMap::new(),
        empty_since,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    RoomHandle { room_id, sender: tx }
}
