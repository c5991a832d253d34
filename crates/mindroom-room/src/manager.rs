//! Room manager: creates rooms, routes connections to them, and keeps the
//! connection → room index.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mindroom_game::{MoveOutcome, PlayerId, Room, RoomCode, RoomSummary};
use tokio::sync::Mutex;

use crate::room::spawn_room;
use crate::{
    JoinOutcome, LeaveOutcome, PlayerSender, RoomError, RoomHandle, RoomLimits, RoomStore,
    StoreError,
};

/// Default command channel size for room actors.
pub const DEFAULT_CHANNEL_SIZE: usize = 64;

/// How many fresh codes to try before giving up on creating a room.
const CODE_ATTEMPTS: usize = 16;

#[derive(Default)]
struct Registry {
    /// Running room actors, keyed by room code.
    rooms: HashMap<RoomCode, RoomHandle>,
    /// The room each connection is seated in. A connection holds at most
    /// one seat at a time.
    connections: HashMap<PlayerId, RoomCode>,
}

impl Registry {
    /// Forgets a destroyed room and every connection that pointed at it.
    fn forget_room(&mut self, code: &RoomCode) {
        self.rooms.remove(code);
        self.connections.retain(|_, seated| seated != code);
    }

    /// Records that `player_id` sits in `code`. Skipped if the room was
    /// destroyed since the join was applied.
    fn seat(&mut self, player_id: PlayerId, code: &RoomCode) -> bool {
        if !self.rooms.contains_key(code) {
            return false;
        }
        self.connections.insert(player_id, code.clone());
        true
    }

    /// Drops `player_id`'s index entry if it still points at `code`.
    fn unseat(&mut self, player_id: PlayerId, code: &RoomCode) {
        if self.connections.get(&player_id) == Some(code) {
            self.connections.remove(&player_id);
        }
    }
}

/// Manages all active rooms and tracks which connection is in which room.
///
/// Cheap to clone; clones share the same registry. The registry lock only
/// guards map lookups and is released before any room actor is awaited,
/// so a busy room never delays operations on another.
pub struct RoomManager<S: RoomStore> {
    store: Arc<S>,
    limits: RoomLimits,
    channel_size: usize,
    registry: Arc<Mutex<Registry>>,
}

impl<S: RoomStore> Clone for RoomManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            limits: self.limits.clone(),
            channel_size: self.channel_size,
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<S: RoomStore> RoomManager<S> {
    /// Creates a manager with default limits and channel size.
    pub fn new(store: S) -> Self {
        Self::with_limits(store, RoomLimits::default(), DEFAULT_CHANNEL_SIZE)
    }

    pub fn with_limits(store: S, limits: RoomLimits, channel_size: usize) -> Self {
        Self {
            store: Arc::new(store),
            limits,
            channel_size,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn limits(&self) -> &RoomLimits {
        &self.limits
    }

    async fn handle(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.registry
            .lock()
            .await
            .rooms
            .get(code)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(code.clone()))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Validates the settings, stores a fresh lobby under a new code, and
    /// starts its actor.
    pub async fn create_room(
        &self,
        max_lives: Option<u8>,
        numbers_per_player: Option<u8>,
    ) -> Result<Room, RoomError> {
        let config = self.limits.resolve(max_lives, numbers_per_player)?;

        for _ in 0..CODE_ATTEMPTS {
            let code = RoomCode::generate();
            if self.registry.lock().await.rooms.contains_key(&code) {
                continue;
            }
            let room = match self.store.create_room(&code, config).await {
                Ok(room) => room,
                Err(StoreError::Conflict(_)) => continue,
                Err(err) => {
                    tracing::error!(room_id = %code, error = %err, "storing new room failed");
                    return Err(err.into());
                }
            };

            let handle = spawn_room(
                Arc::clone(&self.store),
                room.clone(),
                self.limits.max_players,
                self.channel_size,
            );
            self.registry.lock().await.rooms.insert(code.clone(), handle);
            tracing::info!(
                room_id = %code,
                max_lives = config.max_lives,
                numbers_per_player = config.numbers_per_player,
                "room created"
            );
            return Ok(room);
        }

        Err(RoomError::Storage(StoreError::Unavailable(
            "could not find a free room code".into(),
        )))
    }

    /// Seats `player_id` in `code`, or re-subscribes it if already seated.
    ///
    /// A connection seated in another room must leave it first.
    pub async fn join_room(
        &self,
        player_id: PlayerId,
        code: &RoomCode,
        name: String,
        host_intent: bool,
        sender: PlayerSender,
    ) -> Result<JoinOutcome, RoomError> {
        let handle = {
            let registry = self.registry.lock().await;
            if let Some(current) = registry.connections.get(&player_id) {
                if current != code {
                    return Err(RoomError::AlreadyInRoom(player_id, current.clone()));
                }
            }
            registry
                .rooms
                .get(code)
                .cloned()
                .ok_or_else(|| RoomError::NotFound(code.clone()))?
        };

        let outcome = handle.join(player_id, name, host_intent, sender).await?;
        if !self.registry.lock().await.seat(player_id, code) {
            tracing::debug!(room_id = %code, %player_id, "room destroyed right after join");
        }
        Ok(outcome)
    }

    /// Gives up `player_id`'s seat in `code`.
    pub async fn leave_room(
        &self,
        player_id: PlayerId,
        code: &RoomCode,
    ) -> Result<LeaveOutcome, RoomError> {
        let result = match self.handle(code).await {
            Ok(handle) => handle.leave(player_id).await,
            Err(err) => Err(err),
        };

        let mut registry = self.registry.lock().await;
        match result {
            Ok(outcome) => {
                match &outcome {
                    LeaveOutcome::Destroyed { .. } => registry.forget_room(code),
                    LeaveOutcome::Remained { .. } => registry.unseat(player_id, code),
                }
                Ok(outcome)
            }
            // No seat to give up; the index must not keep pointing here.
            Err(
                err @ (RoomError::NotFound(_)
                | RoomError::NotInRoom(..)
                | RoomError::Unavailable(_)),
            ) => {
                registry.unseat(player_id, code);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Cleans up after a closed connection. Returns the room it was seated
    /// in, if any.
    pub async fn disconnect(&self, player_id: PlayerId) -> Result<Option<RoomCode>, RoomError> {
        let seated = self.registry.lock().await.connections.get(&player_id).cloned();
        let Some(code) = seated else {
            return Ok(None);
        };

        match self.leave_room(player_id, &code).await {
            // A room that went away underneath us leaves nothing to clean up.
            Ok(_)
            | Err(RoomError::NotFound(_) | RoomError::NotInRoom(..) | RoomError::Unavailable(_)) => {
                Ok(Some(code))
            }
            Err(err) => Err(err),
        }
    }

    // -----------------------------------------------------------------------
    // Game operations
    // -----------------------------------------------------------------------

    pub async fn start_game(&self, player_id: PlayerId, code: &RoomCode) -> Result<(), RoomError> {
        self.handle(code).await?.start(player_id).await
    }

    pub async fn play_number(
        &self,
        player_id: PlayerId,
        code: &RoomCode,
        number: u8,
    ) -> Result<MoveOutcome, RoomError> {
        self.handle(code).await?.play(player_id, number).await
    }

    pub async fn reset_game(&self, player_id: PlayerId, code: &RoomCode) -> Result<(), RoomError> {
        self.handle(code).await?.reset(player_id).await
    }

    // -----------------------------------------------------------------------
    // Listing and deletion
    // -----------------------------------------------------------------------

    /// Summaries of every stored room.
    pub async fn list_rooms(&self) -> Result<Vec<RoomSummary>, RoomError> {
        Ok(self.store.list_room_summaries().await?)
    }

    /// The live copy of one room.
    pub async fn get_room(&self, code: &RoomCode) -> Result<Room, RoomError> {
        self.handle(code).await?.snapshot().await
    }

    /// Deletes a room, telling its subscribers why. Returns the players
    /// that were seated.
    pub async fn delete_room(
        &self,
        code: &RoomCode,
        reason: impl Into<String>,
    ) -> Result<Vec<PlayerId>, RoomError> {
        let handle = self.handle(code).await?;
        let evicted = handle.delete(reason).await?;
        self.registry.lock().await.forget_room(code);
        Ok(evicted)
    }

    /// Destroys rooms that have had nobody seated for at least `ttl`.
    /// Returns how many were removed.
    pub async fn reap_empty_rooms(&self, ttl: Duration) -> usize {
        let handles: Vec<RoomHandle> =
            self.registry.lock().await.rooms.values().cloned().collect();

        let mut reaped = 0;
        for handle in handles {
            match handle.expire(ttl).await {
                Ok(true) => {
                    self.registry.lock().await.forget_room(handle.room_id());
                    reaped += 1;
                }
                Ok(false) => {}
                // The actor already stopped; drop its stale entry.
                Err(RoomError::Unavailable(_)) => {
                    self.registry.lock().await.forget_room(handle.room_id());
                }
                Err(err) => {
                    tracing::warn!(room_id = %handle.room_id(), error = %err, "reaping room failed");
                }
            }
        }
        if reaped > 0 {
            tracing::info!(reaped, "reaped empty rooms");
        }
        reaped
    }

    /// The room a connection is seated in, if any.
    pub async fn player_room(&self, player_id: PlayerId) -> Option<RoomCode> {
        self.registry.lock().await.connections.get(&player_id).cloned()
    }

    /// Number of running rooms.
    pub async fn room_count(&self) -> usize {
        self.registry.lock().await.rooms.len()
    }
}
