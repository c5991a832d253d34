//! The persistence boundary for rooms.
//!
//! The store is the system of record: a room actor writes every change
//! here before it commits the change in memory. Rows are keyed by room
//! code and each call is atomic for its row; there are no cross-room
//! transactions.
//!
//! Numeric collections (the timeline, each hand, the event log) are kept
//! as opaque JSON strings inside the row, the way a relational table would
//! hold them in text columns.

use std::collections::HashMap;
use std::future::Future;

use mindroom_game::{
    GameStatus, Player, PlayerId, Room, RoomCode, RoomConfig, RoomSummary,
};
use tokio::sync::Mutex;

use crate::StoreError;

/// Storage for room rows.
///
/// `Send + Sync + 'static` because one store is shared by every room actor.
/// Methods return `Send` futures so actors can be spawned onto the runtime.
pub trait RoomStore: Send + Sync + 'static {
    /// Inserts a fresh lobby row. Fails with [`StoreError::Conflict`] if
    /// the code is taken.
    fn create_room(
        &self,
        id: &RoomCode,
        config: RoomConfig,
    ) -> impl Future<Output = Result<Room, StoreError>> + Send;

    fn get_room(
        &self,
        id: &RoomCode,
    ) -> impl Future<Output = Result<Option<Room>, StoreError>> + Send;

    /// Replaces the whole row with `room`.
    fn update_room(&self, room: &Room) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Removes the row. Deleting a missing row is not an error.
    fn delete_room(&self, id: &RoomCode) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn list_room_summaries(
        &self,
    ) -> impl Future<Output = Result<Vec<RoomSummary>, StoreError>> + Send;

    /// Appends a seat to the row's player list.
    fn add_player(
        &self,
        id: &RoomCode,
        player: &Player,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn remove_player(
        &self,
        id: &RoomCode,
        player_id: PlayerId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn set_host(
        &self,
        id: &RoomCode,
        host_id: Option<PlayerId>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// Row encoding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct PlayerRow {
    id: PlayerId,
    name: String,
    /// JSON array of held numbers.
    numbers: String,
}

impl PlayerRow {
    fn encode(player: &Player) -> Result<Self, StoreError> {
        Ok(Self {
            id: player.id,
            name: player.name.clone(),
            numbers: serde_json::to_string(&player.numbers)?,
        })
    }

    fn decode(&self) -> Result<Player, StoreError> {
        Ok(Player {
            id: self.id,
            name: self.name.clone(),
            numbers: serde_json::from_str(&self.numbers)?,
        })
    }
}

#[derive(Debug, Clone)]
struct RoomRow {
    id: RoomCode,
    players: Vec<PlayerRow>,
    /// JSON array of played numbers.
    timeline: String,
    lives: u8,
    config: RoomConfig,
    state: GameStatus,
    host_id: Option<PlayerId>,
    /// JSON array of logged events.
    events: String,
    next_event_id: u64,
    created_at: u64,
}

impl RoomRow {
    fn encode(room: &Room) -> Result<Self, StoreError> {
        Ok(Self {
            id: room.id.clone(),
            players: room.players.iter().map(PlayerRow::encode).collect::<Result<_, _>>()?,
            timeline: serde_json::to_string(&room.timeline)?,
            lives: room.lives,
            config: room.config,
            state: room.state,
            host_id: room.host_id,
            events: serde_json::to_string(&room.events)?,
            next_event_id: room.next_event_id,
            created_at: room.created_at,
        })
    }

    fn decode(&self) -> Result<Room, StoreError> {
        Ok(Room {
            id: self.id.clone(),
            players: self.players.iter().map(PlayerRow::decode).collect::<Result<_, _>>()?,
            timeline: serde_json::from_str(&self.timeline)?,
            lives: self.lives,
            config: self.config,
            state: self.state,
            host_id: self.host_id,
            events: serde_json::from_str(&self.events)?,
            next_event_id: self.next_event_id,
            created_at: self.created_at,
        })
    }

    fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            player_count: self.players.len(),
            state: self.state,
        }
    }
}

// ---------------------------------------------------------------------------
// InMemoryStore
// ---------------------------------------------------------------------------

/// A [`RoomStore`] backed by a map in process memory.
///
/// Rows are encoded exactly as a durable store would hold them, so blob
/// round-tripping is exercised even without a database.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    rows: Mutex<HashMap<RoomCode, RoomRow>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows.
    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

impl RoomStore for InMemoryStore {
    async fn create_room(&self, id: &RoomCode, config: RoomConfig) -> Result<Room, StoreError> {
        let mut rows = self.rows.lock().await;
        if rows.contains_key(id) {
            return Err(StoreError::Conflict(id.clone()));
        }
        let room = Room::new(id.clone(), config, crate::unix_millis());
        rows.insert(id.clone(), RoomRow::encode(&room)?);
        Ok(room)
    }

    async fn get_room(&self, id: &RoomCode) -> Result<Option<Room>, StoreError> {
        let rows = self.rows.lock().await;
        rows.get(id).map(RoomRow::decode).transpose()
    }

    async fn update_room(&self, room: &Room) -> Result<(), StoreError> {
        let row = RoomRow::encode(room)?;
        let mut rows = self.rows.lock().await;
        match rows.get_mut(&room.id) {
            Some(slot) => {
                *slot = row;
                Ok(())
            }
            None => Err(StoreError::NotFound(room.id.clone())),
        }
    }

    async fn delete_room(&self, id: &RoomCode) -> Result<(), StoreError> {
        self.rows.lock().await.remove(id);
        Ok(())
    }

    async fn list_room_summaries(&self) -> Result<Vec<RoomSummary>, StoreError> {
        let rows = self.rows.lock().await;
        let mut listed: Vec<&RoomRow> = rows.values().collect();
        listed.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.as_str().cmp(b.id.as_str())));
        Ok(listed.into_iter().map(RoomRow::summary).collect())
    }

    async fn add_player(&self, id: &RoomCode, player: &Player) -> Result<(), StoreError> {
        let seat = PlayerRow::encode(player)?;
        let mut rows = self.rows.lock().await;
        let row = rows.get_mut(id).ok_or_else(|| StoreError::NotFound(id.clone()))?;
        row.players.push(seat);
        Ok(())
    }

    async fn remove_player(&self, id: &RoomCode, player_id: PlayerId) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        let row = rows.get_mut(id).ok_or_else(|| StoreError::NotFound(id.clone()))?;
        row.players.retain(|p| p.id != player_id);
        Ok(())
    }

    async fn set_host(&self, id: &RoomCode, host_id: Option<PlayerId>) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        let row = rows.get_mut(id).ok_or_else(|| StoreError::NotFound(id.clone()))?;
        row.host_id = host_id;
        Ok(())
    }
}
