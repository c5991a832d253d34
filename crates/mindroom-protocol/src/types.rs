//! Message types for Mindroom's wire format.
//!
//! Every frame is an [`Envelope`] around one named event. Events are
//! adjacently tagged so a browser client sees the same shape it would use
//! with an event-emitter API:
//!
//! ```text
//! { "seq": 4, "timestamp": 1200,
//!   "message": { "event": "play-number", "data": { "roomId": "K7QX2M", "number": 12 } } }
//! ```
//!
//! Field names inside `data` are camelCase; event names are kebab-case.

use serde::{Deserialize, Serialize};

use mindroom_game::{GameStateView, PlayerId, Room, RoomCode, RoomSummary};

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who a server message is addressed to.
///
/// The room actor pairs each outgoing [`ServerMessage`] with a recipient:
/// state changes go to [`Recipient::All`], replies and errors go to the
/// one player that caused them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every subscriber of the room.
    All,

    /// A single player.
    Player(PlayerId),
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Events a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Take a seat in a lobby, or re-subscribe if already seated.
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_id: RoomCode,
        player_name: String,
        /// Claim the host seat. The first player seated is host either way.
        #[serde(default)]
        is_host: bool,
    },

    /// Host only: deal numbers and begin.
    #[serde(rename_all = "camelCase")]
    StartGame { room_id: RoomCode },

    /// Play one of your numbers onto the timeline.
    #[serde(rename_all = "camelCase")]
    PlayNumber { room_id: RoomCode, number: u8 },

    /// Host only: return the room to its lobby.
    #[serde(rename_all = "camelCase")]
    ResetGame { room_id: RoomCode },

    /// Give up your seat.
    #[serde(rename_all = "camelCase")]
    LeaveRoom { room_id: RoomCode },

    /// Open a new room. Missing fields take the server defaults.
    #[serde(rename_all = "camelCase")]
    CreateRoom {
        #[serde(default)]
        max_lives: Option<u8>,
        #[serde(default)]
        numbers_per_player: Option<u8>,
    },

    /// Ask for a summary of every open room.
    ListRooms,

    /// Ask for one room's full record.
    #[serde(rename_all = "camelCase")]
    GetRoom { room_id: RoomCode },

    /// Tear a room down and notify everyone in it.
    #[serde(rename_all = "camelCase")]
    DeleteRoom { room_id: RoomCode },

    /// Keep-alive. The server answers with [`ServerMessage::Pong`].
    #[serde(rename_all = "camelCase")]
    Ping { client_time: u64 },
}

impl ClientMessage {
    /// The kebab-case event name, used as a structured log field.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join-room",
            Self::StartGame { .. } => "start-game",
            Self::PlayNumber { .. } => "play-number",
            Self::ResetGame { .. } => "reset-game",
            Self::LeaveRoom { .. } => "leave-room",
            Self::CreateRoom { .. } => "create-room",
            Self::ListRooms => "list-rooms",
            Self::GetRoom { .. } => "get-room",
            Self::DeleteRoom { .. } => "delete-room",
            Self::Ping { .. } => "ping",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Events the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// The full room record after any change. Broadcast.
    RoomUpdated { room: Room },

    /// The game projection after any change outside the lobby. Broadcast.
    GameStateUpdated { projection: GameStateView },

    /// The room is gone. Sent to everyone who was subscribed.
    #[serde(rename_all = "camelCase")]
    RoomDeleted { room_id: RoomCode, reason: String },

    /// A request failed. Sent only to the requester.
    Error { message: String },

    /// Acknowledges `leave-room`.
    #[serde(rename_all = "camelCase")]
    LeftRoom { room_id: RoomCode },

    /// Reply to `create-room`.
    RoomCreated { room: Room },

    /// Reply to `list-rooms`.
    RoomList { rooms: Vec<RoomSummary> },

    /// Reply to `get-room`.
    RoomDetails { room: Room },

    /// Reply to `ping`.
    #[serde(rename_all = "camelCase")]
    Pong { client_time: u64, server_time: u64 },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The frame every message travels in.
///
/// `seq` counts frames per connection and direction. `timestamp` is
/// milliseconds since the server started. Clients may omit both; they
/// default to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<M> {
    #[serde(default)]
    pub seq: u64,

    #[serde(default)]
    pub timestamp: u64,

    pub message: M,
}

impl<M> Envelope<M> {
    pub fn new(seq: u64, timestamp: u64, message: M) -> Self {
        Self { seq, timestamp, message }
    }
}
