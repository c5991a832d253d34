//! Per-connection handler: request routing and the outbound writer.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Derive the connection's `PlayerId` from its transport id
//!   2. Spawn a writer task that drains the connection's outbound channel
//!   3. Loop: receive envelopes → route to the room manager
//!   4. On exit, leave whatever room the connection was seated in
//!
//! Room actors hold a clone of the outbound sender, so broadcasts and
//! direct replies share one queue and reach the client in emission order.

use std::sync::Arc;
use std::time::Duration;

use mindroom_game::PlayerId;
use mindroom_protocol::{ClientMessage, Codec, Envelope, ServerMessage};
use mindroom_room::{PlayerSender, RoomError, RoomManager, RoomStore};
use mindroom_transport::{Connection, TransportError, WebSocketConnection};
use tokio::sync::mpsc;

use crate::MindroomError;
use crate::server::ServerState;

/// Reason attached to `room-deleted` when a client deletes a room.
const REASON_DELETED: &str = "the room was deleted";

/// Drop guard that releases a connection's seat when its handler exits.
///
/// Cleanup runs even if the handler panics. `Drop` is synchronous, so the
/// async leave is spawned as a fire-and-forget task.
struct DisconnectGuard<S: RoomStore> {
    player_id: PlayerId,
    rooms: RoomManager<S>,
}

impl<S: RoomStore> Drop for DisconnectGuard<S> {
    fn drop(&mut self) {
        let player_id = self.player_id;
        let rooms = self.rooms.clone();
        tokio::spawn(async move {
            match rooms.disconnect(player_id).await {
                Ok(Some(room_id)) => {
                    tracing::info!(%room_id, %player_id, "released seat of disconnected player");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(%player_id, error = %e, "cleanup after disconnect failed");
                }
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S, C>>,
) -> Result<(), MindroomError>
where
    S: RoomStore,
    C: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let player_id = PlayerId(conn_id.into_inner());
    tracing::info!(%conn_id, %player_id, peer = %conn.peer_addr(), "client connected");

    let (outbound, inbox) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_loop(Arc::clone(&conn), Arc::clone(&state), inbox));
    let _guard = DisconnectGuard {
        player_id,
        rooms: state.rooms.clone(),
    };

    loop {
        let received = match state.idle_timeout {
            Some(limit) => match recv_until_idle(&conn, limit).await {
                Some(received) => received,
                None => {
                    tracing::info!(%player_id, "connection idle, closing");
                    break;
                }
            },
            None => conn.recv().await,
        };

        let data = match received {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
        };

        let envelope: Envelope<ClientMessage> = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(%player_id, error = %e, "failed to decode envelope");
                let _ = outbound.send(ServerMessage::Error {
                    message: "malformed message".to_string(),
                });
                continue;
            }
        };

        handle_message(&state, player_id, envelope.message, &outbound).await;
    }

    // _guard drops after this → the seat is released.
    writer.abort();
    conn.close().await?;
    Ok(())
}

/// Waits for the next data frame. Returns `None` once the peer has sent
/// nothing at all for `limit`; pings and pongs keep it alive.
async fn recv_until_idle(
    conn: &WebSocketConnection,
    limit: Duration,
) -> Option<Result<Option<Vec<u8>>, TransportError>> {
    loop {
        let remaining = limit.saturating_sub(conn.idle_for());
        if remaining.is_zero() {
            return None;
        }
        if let Ok(received) = tokio::time::timeout(remaining, conn.recv()).await {
            return Some(received);
        }
    }
}

/// Routes one request. Failures are answered with `error` to this
/// connection only.
async fn handle_message<S, C>(
    state: &ServerState<S, C>,
    player_id: PlayerId,
    msg: ClientMessage,
    outbound: &PlayerSender,
) where
    S: RoomStore,
    C: Codec,
{
    let event = msg.event_name();
    tracing::debug!(%player_id, event, "request received");

    if let Err(e) = route(state, player_id, msg, outbound).await {
        match &e {
            RoomError::Storage(_) => {
                tracing::error!(%player_id, event, error = %e, "request failed");
            }
            _ => {
                tracing::debug!(%player_id, event, error = %e, "request refused");
            }
        }
        let _ = outbound.send(ServerMessage::Error {
            message: e.client_message(),
        });
    }
}

async fn route<S, C>(
    state: &ServerState<S, C>,
    player_id: PlayerId,
    msg: ClientMessage,
    outbound: &PlayerSender,
) -> Result<(), RoomError>
where
    S: RoomStore,
    C: Codec,
{
    let rooms = &state.rooms;
    match msg {
        ClientMessage::JoinRoom {
            room_id,
            player_name,
            is_host,
        } => {
            rooms
                .join_room(player_id, &room_id, player_name, is_host, outbound.clone())
                .await?;
        }

        ClientMessage::StartGame { room_id } => {
            rooms.start_game(player_id, &room_id).await?;
        }

        ClientMessage::PlayNumber { room_id, number } => {
            let outcome = rooms.play_number(player_id, &room_id, number).await?;
            tracing::debug!(
                %room_id,
                %player_id,
                number,
                success = outcome.success(),
                lives_lost = outcome.lives_lost(),
                "number played"
            );
        }

        ClientMessage::ResetGame { room_id } => {
            rooms.reset_game(player_id, &room_id).await?;
        }

        ClientMessage::LeaveRoom { room_id } => {
            rooms.leave_room(player_id, &room_id).await?;
            let _ = outbound.send(ServerMessage::LeftRoom { room_id });
        }

        ClientMessage::CreateRoom {
            max_lives,
            numbers_per_player,
        } => {
            let room = rooms.create_room(max_lives, numbers_per_player).await?;
            let _ = outbound.send(ServerMessage::RoomCreated { room });
        }

        ClientMessage::ListRooms => {
            let summaries = rooms.list_rooms().await?;
            let _ = outbound.send(ServerMessage::RoomList { rooms: summaries });
        }

        ClientMessage::GetRoom { room_id } => {
            let room = rooms.get_room(&room_id).await?;
            let _ = outbound.send(ServerMessage::RoomDetails { room });
        }

        ClientMessage::DeleteRoom { room_id } => {
            let evicted = rooms.delete_room(&room_id, REASON_DELETED).await?;
            // Seated players heard it from the room itself.
            if !evicted.contains(&player_id) {
                let _ = outbound.send(ServerMessage::RoomDeleted {
                    room_id,
                    reason: REASON_DELETED.to_string(),
                });
            }
        }

        ClientMessage::Ping { client_time } => {
            let _ = outbound.send(ServerMessage::Pong {
                client_time,
                server_time: state.elapsed_millis(),
            });
        }
    }
    Ok(())
}

/// Drains the outbound channel onto the socket, stamping each frame with
/// the next sequence number.
async fn write_loop<S, C>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<S, C>>,
    mut inbox: mpsc::UnboundedReceiver<ServerMessage>,
) where
    S: RoomStore,
    C: Codec,
{
    let mut seq: u64 = 1;
    while let Some(message) = inbox.recv().await {
        let envelope = Envelope::new(next_seq(&mut seq), state.elapsed_millis(), message);
        let bytes = match state.codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(conn_id = %conn.id(), error = %e, "failed to encode frame");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "send failed, writer stopping");
            break;
        }
    }
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_seq_counts_up_from_current() {
        let mut seq = 1;
        assert_eq!(next_seq(&mut seq), 1);
        assert_eq!(next_seq(&mut seq), 2);
        assert_eq!(seq, 3);
    }
}
