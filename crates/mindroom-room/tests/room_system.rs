//! Integration tests for the room system: manager, actors, and store.
//!
//! Room actors broadcast before they reply, so by the time a manager call
//! returns every message it caused is already queued on the receivers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use mindroom_game::rules::expected_next;
use mindroom_game::{
    GameError, GameEventKind, GameResult, GameStatus, MoveOutcome, MoveRejection, Player,
    PlayerId, Room, RoomCode, RoomConfig, RoomSummary,
};
use mindroom_protocol::ServerMessage;
use mindroom_room::{
    InMemoryStore, JoinOutcome, LeaveOutcome, PlayerSender, RoomError, RoomLimits, RoomManager,
    RoomStore, StoreError,
};
use tokio::sync::mpsc;

// =========================================================================
// Store double: writes fail on demand, reads always work.
// =========================================================================

#[derive(Default)]
struct FailingStore {
    inner: InMemoryStore,
    fail_writes: AtomicBool,
    fail_set_host: AtomicBool,
}

impl FailingStore {
    fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Fails `set_host` alone, leaving every other write working.
    fn fail_set_host(&self, fail: bool) {
        self.fail_set_host.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

impl RoomStore for FailingStore {
    async fn create_room(&self, id: &RoomCode, config: RoomConfig) -> Result<Room, StoreError> {
        self.check()?;
        self.inner.create_room(id, config).await
    }

    async fn get_room(&self, id: &RoomCode) -> Result<Option<Room>, StoreError> {
        self.inner.get_room(id).await
    }

    async fn update_room(&self, room: &Room) -> Result<(), StoreError> {
        self.check()?;
        self.inner.update_room(room).await
    }

    async fn delete_room(&self, id: &RoomCode) -> Result<(), StoreError> {
        self.check()?;
        self.inner.delete_room(id).await
    }

    async fn list_room_summaries(&self) -> Result<Vec<RoomSummary>, StoreError> {
        self.inner.list_room_summaries().await
    }

    async fn add_player(&self, id: &RoomCode, player: &Player) -> Result<(), StoreError> {
        self.check()?;
        self.inner.add_player(id, player).await
    }

    async fn remove_player(&self, id: &RoomCode, player_id: PlayerId) -> Result<(), StoreError> {
        self.check()?;
        self.inner.remove_player(id, player_id).await
    }

    async fn set_host(&self, id: &RoomCode, host_id: Option<PlayerId>) -> Result<(), StoreError> {
        self.check()?;
        if self.fail_set_host.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected set_host failure".into()));
        }
        self.inner.set_host(id, host_id).await
    }
}

// =========================================================================
// Helpers
// =========================================================================

type Inbox = mpsc::UnboundedReceiver<ServerMessage>;

fn pid(id: u64) -> PlayerId {
    PlayerId(id)
}

fn channel() -> (PlayerSender, Inbox) {
    mpsc::unbounded_channel()
}

/// Everything queued on an inbox right now.
fn drain(rx: &mut Inbox) -> Vec<ServerMessage> {
    let mut msgs = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        msgs.push(msg);
    }
    msgs
}

/// The event names in an inbox, e.g. `["room-updated", "game-state-updated"]`.
fn events(rx: &mut Inbox) -> Vec<&'static str> {
    drain(rx)
        .iter()
        .map(|msg| match msg {
            ServerMessage::RoomUpdated { .. } => "room-updated",
            ServerMessage::GameStateUpdated { .. } => "game-state-updated",
            ServerMessage::RoomDeleted { .. } => "room-deleted",
            ServerMessage::Error { .. } => "error",
            ServerMessage::LeftRoom { .. } => "left-room",
            ServerMessage::RoomCreated { .. } => "room-created",
            ServerMessage::RoomList { .. } => "room-list",
            ServerMessage::RoomDetails { .. } => "room-details",
            ServerMessage::Pong { .. } => "pong",
        })
        .collect()
}

/// Creates a room and seats players `1..=n` in order. Player 1 is host.
async fn seated<S: RoomStore>(
    mgr: &RoomManager<S>,
    n: u64,
    config: RoomConfig,
) -> (RoomCode, Vec<Inbox>) {
    let room = mgr
        .create_room(Some(config.max_lives), Some(config.numbers_per_player))
        .await
        .unwrap();
    let mut inboxes = Vec::new();
    for id in 1..=n {
        let (tx, rx) = channel();
        mgr.join_room(pid(id), &room.id, format!("player-{id}"), false, tx)
            .await
            .unwrap();
        inboxes.push(rx);
    }
    for rx in &mut inboxes {
        drain(rx);
    }
    (room.id, inboxes)
}

/// Seats `n` players, starts the game, and empties every inbox.
async fn playing<S: RoomStore>(
    mgr: &RoomManager<S>,
    n: u64,
    config: RoomConfig,
) -> (RoomCode, Vec<Inbox>) {
    let (code, mut inboxes) = seated(mgr, n, config).await;
    mgr.start_game(pid(1), &code).await.unwrap();
    for rx in &mut inboxes {
        drain(rx);
    }
    (code, inboxes)
}

fn holder_of(room: &Room, number: u8) -> PlayerId {
    room.players
        .iter()
        .find(|p| p.holds(number))
        .map(|p| p.id)
        .expect("someone holds the number")
}

fn config(max_lives: u8, numbers_per_player: u8) -> RoomConfig {
    RoomConfig { max_lives, numbers_per_player }
}

// =========================================================================
// Creation and configuration
// =========================================================================

#[tokio::test]
async fn test_create_room_defaults_and_persists() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let room = mgr.create_room(None, None).await.unwrap();

    assert_eq!(room.state, GameStatus::Lobby);
    assert_eq!(room.lives, 3);
    assert_eq!(room.config, RoomConfig::default());
    assert!(room.players.is_empty());
    assert_eq!(room.host_id, None);
    assert_eq!(mgr.room_count().await, 1);

    let stored = mgr.store().get_room(&room.id).await.unwrap().unwrap();
    assert_eq!(stored, room);
}

#[tokio::test]
async fn test_create_room_codes_are_unique() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let a = mgr.create_room(None, None).await.unwrap();
    let b = mgr.create_room(None, None).await.unwrap();
    assert_ne!(a.id, b.id);
    assert_eq!(mgr.room_count().await, 2);
}

#[tokio::test]
async fn test_create_room_rejects_out_of_range_config() {
    let mgr = RoomManager::new(InMemoryStore::new());

    let err = mgr.create_room(Some(0), None).await.unwrap_err();
    assert!(matches!(err, RoomError::InvalidConfig(_)));
    let err = mgr.create_room(None, Some(21)).await.unwrap_err();
    assert!(matches!(err, RoomError::InvalidConfig(_)));

    assert_eq!(mgr.room_count().await, 0);
    assert!(mgr.store().is_empty().await);
}

// =========================================================================
// Joining
// =========================================================================

#[tokio::test]
async fn test_join_broadcasts_room_to_every_subscriber() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let room = mgr.create_room(None, None).await.unwrap();

    let (tx1, mut rx1) = channel();
    let (tx2, mut rx2) = channel();
    let outcome = mgr.join_room(pid(1), &room.id, "ada".into(), false, tx1).await.unwrap();
    assert_eq!(outcome, JoinOutcome::Seated { host_changed: true });
    mgr.join_room(pid(2), &room.id, "bo".into(), false, tx2).await.unwrap();

    // Lobby: room snapshots only, no game projection.
    assert_eq!(events(&mut rx1), ["room-updated", "room-updated"]);
    let msgs = drain(&mut rx2);
    assert_eq!(msgs.len(), 1);
    let ServerMessage::RoomUpdated { room: seen } = &msgs[0] else {
        panic!("expected room-updated, got {msgs:?}");
    };
    assert_eq!(seen.players.len(), 2);
    assert_eq!(seen.host_id, Some(pid(1)));
    assert_eq!(mgr.player_room(pid(2)).await, Some(room.id.clone()));
}

#[tokio::test]
async fn test_join_with_host_intent_takes_host() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (code, _inboxes) = seated(&mgr, 1, RoomConfig::default()).await;

    let (tx, _rx) = channel();
    mgr.join_room(pid(2), &code, "bo".into(), true, tx).await.unwrap();

    assert_eq!(mgr.get_room(&code).await.unwrap().host_id, Some(pid(2)));
    let stored = mgr.store().get_room(&code).await.unwrap().unwrap();
    assert_eq!(stored.host_id, Some(pid(2)));
}

#[tokio::test]
async fn test_join_unknown_room_is_not_found() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (tx, _rx) = channel();
    let code = RoomCode::parse("ZZZZ22").unwrap();

    let err = mgr.join_room(pid(1), &code, "ada".into(), false, tx).await.unwrap_err();
    assert!(matches!(err, RoomError::NotFound(_)));
}

#[tokio::test]
async fn test_one_room_per_connection() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (first, _inboxes) = seated(&mgr, 1, RoomConfig::default()).await;
    let second = mgr.create_room(None, None).await.unwrap();

    let (tx, _rx) = channel();
    let err = mgr
        .join_room(pid(1), &second.id, "ada".into(), false, tx)
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::AlreadyInRoom(_, ref code) if *code == first));
    assert!(mgr.get_room(&second.id).await.unwrap().players.is_empty());
}

#[tokio::test]
async fn test_room_full_refuses_extra_seat() {
    let limits = RoomLimits { max_players: 2, ..RoomLimits::default() };
    let mgr = RoomManager::with_limits(InMemoryStore::new(), limits, 8);
    let (code, _inboxes) = seated(&mgr, 2, RoomConfig::default()).await;

    let (tx, _rx) = channel();
    let err = mgr.join_room(pid(3), &code, "cy".into(), false, tx).await.unwrap_err();
    assert!(matches!(err, RoomError::RoomFull(_)));
    assert_eq!(mgr.player_room(pid(3)).await, None);
}

#[tokio::test]
async fn test_new_join_during_game_is_refused() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (code, _inboxes) = playing(&mgr, 2, RoomConfig::default()).await;

    let (tx, _rx) = channel();
    let err = mgr.join_room(pid(3), &code, "cy".into(), false, tx).await.unwrap_err();
    assert!(matches!(err, RoomError::GameInProgress(_)));
}

#[tokio::test]
async fn test_rejoin_is_idempotent_and_unicasts_state() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (code, mut inboxes) = playing(&mgr, 2, RoomConfig::default()).await;
    let before = mgr.get_room(&code).await.unwrap();

    // Player 2 reconnects its subscription with a fresh channel.
    let (tx, mut rx) = channel();
    let outcome = mgr.join_room(pid(2), &code, "someone else".into(), true, tx).await.unwrap();

    assert_eq!(outcome, JoinOutcome::AlreadySeated);
    assert_eq!(mgr.get_room(&code).await.unwrap(), before);
    assert_eq!(events(&mut rx), ["room-updated", "game-state-updated"]);
    assert!(drain(&mut inboxes[0]).is_empty(), "others hear nothing");
}

// =========================================================================
// Starting, playing, resetting
// =========================================================================

#[tokio::test]
async fn test_only_host_can_start_and_reset() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (code, mut inboxes) = seated(&mgr, 2, RoomConfig::default()).await;

    let err = mgr.start_game(pid(2), &code).await.unwrap_err();
    assert!(matches!(err, RoomError::NotHost(_)));
    let err = mgr.reset_game(pid(2), &code).await.unwrap_err();
    assert!(matches!(err, RoomError::NotHost(_)));

    assert_eq!(mgr.get_room(&code).await.unwrap().state, GameStatus::Lobby);
    assert!(drain(&mut inboxes[0]).is_empty());
    assert!(drain(&mut inboxes[1]).is_empty());
}

#[tokio::test]
async fn test_start_needs_two_players() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (code, mut inboxes) = seated(&mgr, 1, RoomConfig::default()).await;

    let err = mgr.start_game(pid(1), &code).await.unwrap_err();
    assert!(matches!(
        err,
        RoomError::Game(GameError::InsufficientPlayers { required: 2, found: 1 })
    ));
    assert!(drain(&mut inboxes[0]).is_empty());
}

#[tokio::test]
async fn test_start_deals_and_broadcasts_projection() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (code, mut inboxes) = seated(&mgr, 3, config(4, 3)).await;

    mgr.start_game(pid(1), &code).await.unwrap();

    let room = mgr.get_room(&code).await.unwrap();
    assert_eq!(room.state, GameStatus::Playing);
    assert_eq!(room.lives, 4);
    assert!(room.players.iter().all(|p| p.numbers.len() == 3));
    assert_eq!(
        room.events.back().map(|e| &e.kind),
        Some(&GameEventKind::GameStarted { player_count: 3 })
    );
    for rx in &mut inboxes {
        assert_eq!(events(rx), ["room-updated", "game-state-updated"]);
    }
}

#[tokio::test]
async fn test_scenario_correct_move_then_out_of_order() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (code, mut inboxes) = playing(&mgr, 2, config(3, 2)).await;

    let room = mgr.get_room(&code).await.unwrap();
    let mut dealt: Vec<u8> = room.players.iter().flat_map(|p| p.numbers.clone()).collect();
    dealt.sort_unstable();

    let lowest = dealt[0];
    let outcome = mgr.play_number(holder_of(&room, lowest), &code, lowest).await.unwrap();
    assert!(outcome.success());

    let highest = dealt[3];
    let outcome = mgr.play_number(holder_of(&room, highest), &code, highest).await.unwrap();
    assert!(!outcome.success());
    assert_eq!(outcome.error(), Some(MoveRejection::OutOfOrder));
    assert_eq!(outcome.lives_lost(), 1);

    let room = mgr.get_room(&code).await.unwrap();
    assert_eq!(room.lives, 2);
    assert_eq!(room.state, GameStatus::Playing);
    assert_eq!(room.timeline, vec![lowest]);
    assert!(matches!(
        room.events.back().map(|e| &e.kind),
        Some(GameEventKind::MoveFailed { lives_remaining: 2, reason: MoveRejection::OutOfOrder, .. })
    ));

    // Both moves were broadcast to both players.
    for rx in &mut inboxes {
        assert_eq!(
            events(rx),
            ["room-updated", "game-state-updated", "room-updated", "game-state-updated"]
        );
    }
    assert_eq!(mgr.store().get_room(&code).await.unwrap().unwrap(), room);
}

#[tokio::test]
async fn test_rejected_move_costs_nothing_and_is_not_broadcast() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (code, mut inboxes) = seated(&mgr, 2, RoomConfig::default()).await;

    let err = mgr.play_number(pid(1), &code, 5).await.unwrap_err();
    assert!(matches!(err, RoomError::MoveRejected(MoveRejection::NotPlaying)));
    assert_eq!(mgr.get_room(&code).await.unwrap().lives, 3);
    assert!(drain(&mut inboxes[1]).is_empty());
}

#[tokio::test]
async fn test_playing_everything_in_order_is_victory() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (code, _inboxes) = playing(&mgr, 3, config(2, 3)).await;

    loop {
        let room = mgr.get_room(&code).await.unwrap();
        let Some(next) = expected_next(&room) else { break };
        mgr.play_number(holder_of(&room, next), &code, next).await.unwrap();
    }

    let room = mgr.get_room(&code).await.unwrap();
    assert_eq!(room.state, GameStatus::Victory);
    assert_eq!(room.timeline.len(), 9);
    assert!(room.timeline.windows(2).all(|w| w[0] < w[1]));
    let endings = room
        .events
        .iter()
        .filter(|e| matches!(e.kind, GameEventKind::GameEnded { .. }))
        .collect::<Vec<_>>();
    assert_eq!(endings.len(), 1);
    assert_eq!(endings[0].kind, GameEventKind::GameEnded { result: GameResult::Victory });
}

#[tokio::test]
async fn test_losing_every_life_is_game_over() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (code, _inboxes) = playing(&mgr, 2, config(1, 2)).await;

    let room = mgr.get_room(&code).await.unwrap();
    let highest = room.players.iter().flat_map(|p| p.numbers.clone()).max().unwrap();
    let outcome = mgr.play_number(holder_of(&room, highest), &code, highest).await.unwrap();

    assert!(outcome.game_over());
    let room = mgr.get_room(&code).await.unwrap();
    assert_eq!(room.lives, 0);
    assert_eq!(room.state, GameStatus::GameOver);

    // Further moves are refused without touching lives.
    let err = mgr.play_number(pid(1), &code, highest).await.unwrap_err();
    assert!(matches!(err, RoomError::MoveRejected(MoveRejection::NotPlaying)));
}

#[tokio::test]
async fn test_reset_returns_to_lobby() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (code, mut inboxes) = playing(&mgr, 2, config(1, 2)).await;
    let room = mgr.get_room(&code).await.unwrap();
    let highest = room.players.iter().flat_map(|p| p.numbers.clone()).max().unwrap();
    mgr.play_number(holder_of(&room, highest), &code, highest).await.unwrap();
    for rx in &mut inboxes {
        drain(rx);
    }

    mgr.reset_game(pid(1), &code).await.unwrap();

    let room = mgr.get_room(&code).await.unwrap();
    assert_eq!(room.state, GameStatus::Lobby);
    assert_eq!(room.lives, 1);
    assert!(room.timeline.is_empty());
    assert!(room.players.iter().all(|p| p.numbers.is_empty()));
    assert_eq!(room.events.len(), 1);
    assert_eq!(room.events[0].kind, GameEventKind::GameReset);
    // Back in the lobby, so only the room snapshot goes out.
    assert_eq!(events(&mut inboxes[1]), ["room-updated"]);
}

#[tokio::test]
async fn test_concurrent_plays_of_same_number_succeed_once() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (code, _inboxes) = playing(&mgr, 2, config(3, 5)).await;
    let room = mgr.get_room(&code).await.unwrap();
    let next = expected_next(&room).unwrap();
    let holder = holder_of(&room, next);

    let (a, b) = tokio::join!(
        mgr.play_number(holder, &code, next),
        mgr.play_number(holder, &code, next)
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    assert_eq!(outcomes.iter().filter(|o| o.success()).count(), 1);
    assert!(outcomes.contains(&MoveOutcome::Failed {
        reason: MoveRejection::AlreadyPlayed,
        lives_lost: 1,
        game_over: false,
    }));
    let room = mgr.get_room(&code).await.unwrap();
    assert_eq!(room.timeline, vec![next]);
    assert_eq!(room.lives, 2);
}

// =========================================================================
// Leaving and disconnects
// =========================================================================

#[tokio::test]
async fn test_host_disconnect_in_lobby_deletes_room() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (code, mut inboxes) = seated(&mgr, 3, RoomConfig::default()).await;

    assert_eq!(mgr.disconnect(pid(1)).await.unwrap(), Some(code.clone()));

    for rx in &mut inboxes[1..] {
        let msgs = drain(rx);
        assert!(
            matches!(msgs.as_slice(), [ServerMessage::RoomDeleted { room_id, .. }] if *room_id == code),
            "got {msgs:?}"
        );
    }
    assert_eq!(mgr.room_count().await, 0);
    assert!(mgr.store().get_room(&code).await.unwrap().is_none());
    assert_eq!(mgr.player_room(pid(2)).await, None);
    assert!(matches!(mgr.get_room(&code).await, Err(RoomError::NotFound(_))));
}

#[tokio::test]
async fn test_non_host_disconnect_while_playing_keeps_room() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (code, mut inboxes) = playing(&mgr, 3, RoomConfig::default()).await;

    mgr.disconnect(pid(3)).await.unwrap();

    let room = mgr.get_room(&code).await.unwrap();
    assert_eq!(room.players.len(), 2);
    assert_eq!(room.host_id, Some(pid(1)));
    assert_eq!(room.state, GameStatus::Playing);
    for rx in &mut inboxes[..2] {
        assert_eq!(events(rx), ["room-updated", "game-state-updated"]);
    }
    assert!(drain(&mut inboxes[2]).is_empty());
    assert_eq!(mgr.player_room(pid(3)).await, None);
}

#[tokio::test]
async fn test_host_disconnect_while_playing_migrates_host() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (code, _inboxes) = playing(&mgr, 2, RoomConfig::default()).await;

    mgr.disconnect(pid(1)).await.unwrap();

    let room = mgr.get_room(&code).await.unwrap();
    assert_eq!(room.host_id, Some(pid(2)));
    assert_eq!(room.players.len(), 1);
    let stored = mgr.store().get_room(&code).await.unwrap().unwrap();
    assert_eq!(stored, room);
}

#[tokio::test]
async fn test_leave_stops_receiving() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (code, mut inboxes) = seated(&mgr, 3, RoomConfig::default()).await;

    let outcome = mgr.leave_room(pid(2), &code).await.unwrap();
    assert_eq!(outcome, LeaveOutcome::Remained { host_changed: false, game_ended: false });

    mgr.start_game(pid(1), &code).await.unwrap();
    assert!(drain(&mut inboxes[1]).is_empty());
    assert_eq!(events(&mut inboxes[0]), ["room-updated", "room-updated", "game-state-updated"]);
}

#[tokio::test]
async fn test_leave_when_not_seated_is_not_in_room() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (code, _inboxes) = seated(&mgr, 1, RoomConfig::default()).await;

    let err = mgr.leave_room(pid(9), &code).await.unwrap_err();
    assert!(matches!(err, RoomError::NotInRoom(..)));
}

#[tokio::test]
async fn test_last_player_leaving_destroys_room() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (code, _inboxes) = playing(&mgr, 2, RoomConfig::default()).await;

    mgr.leave_room(pid(2), &code).await.unwrap();
    let outcome = mgr.leave_room(pid(1), &code).await.unwrap();

    assert!(matches!(outcome, LeaveOutcome::Destroyed { .. }));
    assert_eq!(mgr.room_count().await, 0);
    assert!(mgr.store().is_empty().await);
}

#[tokio::test]
async fn test_disconnect_without_seat_is_noop() {
    let mgr = RoomManager::new(InMemoryStore::new());
    assert_eq!(mgr.disconnect(pid(42)).await.unwrap(), None);
}

// =========================================================================
// Listing, deletion, reaping
// =========================================================================

#[tokio::test]
async fn test_list_rooms_reports_counts_and_state() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (busy, _inboxes) = playing(&mgr, 2, RoomConfig::default()).await;
    let idle = mgr.create_room(None, None).await.unwrap();

    let rooms = mgr.list_rooms().await.unwrap();
    assert_eq!(rooms.len(), 2);
    let busy_summary = rooms.iter().find(|r| r.id == busy).unwrap();
    assert_eq!(busy_summary.player_count, 2);
    assert_eq!(busy_summary.state, GameStatus::Playing);
    let idle_summary = rooms.iter().find(|r| r.id == idle.id).unwrap();
    assert_eq!(idle_summary.player_count, 0);
}

#[tokio::test]
async fn test_delete_room_notifies_subscribers() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let (code, mut inboxes) = seated(&mgr, 2, RoomConfig::default()).await;

    let evicted = mgr.delete_room(&code, "closed by request").await.unwrap();

    assert_eq!(evicted, vec![pid(1), pid(2)]);
    for rx in &mut inboxes {
        let msgs = drain(rx);
        assert!(matches!(
            msgs.as_slice(),
            [ServerMessage::RoomDeleted { reason, .. }] if reason == "closed by request"
        ));
    }
    assert_eq!(mgr.room_count().await, 0);
    assert_eq!(mgr.player_room(pid(1)).await, None);
    assert!(matches!(mgr.delete_room(&code, "again").await, Err(RoomError::NotFound(_))));
}

#[tokio::test]
async fn test_reap_removes_only_empty_rooms() {
    let mgr = RoomManager::new(InMemoryStore::new());
    let empty = mgr.create_room(None, None).await.unwrap();
    let (occupied, _inboxes) = seated(&mgr, 1, RoomConfig::default()).await;

    // A long TTL spares everything.
    assert_eq!(mgr.reap_empty_rooms(Duration::from_secs(3600)).await, 0);
    assert_eq!(mgr.reap_empty_rooms(Duration::ZERO).await, 1);

    assert!(matches!(mgr.get_room(&empty.id).await, Err(RoomError::NotFound(_))));
    assert!(mgr.store().get_room(&empty.id).await.unwrap().is_none());
    assert!(mgr.get_room(&occupied).await.is_ok());
}

// =========================================================================
// Persistence failures
// =========================================================================

#[tokio::test]
async fn test_failed_move_write_leaves_room_unchanged() {
    let mgr = RoomManager::new(FailingStore::default());
    let (code, mut inboxes) = playing(&mgr, 2, RoomConfig::default()).await;
    let before = mgr.get_room(&code).await.unwrap();
    let next = expected_next(&before).unwrap();

    mgr.store().fail_writes(true);
    let err = mgr.play_number(holder_of(&before, next), &code, next).await.unwrap_err();

    assert!(matches!(err, RoomError::Storage(_)));
    assert_eq!(err.client_message(), "internal error, please retry");
    let after = mgr.get_room(&code).await.unwrap();
    assert_eq!(after, before);
    assert_eq!(mgr.store().get_room(&code).await.unwrap().unwrap(), after);
    for rx in &mut inboxes {
        assert!(drain(rx).is_empty(), "no broadcast after a failed write");
    }

    // The same move goes through once the store recovers.
    mgr.store().fail_writes(false);
    let outcome = mgr.play_number(holder_of(&before, next), &code, next).await.unwrap();
    assert!(outcome.success());
}

#[tokio::test]
async fn test_failed_join_write_seats_nobody() {
    let mgr = RoomManager::new(FailingStore::default());
    let (code, mut inboxes) = seated(&mgr, 1, RoomConfig::default()).await;

    mgr.store().fail_writes(true);
    let (tx, mut rx) = channel();
    let err = mgr.join_room(pid(2), &code, "bo".into(), false, tx).await.unwrap_err();

    assert!(matches!(err, RoomError::Storage(_)));
    assert_eq!(mgr.get_room(&code).await.unwrap().players.len(), 1);
    assert_eq!(mgr.player_room(pid(2)).await, None);
    assert!(drain(&mut rx).is_empty());
    assert!(drain(&mut inboxes[0]).is_empty());
}

#[tokio::test]
async fn test_failed_delete_keeps_room_running() {
    let mgr = RoomManager::new(FailingStore::default());
    let (code, mut inboxes) = seated(&mgr, 2, RoomConfig::default()).await;

    mgr.store().fail_writes(true);
    assert!(mgr.disconnect(pid(1)).await.is_err());

    let room = mgr.get_room(&code).await.unwrap();
    assert_eq!(room.players.len(), 2);
    assert!(drain(&mut inboxes[1]).is_empty());
}

#[tokio::test]
async fn test_host_join_is_one_consistent_write() {
    let mgr = RoomManager::new(FailingStore::default());
    let (code, mut inboxes) = seated(&mgr, 1, RoomConfig::default()).await;

    mgr.store().fail_set_host(true);
    let (tx, mut rx) = channel();
    mgr.join_room(pid(2), &code, "bo".into(), true, tx).await.unwrap();

    let room = mgr.get_room(&code).await.unwrap();
    assert_eq!(room.host_id, Some(pid(2)));
    assert_eq!(room.players.len(), 2);
    assert_eq!(mgr.store().get_room(&code).await.unwrap().unwrap(), room);
    assert_eq!(mgr.player_room(pid(2)).await, Some(code.clone()));
    assert_eq!(events(&mut rx), ["room-updated"]);
    assert_eq!(events(&mut inboxes[0]), ["room-updated"]);
}

#[tokio::test]
async fn test_failed_host_join_changes_neither_seat_nor_host() {
    let mgr = RoomManager::new(FailingStore::default());
    let (code, mut inboxes) = seated(&mgr, 1, RoomConfig::default()).await;
    let before = mgr.get_room(&code).await.unwrap();

    mgr.store().fail_writes(true);
    let (tx, mut rx) = channel();
    let err = mgr.join_room(pid(2), &code, "bo".into(), true, tx).await.unwrap_err();

    assert!(matches!(err, RoomError::Storage(_)));
    let after = mgr.get_room(&code).await.unwrap();
    assert_eq!(after, before);
    assert_eq!(after.host_id, Some(pid(1)));
    assert_eq!(mgr.store().get_room(&code).await.unwrap().unwrap(), after);
    assert_eq!(mgr.player_room(pid(2)).await, None);
    assert!(drain(&mut rx).is_empty());
    assert!(drain(&mut inboxes[0]).is_empty());

    // Retrying after recovery seats the joiner as host.
    mgr.store().fail_writes(false);
    let (tx, _rx) = channel();
    mgr.join_room(pid(2), &code, "bo".into(), true, tx).await.unwrap();
    assert_eq!(mgr.get_room(&code).await.unwrap().host_id, Some(pid(2)));
}

#[tokio::test]
async fn test_host_leave_while_playing_is_one_consistent_write() {
    let mgr = RoomManager::new(FailingStore::default());
    let (code, mut inboxes) = playing(&mgr, 3, RoomConfig::default()).await;

    mgr.store().fail_set_host(true);
    let outcome = mgr.leave_room(pid(1), &code).await.unwrap();

    assert!(matches!(outcome, LeaveOutcome::Remained { .. }));
    let room = mgr.get_room(&code).await.unwrap();
    assert_eq!(room.host_id, Some(pid(2)));
    assert_eq!(room.players.len(), 2);
    assert_eq!(mgr.store().get_room(&code).await.unwrap().unwrap(), room);
    assert_eq!(mgr.player_room(pid(1)).await, None);
    for rx in &mut inboxes[1..] {
        assert_eq!(events(rx), ["room-updated", "game-state-updated"]);
    }
}

#[tokio::test]
async fn test_failed_host_leave_while_playing_keeps_host_seated() {
    let mgr = RoomManager::new(FailingStore::default());
    let (code, mut inboxes) = playing(&mgr, 3, RoomConfig::default()).await;
    let before = mgr.get_room(&code).await.unwrap();

    mgr.store().fail_writes(true);
    let err = mgr.leave_room(pid(1), &code).await.unwrap_err();

    assert!(matches!(err, RoomError::Storage(_)));
    let after = mgr.get_room(&code).await.unwrap();
    assert_eq!(after, before);
    assert_eq!(after.host_id, Some(pid(1)));
    assert!(after.players.iter().any(|p| p.id == pid(1)));
    assert_eq!(mgr.store().get_room(&code).await.unwrap().unwrap(), after);
    assert_eq!(mgr.player_room(pid(1)).await, Some(code.clone()));
    for rx in &mut inboxes {
        assert!(drain(rx).is_empty(), "no broadcast after a failed write");
    }

    // The same leave goes through once the store recovers.
    mgr.store().fail_writes(false);
    mgr.leave_room(pid(1), &code).await.unwrap();
    assert_eq!(mgr.get_room(&code).await.unwrap().host_id, Some(pid(2)));
}
