use std::{
    collections::{HashMap, VecDeque},
    time::Duration,
};

use super::*;
use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::{
    domain::{Phase, Role},
    error::{ErrorBody, ErrorCode},
    protocol::{CreateRoomResponse, JoinRoomResponse, RoomStatus, VoteStartResponse},
};
use tokio::{
    net::TcpListener,
    sync::{mpsc, oneshot},
    time::timeout,
};

// ---------------------------------------------------------------------------
// HTTP fake: records every request and answers from a scripted reply table.

#[derive(Clone, Default)]
struct FakeServer {
    calls: Arc<Mutex<Vec<(String, Value)>>>,
    replies: Arc<Mutex<HashMap<String, (StatusCode, Value)>>>,
}

impl FakeServer {
    async fn script(&self, endpoint: &str, status: StatusCode, body: Value) {
        self.replies
            .lock()
            .await
            .insert(endpoint.to_string(), (status, body));
    }

    async fn calls_to(&self, endpoint: &str) -> Vec<Value> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|(name, _)| name == endpoint)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    async fn total_calls(&self) -> usize {
        self.calls.lock().await.len()
    }

    async fn reply(&self, endpoint: &str, payload: Value) -> (StatusCode, Json<Value>) {
        self.calls
            .lock()
            .await
            .push((endpoint.to_string(), payload));
        let (status, body) = self
            .replies
            .lock()
            .await
            .get(endpoint)
            .cloned()
            .unwrap_or((StatusCode::OK, json!({})));
        (status, Json(body))
    }
}

async fn handle_create_room(
    State(server): State<FakeServer>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    server.reply("create_room", payload).await
}

async fn handle_join_room(
    State(server): State<FakeServer>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    server.reply("join_room", payload).await
}

async fn handle_room_status(
    State(server): State<FakeServer>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    server.reply("room_status", json!(query)).await
}

async fn handle_vote_start(
    State(server): State<FakeServer>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    server.reply("vote_start", payload).await
}

async fn handle_night_action(
    State(server): State<FakeServer>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    server.reply("night_action", payload).await
}

async fn handle_day_vote(
    State(server): State<FakeServer>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    server.reply("day_vote", payload).await
}

async fn handle_hello(State(server): State<FakeServer>) -> (StatusCode, Json<Value>) {
    server.reply("hello", Value::Null).await
}

async fn spawn_fake_server() -> Result<(String, FakeServer), std::io::Error> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server = FakeServer::default();
    server
        .script("hello", StatusCode::OK, json!({"message": "Hello from Flask backend!"}))
        .await;
    let app = Router::new()
        .route("/api/create_room", post(handle_create_room))
        .route("/api/join_room", post(handle_join_room))
        .route("/api/room_status", get(handle_room_status))
        .route("/api/vote_start", post(handle_vote_start))
        .route("/api/night_action", post(handle_night_action))
        .route("/api/day_vote", post(handle_day_vote))
        .route("/api/hello", get(handle_hello))
        .with_state(server.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), server))
}

async fn joined_http_client(status: Value) -> (Arc<GameClient>, FakeServer) {
    let (server_url, server) = spawn_fake_server().await.expect("spawn server");
    server
        .script("join_room", StatusCode::OK, json!({"success": true, "players": ["Alice"]}))
        .await;
    server.script("room_status", StatusCode::OK, status).await;
    let client = GameClient::new(&server_url).expect("client");
    client.open_join().await;
    client
        .join_room(RoomId::from("ABC123"), PlayerName::from("Alice"))
        .await
        .expect("join");
    (client, server)
}

// ---------------------------------------------------------------------------
// In-memory fake for ordering and cancellation scenarios.

struct ScriptedStatus {
    status: RoomStatus,
    release: Option<oneshot::Receiver<()>>,
}

struct ScriptedAuthority {
    queued: Mutex<VecDeque<ScriptedStatus>>,
    fallback: Mutex<RoomStatus>,
    status_calls: mpsc::UnboundedSender<()>,
    night_actions: Mutex<Vec<TargetedActionRequest>>,
    fail_actions: bool,
}

impl ScriptedAuthority {
    fn new(fail_actions: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<()>) {
        let (status_calls, rx) = mpsc::unbounded_channel();
        let authority = Arc::new(Self {
            queued: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(RoomStatus::default()),
            status_calls,
            night_actions: Mutex::new(Vec::new()),
            fail_actions,
        });
        (authority, rx)
    }

    async fn push(&self, status: RoomStatus, release: Option<oneshot::Receiver<()>>) {
        self.queued
            .lock()
            .await
            .push_back(ScriptedStatus { status, release });
    }

    fn failure() -> ClientError {
        let source = serde_json::from_str::<Value>("<html>").expect_err("not json");
        ClientError::Decode {
            status: 502,
            source,
        }
    }
}

#[async_trait]
impl GameAuthority for ScriptedAuthority {
    async fn create_room(&self, _request: &CreateRoomRequest) -> ClientResult<CreateRoomResponse> {
        Ok(CreateRoomResponse {
            room_id: Some(RoomId::from("ABC123")),
            error: None,
        })
    }

    async fn join_room(&self, _request: &JoinRoomRequest) -> ClientResult<JoinRoomResponse> {
        Ok(JoinRoomResponse {
            success: true,
            ..JoinRoomResponse::default()
        })
    }

    async fn room_status(
        &self,
        _room_id: &RoomId,
        _player_name: &PlayerName,
    ) -> ClientResult<RoomStatus> {
        let next = self.queued.lock().await.pop_front();
        let _ = self.status_calls.send(());
        match next {
            Some(ScriptedStatus { status, release }) => {
                if let Some(release) = release {
                    let _ = release.await;
                }
                Ok(status)
            }
            None => Ok(self.fallback.lock().await.clone()),
        }
    }

    async fn vote_start(&self, _request: &VoteStartRequest) -> ClientResult<VoteStartResponse> {
        Ok(VoteStartResponse::default())
    }

    async fn night_action(&self, request: &TargetedActionRequest) -> ClientResult<()> {
        self.night_actions.lock().await.push(request.clone());
        if self.fail_actions {
            return Err(Self::failure());
        }
        Ok(())
    }

    async fn day_vote(&self, _request: &TargetedActionRequest) -> ClientResult<()> {
        if self.fail_actions {
            return Err(Self::failure());
        }
        Ok(())
    }

    async fn hello(&self) -> ClientResult<String> {
        Ok("hello".to_string())
    }
}

/// Places the client in a room without starting the driver.
async fn seat(client: &GameClient, step: Step) {
    let mut inner = client.inner.lock().await;
    inner.session.step = step;
    inner.session.room_id = RoomId::from("ABC123");
    inner.session.player_name = PlayerName::from("Alice");
}

fn snapshot(phase: Phase, alive: &[&str]) -> RoomStatus {
    RoomStatus {
        players: vec![PlayerName::from("Alice"), PlayerName::from("Bob")],
        started: true,
        phase,
        role: Some(Role::Mafia),
        alive: alive.iter().map(|name| PlayerName::from(*name)).collect(),
        ..RoomStatus::default()
    }
}

async fn wait_for_weak_count(client: &Arc<GameClient>, expected: usize) -> usize {
    for _ in 0..100 {
        if Arc::weak_count(client) == expected {
            break;
        }
        tokio::task::yield_now().await;
    }
    Arc::weak_count(client)
}

// ---------------------------------------------------------------------------
// Room creation and joining.

#[tokio::test]
async fn create_room_adopts_returned_id_and_moves_to_join() {
    let (server_url, server) = spawn_fake_server().await.expect("spawn server");
    server
        .script("create_room", StatusCode::OK, json!({"room_id": "ABC123"}))
        .await;
    let client = GameClient::new(&server_url).expect("client");
    client.open_create().await;

    let room_id = client
        .create_room(RoomBounds::new(5, 10))
        .await
        .expect("create");

    assert_eq!(room_id, "ABC123");
    let session = client.session().await;
    assert_eq!(session.step, Step::Join);
    assert_eq!(session.room_id, "ABC123");
    assert_eq!(
        server.calls_to("create_room").await,
        vec![json!({"min_players": 5, "max_players": 10})]
    );
    assert!(!client.is_syncing().await);
}

#[tokio::test]
async fn create_room_rejects_out_of_range_bounds_before_any_request() {
    let (server_url, server) = spawn_fake_server().await.expect("spawn server");
    let client = GameClient::new(&server_url).expect("client");
    client.open_create().await;

    for (min, max) in [(2, 10), (5, 21), (8, 6), (0, 0)] {
        let err = client
            .create_room(RoomBounds::new(min, max))
            .await
            .expect_err("out of range");
        assert!(matches!(err, ClientError::Validation(_)), "{min}/{max}");
    }

    assert_eq!(server.total_calls().await, 0);
    let session = client.session().await;
    assert_eq!(session.step, Step::Create);
    assert!(session.error.is_some());
}

#[tokio::test]
async fn create_room_without_id_surfaces_generic_failure() {
    let (server_url, server) = spawn_fake_server().await.expect("spawn server");
    server.script("create_room", StatusCode::OK, json!({})).await;
    let client = GameClient::new(&server_url).expect("client");
    client.open_create().await;

    client
        .create_room(RoomBounds::new(5, 10))
        .await
        .expect_err("no room id");

    let session = client.session().await;
    assert_eq!(session.step, Step::Create);
    assert_eq!(session.error.as_deref(), Some("Failed to create room"));
}

#[tokio::test]
async fn join_room_enters_lobby_and_fetches_status_immediately() {
    let (client, server) = joined_http_client(json!({
        "players": ["Alice"],
        "votes": {},
        "started": false,
        "phase": "waiting",
        "alive": [],
        "role": null,
        "last_result": {},
        "winner": null
    }))
    .await;

    let session = client.session().await;
    assert_eq!(session.step, Step::Lobby);
    assert_eq!(session.room.players, vec![PlayerName::from("Alice")]);
    assert_eq!(
        server.calls_to("join_room").await,
        vec![json!({"room_id": "ABC123", "player_name": "Alice"})]
    );
    assert_eq!(
        server.calls_to("room_status").await,
        vec![json!({"room_id": "ABC123", "player_name": "Alice"})]
    );
    assert!(client.is_syncing().await);
}

#[tokio::test]
async fn join_room_surfaces_authority_error_verbatim() {
    let (server_url, server) = spawn_fake_server().await.expect("spawn server");
    server
        .script(
            "join_room",
            StatusCode::BAD_REQUEST,
            json!({"error": "Name already taken"}),
        )
        .await;
    let client = GameClient::new(&server_url).expect("client");
    client.open_join().await;

    let err = client
        .join_room(RoomId::from("ABC123"), PlayerName::from("Alice"))
        .await
        .expect_err("rejected");

    assert!(err.is_rejection());
    let session = client.session().await;
    assert_eq!(session.step, Step::Join);
    assert_eq!(session.error.as_deref(), Some("Name already taken"));
    assert!(!client.is_syncing().await);
    assert!(server.calls_to("room_status").await.is_empty());
}

#[tokio::test]
async fn join_room_falls_back_to_generic_message_on_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let client = GameClient::new(&format!("http://{addr}")).expect("client");
    client.open_join().await;

    let err = client
        .join_room(RoomId::from("ABC123"), PlayerName::from("Alice"))
        .await
        .expect_err("unreachable");

    assert!(matches!(err, ClientError::Transport(_)));
    let session = client.session().await;
    assert_eq!(session.error.as_deref(), Some("Failed to join room"));
    assert_eq!(session.step, Step::Join);
}

#[tokio::test]
async fn join_room_requires_room_and_name() {
    let (server_url, server) = spawn_fake_server().await.expect("spawn server");
    let client = GameClient::new(&server_url).expect("client");
    client.open_join().await;

    let err = client
        .join_room(RoomId::from("ABC123"), PlayerName::from(""))
        .await
        .expect_err("empty name");
    assert!(matches!(err, ClientError::Validation(_)));
    let err = client
        .join_room(RoomId::from(""), PlayerName::from("Alice"))
        .await
        .expect_err("empty room");
    assert!(matches!(err, ClientError::Validation(_)));

    assert_eq!(server.total_calls().await, 0);
}

#[tokio::test]
async fn whitespace_name_is_left_to_the_authority() {
    let (server_url, server) = spawn_fake_server().await.expect("spawn server");
    server
        .script(
            "join_room",
            StatusCode::BAD_REQUEST,
            json!({"error": "Invalid name"}),
        )
        .await;
    let client = GameClient::new(&server_url).expect("client");
    client.open_join().await;

    client
        .join_room(RoomId::from("ABC123"), PlayerName::from("  "))
        .await
        .expect_err("rejected");

    assert_eq!(
        server.calls_to("join_room").await,
        vec![json!({"room_id": "ABC123", "player_name": "  "})]
    );
    assert_eq!(client.session().await.error.as_deref(), Some("Invalid name"));
}

#[tokio::test]
async fn failed_join_from_lobby_returns_to_join_step_and_stops_polling() {
    let (client, server) = joined_http_client(json!({
        "players": ["Alice", "Bob"],
        "votes": {"Bob": true}
    }))
    .await;
    assert!(client.is_syncing().await);
    server
        .script(
            "join_room",
            StatusCode::BAD_REQUEST,
            json!({"error": "Room not found"}),
        )
        .await;

    client
        .join_room(RoomId::from("XYZ999"), PlayerName::from("Mallory"))
        .await
        .expect_err("rejected");

    let session = client.session().await;
    assert_eq!(session.step, Step::Join);
    assert_eq!(session.error.as_deref(), Some("Room not found"));
    assert_eq!(session.room, RoomView::default());
    assert_eq!(session.game, GameView::default());
    assert!(!client.is_syncing().await);
    assert!(matches!(
        client.refresh().await,
        Err(ClientError::Validation(_))
    ));
    assert_eq!(
        server.calls_to("room_status").await,
        vec![json!({"room_id": "ABC123", "player_name": "Alice"})]
    );
}

// ---------------------------------------------------------------------------
// Lobby and start votes.

#[tokio::test]
async fn start_vote_reply_unlocks_game_without_waiting_for_a_poll() {
    let (client, server) = joined_http_client(json!({
        "players": ["Alice", "Bob", "Carol"],
        "votes": {"Bob": true, "Carol": true},
        "started": false
    }))
    .await;
    server
        .script(
            "vote_start",
            StatusCode::OK,
            json!({"votes": {"Alice": true, "Bob": true, "Carol": true}, "started": true}),
        )
        .await;

    let err = client.enter_game().await.expect_err("not started yet");
    assert!(matches!(err, ClientError::Validation(_)));

    client.vote_start(true).await.expect("vote");

    assert_eq!(
        server.calls_to("vote_start").await,
        vec![json!({"room_id": "ABC123", "player_name": "Alice", "vote": true})]
    );
    let view = client.view().await;
    let Panel::Lobby(lobby) = &view.panel else {
        panic!("expected lobby, got {:?}", view.panel);
    };
    assert!(lobby.can_enter_game);
    assert!(lobby.tally.iter().all(|(_, vote)| *vote == StartVote::Yes));

    client.enter_game().await.expect("enter");
    assert_eq!(client.session().await.step, Step::Game);
    assert!(client.is_syncing().await);
}

#[tokio::test]
async fn rejected_start_vote_keeps_tally() {
    let (client, server) = joined_http_client(json!({
        "players": ["Alice", "Bob"],
        "votes": {"Bob": false}
    }))
    .await;
    server
        .script(
            "vote_start",
            StatusCode::BAD_REQUEST,
            json!({"error": "Player not in room"}),
        )
        .await;

    client.vote_start(true).await.expect_err("rejected");

    let session = client.session().await;
    assert_eq!(session.room.votes.get(&PlayerName::from("Bob")), Some(&false));
    assert_eq!(session.room.votes.len(), 1);
    assert_eq!(session.my_vote, Some(true));
}

#[tokio::test]
async fn start_vote_requires_membership() {
    let (server_url, server) = spawn_fake_server().await.expect("spawn server");
    let client = GameClient::new(&server_url).expect("client");

    let err = client.vote_start(true).await.expect_err("not joined");
    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(server.total_calls().await, 0);
}

// ---------------------------------------------------------------------------
// Night and day actions.

#[tokio::test]
async fn night_action_clears_pending_target_even_when_rejected() {
    let (client, server) = joined_http_client(json!({
        "players": ["Alice", "Bob"],
        "started": true,
        "phase": "night",
        "role": "mafia",
        "alive": ["Alice", "Bob"]
    }))
    .await;
    server
        .script(
            "night_action",
            StatusCode::BAD_REQUEST,
            json!({"error": "Not allowed"}),
        )
        .await;
    client.enter_game().await.expect("enter");

    client
        .choose_night_target(PlayerName::from("Bob"))
        .await
        .expect("choose");
    assert_eq!(
        client.session().await.pending.night_target,
        Some(PlayerName::from("Bob"))
    );

    client.submit_night_action().await.expect("dispatched");

    assert_eq!(client.session().await.pending.night_target, None);
    assert_eq!(
        server.calls_to("night_action").await,
        vec![json!({"room_id": "ABC123", "player_name": "Alice", "target": "Bob"})]
    );
}

#[tokio::test]
async fn night_action_clears_pending_target_when_delivery_fails() {
    let (authority, _calls) = ScriptedAuthority::new(true);
    let client = GameClient::new_with_authority(authority.clone(), SyncSettings::default());
    seat(&client, Step::Game).await;
    client.inner.lock().await.session.pending.night_target = Some(PlayerName::from("Bob"));

    client.submit_night_action().await.expect_err("delivery failed");

    assert_eq!(client.session().await.pending.night_target, None);
    assert_eq!(authority.night_actions.lock().await.len(), 1);
}

#[tokio::test]
async fn actions_without_pending_target_are_not_dispatched() {
    let (client, server) = joined_http_client(json!({
        "players": ["Alice", "Bob"],
        "started": true,
        "phase": "day",
        "alive": ["Alice", "Bob"]
    }))
    .await;

    let err = client.submit_day_vote().await.expect_err("no target");
    assert!(matches!(err, ClientError::Validation(_)));
    let err = client.submit_night_action().await.expect_err("no target");
    assert!(matches!(err, ClientError::Validation(_)));

    assert!(server.calls_to("day_vote").await.is_empty());
    assert!(server.calls_to("night_action").await.is_empty());
}

#[tokio::test]
async fn day_vote_dispatches_and_clears_target() {
    let (client, server) = joined_http_client(json!({
        "players": ["Alice", "Bob", "Carol"],
        "started": true,
        "phase": "day",
        "alive": ["Alice", "Bob", "Carol"]
    }))
    .await;
    client.enter_game().await.expect("enter");

    let err = client
        .choose_day_target(PlayerName::from("Alice"))
        .await
        .expect_err("cannot vote for self");
    assert!(matches!(err, ClientError::Validation(_)));
    client
        .choose_day_target(PlayerName::from("Carol"))
        .await
        .expect("choose");

    client.submit_day_vote().await.expect("vote");

    assert_eq!(client.session().await.pending.day_target, None);
    assert_eq!(
        server.calls_to("day_vote").await,
        vec![json!({"room_id": "ABC123", "player_name": "Alice", "target": "Carol"})]
    );
}

#[tokio::test]
async fn villager_sees_kill_but_not_investigation() {
    let (client, _server) = joined_http_client(json!({
        "players": ["Alice", "Bob", "Carol"],
        "started": true,
        "phase": "night",
        "role": "villager",
        "alive": ["Alice", "Carol"],
        "last_result": {
            "killed": "Bob",
            "investigated": {"target": "Carol", "role": "mafia"}
        }
    }))
    .await;
    client.enter_game().await.expect("enter");

    let view = client.view().await;
    let Panel::Game(GamePanel {
        action: ActionPanel::Night(night),
        ..
    }) = &view.panel
    else {
        panic!("expected night panel, got {:?}", view.panel);
    };
    assert_eq!(night.killed, Some(PlayerName::from("Bob")));
    assert_eq!(night.investigation, None);
    assert!(night.targets.is_empty());

    let err = client
        .choose_night_target(PlayerName::from("Carol"))
        .await
        .expect_err("villagers have no target");
    assert!(matches!(err, ClientError::Validation(_)));
}

// ---------------------------------------------------------------------------
// Synchronization.

#[tokio::test]
async fn rejected_poll_keeps_last_known_snapshot() {
    let (client, server) = joined_http_client(json!({
        "players": ["Alice", "Bob"],
        "votes": {"Bob": true}
    }))
    .await;
    let before = client.session().await;
    server
        .script(
            "room_status",
            StatusCode::NOT_FOUND,
            json!({"error": "Room not found"}),
        )
        .await;

    let err = client.refresh().await.expect_err("rejected");

    assert!(err.is_rejection());
    assert_eq!(client.session().await, before);
}

#[tokio::test]
async fn newer_snapshot_survives_an_older_late_reply() {
    let (authority, mut status_calls) = ScriptedAuthority::new(false);
    let client = GameClient::new_with_authority(authority.clone(), SyncSettings::default());
    seat(&client, Step::Game).await;

    let (release_older, older_gate) = oneshot::channel();
    authority
        .push(snapshot(Phase::Night, &["Alice", "Bob"]), Some(older_gate))
        .await;
    authority
        .push(snapshot(Phase::Day, &["Alice"]), None)
        .await;

    let older_client = Arc::clone(&client);
    let older = tokio::spawn(async move { older_client.refresh().await });
    status_calls.recv().await.expect("older request issued");

    assert!(client.refresh().await.expect("newer"));
    release_older.send(()).expect("release");
    let older_applied = older.await.expect("join").expect("older");

    assert!(!older_applied);
    let session = client.session().await;
    assert_eq!(session.game.phase, Phase::Day);
    assert_eq!(session.game.alive, vec![PlayerName::from("Alice")]);
}

#[tokio::test]
async fn reply_arriving_after_leaving_the_room_is_dropped() {
    let (authority, mut status_calls) = ScriptedAuthority::new(false);
    let client = GameClient::new_with_authority(authority.clone(), SyncSettings::default());
    seat(&client, Step::Lobby).await;

    let (release, gate) = oneshot::channel();
    authority
        .push(snapshot(Phase::Night, &["Alice", "Bob"]), Some(gate))
        .await;

    let in_flight_client = Arc::clone(&client);
    let in_flight = tokio::spawn(async move { in_flight_client.refresh().await });
    status_calls.recv().await.expect("request issued");

    client.open_menu().await;
    release.send(()).expect("release");

    assert!(!in_flight.await.expect("join").expect("refresh"));
    let session = client.session().await;
    assert_eq!(session.step, Step::Menu);
    assert_eq!(session.game, GameView::default());
    assert!(matches!(
        client.refresh().await,
        Err(ClientError::Validation(_))
    ));
}

#[tokio::test]
async fn driver_polls_only_while_in_lobby_or_game() {
    let (authority, mut status_calls) = ScriptedAuthority::new(false);
    let client = GameClient::new_with_authority(
        authority,
        SyncSettings {
            poll_interval: Duration::from_millis(20),
        },
    );
    let mut events = client.subscribe_events();
    client.open_join().await;
    client
        .join_room(RoomId::from("ABC123"), PlayerName::from("Alice"))
        .await
        .expect("join");

    // Immediate fetch plus at least two interval ticks.
    for _ in 0..3 {
        timeout(Duration::from_secs(2), status_calls.recv())
            .await
            .expect("poll within deadline")
            .expect("poll");
    }

    client.open_menu().await;
    assert!(!client.is_syncing().await);
    while status_calls.try_recv().is_ok() {}

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(
        status_calls.try_recv().is_err(),
        "no requests after leaving the room"
    );

    let mut saw_menu = false;
    while let Ok(event) = events.try_recv() {
        saw_menu |= event == ClientEvent::StepChanged(Step::Menu);
    }
    assert!(saw_menu);
}

#[tokio::test]
async fn driver_applies_changed_snapshots_and_announces_them() {
    let (authority, _status_calls) = ScriptedAuthority::new(false);
    let client = GameClient::new_with_authority(
        authority.clone(),
        SyncSettings {
            poll_interval: Duration::from_millis(20),
        },
    );
    client.open_join().await;
    client
        .join_room(RoomId::from("ABC123"), PlayerName::from("Alice"))
        .await
        .expect("join");
    let mut events = client.subscribe_events();

    *authority.fallback.lock().await = snapshot(Phase::Night, &["Alice", "Bob"]);

    let event = timeout(Duration::from_secs(2), async {
        loop {
            match events.recv().await {
                Ok(ClientEvent::SnapshotApplied) => return,
                Ok(_) => continue,
                Err(err) => panic!("event channel closed: {err}"),
            }
        }
    })
    .await;
    assert!(event.is_ok(), "snapshot applied within deadline");
    assert_eq!(client.session().await.game.phase, Phase::Night);
}

#[tokio::test]
async fn rejoining_never_leaves_two_drivers_running() {
    let (authority, _status_calls) = ScriptedAuthority::new(false);
    *authority.fallback.lock().await = RoomStatus {
        started: true,
        ..RoomStatus::default()
    };
    let client = GameClient::new_with_authority(authority, SyncSettings::default());

    for _ in 0..3 {
        client.open_join().await;
        client
            .join_room(RoomId::from("ABC123"), PlayerName::from("Alice"))
            .await
            .expect("join");
        client
            .join_room(RoomId::from("ABC123"), PlayerName::from("Alice"))
            .await
            .expect("rejoin while in lobby");
    }
    client.enter_game().await.expect("enter");

    assert!(client.is_syncing().await);
    assert_eq!(wait_for_weak_count(&client, 1).await, 1);

    client.open_menu().await;
    assert_eq!(wait_for_weak_count(&client, 0).await, 0);
}

#[tokio::test]
async fn ping_returns_authority_greeting() {
    let (server_url, _server) = spawn_fake_server().await.expect("spawn server");
    let client = GameClient::new(&server_url).expect("client");

    assert_eq!(
        client.ping().await.expect("ping"),
        "Hello from Flask backend!"
    );
}

#[tokio::test]
async fn bare_error_body_becomes_rejection() {
    let (server_url, server) = spawn_fake_server().await.expect("spawn server");
    server
        .script(
            "hello",
            StatusCode::INTERNAL_SERVER_ERROR,
            json!(ErrorBody::new("database unavailable")),
        )
        .await;
    let client = GameClient::new(&server_url).expect("client");

    match client.ping().await {
        Err(ClientError::Rejected(rejection)) => {
            assert_eq!(rejection.code, ErrorCode::Internal);
            assert_eq!(rejection.message, "database unavailable");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_reply_is_a_decode_error() {
    let (server_url, server) = spawn_fake_server().await.expect("spawn server");
    server
        .script("hello", StatusCode::BAD_GATEWAY, json!("upstream down"))
        .await;
    let client = GameClient::new(&server_url).expect("client");

    assert!(matches!(
        client.ping().await,
        Err(ClientError::Decode { status: 502, .. })
    ));
}

#[test]
fn malformed_server_url_is_rejected() {
    assert!(matches!(
        GameClient::new("not a url"),
        Err(ClientError::Url(_))
    ));
}
