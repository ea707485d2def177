// tests/room_tests.rs

mod common;

use std::time::Duration;

use common::{TestApp, spawn_app};
use futures_util::{SinkExt, StreamExt};
use quiz_room::{
    attempt::{AttemptController, HttpSession, TimerSettings},
    room::{ClientCommand, Leaderboard, RoomEvent},
};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Message, client::IntoClientRequest, http::header::AUTHORIZATION},
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(app: &TestApp, quiz_id: i64, user_id: i64, role: &str) -> Socket {
    let url = app.ws_url(&format!(
        "/api/quizzes/{quiz_id}/room?token={}",
        app.token(user_id, role)
    ));
    let (socket, _) = connect_async(url).await.expect("Failed to open room socket");
    socket
}

async fn send(socket: &mut Socket, command: Value) {
    socket
        .send(Message::text(command.to_string()))
        .await
        .expect("Failed to send command");
}

/// Next JSON frame, failing the test after two seconds.
async fn next_event(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("Timed out waiting for a room event")
            .expect("Socket closed")
            .expect("Socket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("Event is not JSON");
        }
    }
}

async fn assert_silent(socket: &mut Socket) {
    let frame = tokio::time::timeout(Duration::from_millis(200), socket.next()).await;
    assert!(frame.is_err(), "Unexpected frame: {:?}", frame);
}

/// Polls the participants endpoint until the room has `expected` members.
async fn wait_for_members(app: &TestApp, quiz_id: i64, expected: usize) -> Vec<Value> {
    let client = reqwest::Client::new();
    for _ in 0..50 {
        let members: Vec<Value> = client
            .get(app.url(&format!("/api/quizzes/{quiz_id}/participants")))
            .bearer_auth(app.token(1, "instructor"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if members.len() == expected {
            return members;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("Room never reached {expected} members");
}

async fn room_quiz(app: &TestApp) -> i64 {
    app.create_quiz(&[1, 0, 2], "full").await["id"].as_i64().unwrap()
}

#[tokio::test]
async fn join_is_announced_to_others_only() {
    // Arrange
    let app = spawn_app().await;
    let quiz_id = room_quiz(&app).await;
    let mut ada = connect(&app, quiz_id, 10, "student").await;
    let mut bob = connect(&app, quiz_id, 11, "student").await;

    // Act
    send(&mut ada, json!({"event": "joinQuizRoom", "userName": "<i>Ada</i>"})).await;
    wait_for_members(&app, quiz_id, 1).await;
    send(&mut bob, json!({"event": "joinQuizRoom"})).await;

    // Assert
    let seen_by_bob = next_event(&mut bob).await;
    assert_eq!(
        seen_by_bob,
        json!({"event": "userJoined", "quizId": quiz_id, "userId": 10, "userName": "Ada"})
    );
    let seen_by_ada = next_event(&mut ada).await;
    assert_eq!(seen_by_ada["userId"], 11);
    assert_eq!(seen_by_ada["userName"], "user-11");
    assert_silent(&mut bob).await;
}

#[tokio::test]
async fn duplicate_join_keeps_one_membership() {
    // Arrange
    let app = spawn_app().await;
    let quiz_id = room_quiz(&app).await;
    let mut ada = connect(&app, quiz_id, 10, "student").await;
    let mut watcher = connect(&app, quiz_id, 1, "instructor").await;

    // Act
    send(&mut ada, json!({"event": "joinQuizRoom"})).await;
    send(&mut ada, json!({"event": "joinQuizRoom"})).await;

    // Assert
    assert_eq!(next_event(&mut watcher).await["event"], "userJoined");
    assert_eq!(next_event(&mut watcher).await["event"], "userJoined");
    let members = wait_for_members(&app, quiz_id, 1).await;
    assert_eq!(members[0]["userId"], 10);
}

#[tokio::test]
async fn only_elevated_roles_start_the_quiz() {
    // Arrange
    let app = spawn_app().await;
    let quiz_id = room_quiz(&app).await;
    let mut ada = connect(&app, quiz_id, 10, "student").await;
    let mut bob = connect(&app, quiz_id, 11, "student").await;
    let mut instructor = connect(&app, quiz_id, 1, "instructor").await;
    send(&mut ada, json!({"event": "joinQuizRoom"})).await;
    wait_for_members(&app, quiz_id, 1).await;
    send(&mut bob, json!({"event": "joinQuizRoom"})).await;
    wait_for_members(&app, quiz_id, 2).await;
    next_event(&mut ada).await; // bob joined
    next_event(&mut bob).await; // ada joined
    next_event(&mut instructor).await;
    next_event(&mut instructor).await;

    // Act: a student tries first
    send(&mut bob, json!({"event": "startQuizForAll"})).await;

    // Assert: only the requester hears about it
    let error = next_event(&mut bob).await;
    assert_eq!(error["event"], "error");
    assert_silent(&mut ada).await;

    // Act: the instructor starts
    send(&mut instructor, json!({"event": "startQuizForAll"})).await;

    // Assert: every subscriber gets the same snapshot
    for socket in [&mut ada, &mut bob, &mut instructor] {
        let started = next_event(socket).await;
        assert_eq!(started["event"], "quizStarted");
        assert_eq!(started["startedBy"], 1);
        let ids: Vec<i64> = started["participants"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["userId"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![10, 11]);

        let event: RoomEvent = serde_json::from_value(started).unwrap();
        assert!(event.starts(10) && event.starts(11));
        assert!(!event.starts(1));
    }
}

#[tokio::test]
async fn score_updates_carry_increasing_seq() {
    // Arrange
    let app = spawn_app().await;
    let quiz_id = room_quiz(&app).await;
    let mut ada = connect(&app, quiz_id, 10, "student").await;
    let mut bob = connect(&app, quiz_id, 11, "student").await;
    send(&mut ada, json!({"event": "joinQuizRoom"})).await;
    next_event(&mut bob).await;

    // Act
    send(&mut ada, json!({"event": "updateScore", "score": 10, "totalQuestions": 3})).await;
    send(&mut ada, json!({"event": "updateScore", "score": 20, "totalQuestions": 3})).await;

    // Assert
    let first = next_event(&mut bob).await;
    let second = next_event(&mut bob).await;
    assert_eq!(first["event"], "scoreUpdate");
    assert_eq!((first["score"].as_i64(), first["seq"].as_u64()), (Some(10), Some(1)));
    assert_eq!((second["score"].as_i64(), second["seq"].as_u64()), (Some(20), Some(2)));
    assert_eq!(second["userName"], "user-10");

    // A receiver folding the frames keeps the latest score even if one is replayed
    let mut board = Leaderboard::new();
    for frame in [&second, &first] {
        let event: RoomEvent = serde_json::from_value(frame.clone()).unwrap();
        board.apply_event(&event);
    }
    assert_eq!(board.entry(10).map(|e| (e.score, e.seq)), Some((20, 2)));
}

#[tokio::test]
async fn disconnect_leaves_the_room() {
    // Arrange
    let app = spawn_app().await;
    let quiz_id = room_quiz(&app).await;
    let mut ada = connect(&app, quiz_id, 10, "student").await;
    let mut bob = connect(&app, quiz_id, 11, "student").await;
    send(&mut ada, json!({"event": "joinQuizRoom"})).await;
    send(&mut bob, json!({"event": "joinQuizRoom"})).await;
    wait_for_members(&app, quiz_id, 2).await;
    next_event(&mut ada).await;
    next_event(&mut bob).await;

    // Act
    ada.close(None).await.unwrap();

    // Assert
    let left = next_event(&mut bob).await;
    assert_eq!(left, json!({"event": "userLeft", "quizId": quiz_id, "userId": 10}));
    let members = wait_for_members(&app, quiz_id, 1).await;
    assert_eq!(members[0]["userId"], 11);
}

#[tokio::test]
async fn binary_frames_close_the_connection() {
    // Arrange
    let app = spawn_app().await;
    let quiz_id = room_quiz(&app).await;
    let mut ada = connect(&app, quiz_id, 10, "student").await;
    send(&mut ada, json!({"event": "joinQuizRoom"})).await;
    wait_for_members(&app, quiz_id, 1).await;

    // Act
    ada.send(Message::binary(vec![1, 2, 3])).await.unwrap();

    // Assert
    wait_for_members(&app, quiz_id, 0).await;
}

#[tokio::test]
async fn malformed_commands_get_an_error_frame() {
    // Arrange
    let app = spawn_app().await;
    let quiz_id = room_quiz(&app).await;
    let mut ada = connect(&app, quiz_id, 10, "student").await;

    // Act
    send(&mut ada, json!({"event": "danceParty"})).await;

    // Assert
    let error = next_event(&mut ada).await;
    assert_eq!(error["event"], "error");
    assert!(error["message"].as_str().unwrap().starts_with("Malformed command"));
}

#[tokio::test]
async fn handshake_requires_token_and_known_quiz() {
    // Arrange
    let app = spawn_app().await;
    let quiz_id = room_quiz(&app).await;

    // Act
    let anonymous = connect_async(app.ws_url(&format!("/api/quizzes/{quiz_id}/room"))).await;
    let unknown = connect_async(app.ws_url(&format!(
        "/api/quizzes/9999/room?token={}",
        app.token(10, "student")
    )))
    .await;

    let mut request = app
        .ws_url(&format!("/api/quizzes/{quiz_id}/room"))
        .into_client_request()
        .unwrap();
    request.headers_mut().insert(
        AUTHORIZATION,
        format!("Bearer {}", app.token(10, "student")).parse().unwrap(),
    );
    let with_header = connect_async(request).await;

    // Assert
    assert!(anonymous.is_err());
    assert!(unknown.is_err());
    assert!(with_header.is_ok());
}

#[tokio::test]
async fn controller_scores_reach_the_room_over_the_socket() {
    // Arrange
    let app = spawn_app().await;
    let quiz_id = room_quiz(&app).await;
    let mut bob = connect(&app, quiz_id, 11, "student").await;
    let ada = connect(&app, quiz_id, 10, "student").await;
    let (mut ada_tx, _ada_rx) = ada.split();
    ada_tx
        .send(Message::text(json!({"event": "joinQuizRoom"}).to_string()))
        .await
        .unwrap();
    next_event(&mut bob).await;

    // Commands queued by the controller are written to Ada's socket
    let (commands, mut queued) = mpsc::channel::<ClientCommand>(8);
    tokio::spawn(async move {
        while let Some(command) = queued.recv().await {
            let text = serde_json::to_string(&command).unwrap();
            if ada_tx.send(Message::text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut controller = AttemptController::new(
        HttpSession::new(app.url("/api"), app.token(10, "student")),
        commands,
        quiz_id,
        10,
        TimerSettings::from(&app.config),
    );

    // Act
    controller.load().await.unwrap();
    controller.select_option(1).await.unwrap();
    let handoff = controller.submit().await.unwrap();

    // Assert
    let update = next_event(&mut bob).await;
    assert_eq!(update["event"], "scoreUpdate");
    assert_eq!(update["userId"], 10);
    assert_eq!(update["score"], 10);
    assert_eq!(update["totalQuestions"], 3);

    let report: Value = reqwest::get(app.url(&format!(
        "/api/quizzes/results/{}",
        handoff.result_token.unwrap()
    )))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    assert_eq!(report["score"], 10);
    assert_eq!(report["unanswered"], 2);
}
