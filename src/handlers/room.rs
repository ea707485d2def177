// src/handlers/room.rs

//! WebSocket transport of the quiz room.
//!
//! One connection is one identity in one room. Incoming text frames are
//! [`ClientCommand`]s; everything the room emits is forwarded as JSON, except
//! the connection's own join announcement.

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::HeaderMap,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};

use crate::{
    attempt::service,
    error::AppError,
    room::{ClientCommand, RoomEvent, RoomParticipant, RoomRegistry, protocol::ErrorFrame},
    state::AppState,
    utils::{
        html::display_name,
        jwt::{Identity, bearer_token, verify_jwt},
    },
};

#[derive(Debug, Deserialize)]
pub struct RoomQuery {
    /// Browsers cannot set headers on a WebSocket handshake.
    pub token: Option<String>,
}

/// Upgrades to the room channel of a quiz.
#[utoipa::path(
    get,
    path = "/api/quizzes/{quiz_id}/room",
    params(
        ("quiz_id" = i64, Path, description = "Quiz id"),
        ("token" = Option<String>, Query, description = "Bearer token when no Authorization header can be sent"),
    ),
    responses(
        (status = 101, description = "Room channel open"),
        (status = UNAUTHORIZED, description = "Missing or invalid token"),
        (status = NOT_FOUND, description = "Unknown quiz"),
    ),
    tag = "room",
    security(("token" = []))
)]
pub async fn room_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(quiz_id): Path<i64>,
    Query(query): Query<RoomQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let token = bearer_token(&headers)
        .map(str::to_string)
        .or(query.token)
        .ok_or(AppError::AuthError("Missing token".to_string()))?;
    let identity = verify_jwt(&token, &state.config.jwt_secret)?.identity()?;

    service::load_quiz(state.store.as_ref(), quiz_id).await?;

    tracing::debug!(quiz_id, user_id = identity.id, "Opening room connection");
    let rooms = state.rooms.clone();
    // Subscribed before the handshake completes so no event after it is missed.
    let events = rooms.subscribe(quiz_id).await;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, rooms, events, quiz_id, identity)))
}

async fn handle_socket(
    socket: WebSocket,
    rooms: Arc<RoomRegistry>,
    mut events: broadcast::Receiver<Arc<RoomEvent>>,
    quiz_id: i64,
    identity: Identity,
) {
    let (mut sink, mut stream) = socket.split();
    let (reply_tx, mut reply_rx) = mpsc::channel::<Message>(16);

    let user_id = identity.id;
    let mut send_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => {
                        if is_own_join(&event, user_id) {
                            continue;
                        }
                        match serde_json::to_string(event.as_ref()) {
                            Ok(text) => Message::Text(text.into()),
                            Err(e) => {
                                tracing::error!("Failed to encode room event: {:?}", e);
                                continue;
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(quiz_id, user_id, skipped, "Room subscriber lagged, events dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(message) => message,
                    None => break,
                },
            };

            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut joined = false;
    loop {
        let frame = tokio::select! {
            frame = stream.next() => frame,
            _ = &mut send_task => break,
        };

        let message = match frame {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                tracing::debug!(quiz_id, user_id, "Room connection error: {}", e);
                break;
            }
            None => break,
        };

        match message {
            Message::Text(text) => {
                let outcome = match serde_json::from_str::<ClientCommand>(text.as_str()) {
                    Ok(command) => apply(&rooms, quiz_id, &identity, command, &mut joined).await,
                    Err(e) => Err(AppError::BadRequest(format!("Malformed command: {e}"))),
                };

                if let Err(e) = outcome {
                    if reply_tx.send(error_frame(&e)).await.is_err() {
                        break;
                    }
                }
            }
            Message::Binary(_) => {
                tracing::debug!(quiz_id, user_id, "Binary frame received, closing");
                break;
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    // Dropping the reply channel stops the writer, which releases its subscription.
    drop(reply_tx);
    if !send_task.is_finished() {
        let _ = send_task.await;
    }

    if joined {
        rooms.leave(quiz_id, user_id).await;
    } else {
        rooms.prune(quiz_id).await;
    }
    tracing::debug!(quiz_id, user_id, "Room connection closed");
}

async fn apply(
    rooms: &RoomRegistry,
    quiz_id: i64,
    identity: &Identity,
    command: ClientCommand,
    joined: &mut bool,
) -> Result<(), AppError> {
    match command {
        ClientCommand::JoinQuizRoom { user_name } => {
            let name = display_name(user_name.as_deref().unwrap_or(&identity.name), &identity.name);
            rooms.join(quiz_id, identity.id, &name).await;
            *joined = true;
        }
        ClientCommand::LeaveQuizRoom => {
            rooms.leave(quiz_id, identity.id).await;
            *joined = false;
        }
        ClientCommand::StartQuizForAll => {
            rooms.start_for_all(quiz_id, identity).await?;
        }
        ClientCommand::UpdateScore {
            score,
            total_questions,
        } => {
            rooms
                .update_score(quiz_id, identity.id, score, total_questions)
                .await;
        }
    }
    Ok(())
}

fn is_own_join(event: &RoomEvent, user_id: i64) -> bool {
    matches!(event, RoomEvent::Joined { user_id: joined, .. } if *joined == user_id)
}

fn error_frame(error: &AppError) -> Message {
    let frame = ErrorFrame {
        message: error.public_message(),
    };
    let text = serde_json::to_string(&frame)
        .unwrap_or_else(|_| r#"{"event":"error","message":"error"}"#.to_string());
    Message::Text(text.into())
}

/// Membership snapshot of a quiz room.
#[utoipa::path(
    get,
    path = "/api/quizzes/{quiz_id}/participants",
    params(("quiz_id" = i64, Path, description = "Quiz id")),
    responses((status = OK, body = Vec<RoomParticipant>)),
    tag = "room",
    security(("token" = []))
)]
pub async fn participants(
    State(rooms): State<Arc<RoomRegistry>>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(rooms.participants(quiz_id).await))
}
