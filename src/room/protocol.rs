// src/room/protocol.rs

//! Wire types of the quiz room channel.
//!
//! Every frame is a JSON object tagged by `event`. Clients send
//! [`ClientCommand`]s, the room fans out [`RoomEvent`]s.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A connected identity inside a room. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomParticipant {
    pub quiz_id: i64,
    pub user_id: i64,
    pub user_name: String,
}

/// A score broadcast. `seq` increases per (room, user) in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreUpdate {
    pub quiz_id: i64,
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub score: i64,
    pub total_questions: u32,
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum RoomEvent {
    #[serde(rename = "userJoined")]
    Joined {
        quiz_id: i64,
        user_id: i64,
        user_name: String,
    },

    #[serde(rename = "userLeft")]
    Left { quiz_id: i64, user_id: i64 },

    /// Pushed to every subscriber; only listed participants should act on it.
    #[serde(rename = "quizStarted")]
    Started {
        quiz_id: i64,
        started_by: i64,
        participants: Vec<RoomParticipant>,
    },

    #[serde(rename = "scoreUpdate")]
    ScoreUpdated(ScoreUpdate),
}

impl RoomEvent {
    pub fn quiz_id(&self) -> i64 {
        match self {
            RoomEvent::Joined { quiz_id, .. }
            | RoomEvent::Left { quiz_id, .. }
            | RoomEvent::Started { quiz_id, .. } => *quiz_id,
            RoomEvent::ScoreUpdated(update) => update.quiz_id,
        }
    }

    /// Whether a receiving client identified by `user_id` should begin the quiz.
    pub fn starts(&self, user_id: i64) -> bool {
        match self {
            RoomEvent::Started { participants, .. } => {
                participants.iter().any(|p| p.user_id == user_id)
            }
            _ => false,
        }
    }
}

/// Commands a client sends over its room connection.
/// The quiz id and identity come from the connection itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    JoinQuizRoom {
        /// Display name override; defaults to the name in the token.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_name: Option<String>,
    },
    LeaveQuizRoom,
    StartQuizForAll,
    UpdateScore { score: i64, total_questions: u32 },
}

/// Frame sent back to a single connection when one of its commands fails.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename = "error")]
pub struct ErrorFrame {
    pub message: String,
}
