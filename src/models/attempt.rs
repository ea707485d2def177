// src/models/attempt.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Selected option per question ordinal. Missing keys are unanswered questions.
pub type AnswerMap = BTreeMap<u32, u32>;

/// Reads an [`AnswerMap`] whose keys arrive as JSON strings.
///
/// Needed wherever the map sits inside a flattened struct: the buffered
/// content keeps keys as strings and no longer coerces them to integers.
pub fn deserialize_answer_map<'de, D>(deserializer: D) -> Result<AnswerMap, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    BTreeMap::<String, u32>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, option)| {
            key.parse::<u32>()
                .map(|index| (index, option))
                .map_err(|_| Error::custom(format!("invalid question index `{key}`")))
        })
        .collect()
}

/// One participant's progress on one quiz.
/// At most one non-completed attempt exists per (quiz, user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    #[serde(deserialize_with = "deserialize_answer_map")]
    #[schema(value_type = Object)]
    pub answers: AnswerMap,
    pub score: i64,
    pub current_question_index: u32,

    /// Terminal once true; the store rejects further writes.
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fully resolved values written by the store on create/update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttemptDraft {
    pub answers: AnswerMap,
    pub score: i64,
    pub current_question_index: u32,
    pub completed: bool,
}

/// DTO for `POST /quizzes/reports` and `PUT /quizzes/reports/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveAttemptRequest {
    pub quiz_id: i64,

    /// Score as computed by the client. The server audits it against `answers`.
    pub score: i64,

    #[serde(default)]
    #[schema(value_type = Object)]
    pub answers: AnswerMap,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_question_index: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

/// Persisted attempt plus the result token when the write completed it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResponse {
    #[serde(flatten)]
    pub attempt: QuizAttempt,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_token: Option<String>,
}
