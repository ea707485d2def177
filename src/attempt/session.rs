// src/attempt/session.rs

//! Collaborators of the attempt controller: where attempts are persisted
//! ([`AttemptSession`]) and where score changes are announced ([`ScoreSink`]).

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use super::service;
use crate::{
    config::Config,
    error::AppError,
    models::{
        attempt::{AttemptResponse, QuizAttempt, SaveAttemptRequest},
        quiz::Quiz,
    },
    room::{ClientCommand, RoomRegistry},
    store::SessionStore,
    utils::jwt::Identity,
};

/// The attempt REST surface as seen by one participant.
#[async_trait]
pub trait AttemptSession: Send + Sync {
    async fn fetch_quiz(&self, quiz_id: i64) -> Result<Quiz, AppError>;

    /// Latest non-completed attempt of the participant, if any.
    async fn latest_attempt(&self, quiz_id: i64) -> Result<Option<QuizAttempt>, AppError>;

    async fn create_attempt(&self, req: &SaveAttemptRequest) -> Result<AttemptResponse, AppError>;

    async fn update_attempt(
        &self,
        attempt_id: i64,
        req: &SaveAttemptRequest,
    ) -> Result<AttemptResponse, AppError>;
}

/// Runs the attempt rules in-process against a store.
#[derive(Clone)]
pub struct LocalSession {
    store: Arc<dyn SessionStore>,
    config: Config,
    identity: Identity,
}

impl LocalSession {
    pub fn new(store: Arc<dyn SessionStore>, config: Config, identity: Identity) -> Self {
        Self {
            store,
            config,
            identity,
        }
    }
}

#[async_trait]
impl AttemptSession for LocalSession {
    async fn fetch_quiz(&self, quiz_id: i64) -> Result<Quiz, AppError> {
        service::load_quiz(self.store.as_ref(), quiz_id).await
    }

    async fn latest_attempt(&self, quiz_id: i64) -> Result<Option<QuizAttempt>, AppError> {
        service::latest_active(self.store.as_ref(), quiz_id, &self.identity).await
    }

    async fn create_attempt(&self, req: &SaveAttemptRequest) -> Result<AttemptResponse, AppError> {
        service::create_attempt(self.store.as_ref(), &self.config, &self.identity, req).await
    }

    async fn update_attempt(
        &self,
        attempt_id: i64,
        req: &SaveAttemptRequest,
    ) -> Result<AttemptResponse, AppError> {
        service::update_attempt(self.store.as_ref(), &self.config, &self.identity, attempt_id, req)
            .await
    }
}

/// Talks to a running server over HTTP with the participant's bearer token.
#[derive(Clone)]
pub struct HttpSession {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpSession {
    /// `base_url` points at the API root, e.g. `http://localhost:3000/api`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body["error"].as_str().map(str::to_string))
            .unwrap_or_else(|| status.to_string());

        Err(match status {
            StatusCode::BAD_REQUEST => AppError::BadRequest(message),
            StatusCode::UNAUTHORIZED => AppError::AuthError(message),
            StatusCode::FORBIDDEN => AppError::Forbidden(message),
            StatusCode::NOT_FOUND => AppError::NotFound(message),
            StatusCode::CONFLICT => AppError::Conflict(message),
            _ => AppError::InternalServerError(format!("{status}: {message}")),
        })
    }
}

#[async_trait]
impl AttemptSession for HttpSession {
    async fn fetch_quiz(&self, quiz_id: i64) -> Result<Quiz, AppError> {
        let response = self
            .client
            .get(self.url(&format!("quiz/{quiz_id}")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn latest_attempt(&self, quiz_id: i64) -> Result<Option<QuizAttempt>, AppError> {
        let response = self
            .client
            .get(self.url(&format!("quizzes/reports/{quiz_id}/latest")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::read(response).await.map(Some)
    }

    async fn create_attempt(&self, req: &SaveAttemptRequest) -> Result<AttemptResponse, AppError> {
        let response = self
            .client
            .post(self.url("quizzes/reports"))
            .bearer_auth(&self.token)
            .json(req)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn update_attempt(
        &self,
        attempt_id: i64,
        req: &SaveAttemptRequest,
    ) -> Result<AttemptResponse, AppError> {
        let response = self
            .client
            .put(self.url(&format!("quizzes/reports/{attempt_id}")))
            .bearer_auth(&self.token)
            .json(req)
            .send()
            .await?;
        Self::read(response).await
    }
}

/// Where the controller announces a new score for its participant.
#[async_trait]
pub trait ScoreSink: Send + Sync {
    async fn update_score(
        &self,
        quiz_id: i64,
        user_id: i64,
        score: i64,
        total_questions: u32,
    ) -> Result<(), AppError>;
}

/// Broadcasts straight into an in-process registry.
#[derive(Clone)]
pub struct RoomSink {
    registry: Arc<RoomRegistry>,
}

impl RoomSink {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ScoreSink for RoomSink {
    async fn update_score(
        &self,
        quiz_id: i64,
        user_id: i64,
        score: i64,
        total_questions: u32,
    ) -> Result<(), AppError> {
        self.registry
            .update_score(quiz_id, user_id, score, total_questions)
            .await;
        Ok(())
    }
}

/// Queues an `updateScore` command for a connection writer.
/// The connection already carries the quiz and identity.
#[async_trait]
impl ScoreSink for mpsc::Sender<ClientCommand> {
    async fn update_score(
        &self,
        _quiz_id: i64,
        _user_id: i64,
        score: i64,
        total_questions: u32,
    ) -> Result<(), AppError> {
        self.send(ClientCommand::UpdateScore {
            score,
            total_questions,
        })
        .await
        .map_err(|_| AppError::InternalServerError("room connection is closed".to_string()))
    }
}
