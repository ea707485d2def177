// src/handlers/attempt.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, State},
    response::IntoResponse,
};

use crate::{
    attempt::service,
    config::Config,
    error::AppError,
    models::attempt::{AttemptResponse, QuizAttempt, SaveAttemptRequest},
    store::SessionStore,
    utils::jwt::Identity,
};

/// Latest non-completed attempt of the caller for a quiz. Used to resume.
#[utoipa::path(
    get,
    path = "/api/quizzes/reports/{quiz_id}/latest",
    params(("quiz_id" = i64, Path, description = "Quiz id")),
    responses(
        (status = OK, body = QuizAttempt),
        (status = NOT_FOUND, description = "No attempt in progress"),
    ),
    tag = "attempts",
    security(("token" = []))
)]
pub async fn latest_attempt(
    State(store): State<Arc<dyn SessionStore>>,
    Extension(identity): Extension<Identity>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = service::latest_active(store.as_ref(), quiz_id, &identity)
        .await?
        .ok_or(AppError::NotFound("No attempt in progress".to_string()))?;

    Ok(Json(attempt))
}

/// Creates an attempt, or overwrites the caller's active one for the same quiz.
///
/// The stored score is recomputed from `answers`. When the write completes the
/// attempt, the response carries a short-lived `resultToken`.
#[utoipa::path(
    post,
    path = "/api/quizzes/reports",
    request_body = SaveAttemptRequest,
    responses(
        (status = OK, body = AttemptResponse),
        (status = BAD_REQUEST, description = "Answers do not fit the quiz"),
        (status = NOT_FOUND, description = "Unknown quiz"),
    ),
    tag = "attempts",
    security(("token" = []))
)]
pub async fn create_attempt(
    State(store): State<Arc<dyn SessionStore>>,
    State(config): State<Config>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<SaveAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = service::create_attempt(store.as_ref(), &config, &identity, &req).await?;
    Ok(Json(response))
}

/// Updates one of the caller's attempts. Completed attempts are read-only.
#[utoipa::path(
    put,
    path = "/api/quizzes/reports/{id}",
    params(("id" = i64, Path, description = "Attempt id")),
    request_body = SaveAttemptRequest,
    responses(
        (status = OK, body = AttemptResponse),
        (status = NOT_FOUND, description = "Unknown attempt"),
        (status = CONFLICT, description = "Attempt already completed"),
    ),
    tag = "attempts",
    security(("token" = []))
)]
pub async fn update_attempt(
    State(store): State<Arc<dyn SessionStore>>,
    State(config): State<Config>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(req): Json<SaveAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = service::update_attempt(store.as_ref(), &config, &identity, id, &req).await?;
    Ok(Json(response))
}
