// src/handlers/quiz.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    attempt::service,
    error::AppError,
    models::quiz::{CreateQuizRequest, NewQuiz, Quiz},
    store::SessionStore,
    utils::{html::clean_html, jwt::Identity},
};

/// Creates a quiz.
/// Instructor/Admin only.
#[utoipa::path(
    post,
    path = "/api/quiz",
    request_body = CreateQuizRequest,
    responses(
        (status = CREATED, body = Quiz, description = "Quiz created"),
        (status = BAD_REQUEST, description = "Invalid quiz definition"),
        (status = FORBIDDEN, description = "Caller is not an instructor"),
    ),
    tag = "quiz",
    security(("token" = []))
)]
pub async fn create_quiz(
    State(store): State<Arc<dyn SessionStore>>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let questions = payload
        .questions
        .into_iter()
        .map(|q| q.into_question())
        .collect::<Result<Vec<_>, _>>()?;

    let quiz = store
        .create_quiz(NewQuiz {
            title: clean_html(&payload.title),
            mode: payload.mode,
            questions,
            created_by: identity.id,
        })
        .await?;

    tracing::info!(
        quiz_id = quiz.id,
        created_by = identity.id,
        questions = quiz.questions.len(),
        mode = quiz.mode.as_str(),
        "Quiz created"
    );

    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Fetches a quiz with its questions.
#[utoipa::path(
    get,
    path = "/api/quiz/{id}",
    params(("id" = i64, Path, description = "Quiz id")),
    responses(
        (status = OK, body = Quiz),
        (status = NOT_FOUND, description = "Unknown quiz"),
    ),
    tag = "quiz",
    security(("token" = []))
)]
pub async fn get_quiz(
    State(store): State<Arc<dyn SessionStore>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = service::load_quiz(store.as_ref(), id).await?;
    Ok(Json(quiz))
}
