// src/handlers/results.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    response::IntoResponse,
};

use crate::{
    attempt::service,
    error::AppError,
    insights::insights_or_fallback,
    reporting::ResultsReport,
    state::AppState,
    utils::jwt::{Identity, verify_result_token},
};

/// Resolves a result token into the report of the attempt it was issued for.
///
/// The token is the credential: it names the attempt and its owner and expires
/// after the configured TTL.
#[utoipa::path(
    get,
    path = "/api/quizzes/results/{token}",
    params(("token" = String, Path, description = "Result token from the submission response")),
    responses(
        (status = OK, body = ResultsReport),
        (status = UNAUTHORIZED, description = "Token invalid or expired"),
        (status = NOT_FOUND, description = "Attempt no longer exists"),
    ),
    tag = "results"
)]
pub async fn results_by_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let claims = verify_result_token(&token, &state.config.jwt_secret)?;

    let attempt = state
        .store
        .get_attempt(claims.attempt_id)
        .await?
        .filter(|a| a.completed && a.quiz_id == claims.quiz_id && a.user_id.to_string() == claims.sub)
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    let quiz = service::load_quiz(state.store.as_ref(), attempt.quiz_id).await?;
    let mut report = ResultsReport::build(&quiz, &attempt);
    report.insights = Some(insights_or_fallback(state.insights.as_ref(), &report).await);

    Ok(Json(report))
}

/// Rebuilds the report from the caller's latest completed attempt.
#[utoipa::path(
    get,
    path = "/api/quizzes/reports/{quiz_id}/results",
    params(("quiz_id" = i64, Path, description = "Quiz id")),
    responses(
        (status = OK, body = ResultsReport),
        (status = NOT_FOUND, description = "No completed attempt"),
    ),
    tag = "results",
    security(("token" = []))
)]
pub async fn latest_results(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = service::load_quiz(state.store.as_ref(), quiz_id).await?;
    let attempt = state
        .store
        .latest_attempt(quiz_id, identity.id, true)
        .await?
        .ok_or(AppError::NotFound("No completed attempt for this quiz".to_string()))?;

    let mut report = ResultsReport::build(&quiz, &attempt);
    report.insights = Some(insights_or_fallback(state.insights.as_ref(), &report).await);

    Ok(Json(report))
}
