// src/attempt/service.rs

//! Server-side rules for writing attempts, shared by the HTTP handlers and
//! the in-process session.

use crate::{
    config::Config,
    error::AppError,
    models::{
        attempt::{AttemptDraft, AttemptResponse, QuizAttempt, SaveAttemptRequest},
        quiz::Quiz,
    },
    store::SessionStore,
    utils::jwt::{Identity, sign_result_token},
};

use super::scoring::audit_score;

pub async fn load_quiz(store: &dyn SessionStore, quiz_id: i64) -> Result<Quiz, AppError> {
    store
        .get_quiz(quiz_id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))
}

/// Latest non-completed attempt of the caller, used to resume.
pub async fn latest_active(
    store: &dyn SessionStore,
    quiz_id: i64,
    identity: &Identity,
) -> Result<Option<QuizAttempt>, AppError> {
    store.latest_attempt(quiz_id, identity.id, false).await
}

/// Creates the caller's attempt, or overwrites the active one for the same quiz.
pub async fn create_attempt(
    store: &dyn SessionStore,
    config: &Config,
    identity: &Identity,
    req: &SaveAttemptRequest,
) -> Result<AttemptResponse, AppError> {
    let quiz = load_quiz(store, req.quiz_id).await?;
    let draft = audited_draft(&quiz, identity, req, 0)?;

    let attempt = store
        .upsert_active_attempt(quiz.id, identity.id, draft)
        .await?;
    tracing::info!(
        quiz_id = quiz.id,
        user_id = identity.id,
        attempt_id = attempt.id,
        score = attempt.score,
        "Attempt saved"
    );

    respond(config, attempt)
}

/// Overwrites one of the caller's attempts. Completed attempts are immutable.
pub async fn update_attempt(
    store: &dyn SessionStore,
    config: &Config,
    identity: &Identity,
    attempt_id: i64,
    req: &SaveAttemptRequest,
) -> Result<AttemptResponse, AppError> {
    let existing = store
        .get_attempt(attempt_id)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    if existing.user_id != identity.id {
        // Foreign attempts look missing.
        return Err(AppError::NotFound("Attempt not found".to_string()));
    }
    if existing.quiz_id != req.quiz_id {
        return Err(AppError::BadRequest(
            "quizId does not match the attempt".to_string(),
        ));
    }
    if existing.completed {
        return Err(AppError::Conflict("Attempt is already completed".to_string()));
    }

    let quiz = load_quiz(store, existing.quiz_id).await?;
    let draft = audited_draft(&quiz, identity, req, existing.current_question_index)?;

    let attempt = store.update_attempt(attempt_id, draft).await?;
    tracing::debug!(
        quiz_id = attempt.quiz_id,
        user_id = identity.id,
        attempt_id,
        score = attempt.score,
        completed = attempt.completed,
        "Attempt updated"
    );

    respond(config, attempt)
}

/// Validates a write against the quiz and replaces the client's score with the audited one.
fn audited_draft(
    quiz: &Quiz,
    identity: &Identity,
    req: &SaveAttemptRequest,
    fallback_index: u32,
) -> Result<AttemptDraft, AppError> {
    for (&index, &option) in &req.answers {
        let question = quiz.question(index).ok_or_else(|| {
            AppError::BadRequest(format!("Question {index} does not exist in this quiz"))
        })?;
        if !question.has_option(option) {
            return Err(AppError::BadRequest(format!(
                "Option {option} does not exist for question {index}"
            )));
        }
    }

    let current_question_index = req.current_question_index.unwrap_or(fallback_index);
    if current_question_index >= quiz.total_questions() {
        return Err(AppError::BadRequest(format!(
            "currentQuestionIndex {current_question_index} is out of range"
        )));
    }

    let score = audit_score(&req.answers, &quiz.questions);
    if score != req.score {
        tracing::warn!(
            quiz_id = quiz.id,
            user_id = identity.id,
            client_score = req.score,
            audited_score = score,
            "Client score does not match answers, storing audited score"
        );
    }

    Ok(AttemptDraft {
        answers: req.answers.clone(),
        score,
        current_question_index,
        completed: req.completed.unwrap_or(false),
    })
}

fn respond(config: &Config, attempt: QuizAttempt) -> Result<AttemptResponse, AppError> {
    let result_token = if attempt.completed {
        tracing::info!(
            quiz_id = attempt.quiz_id,
            user_id = attempt.user_id,
            attempt_id = attempt.id,
            score = attempt.score,
            "Attempt completed"
        );
        Some(sign_result_token(
            attempt.id,
            attempt.quiz_id,
            attempt.user_id,
            &config.jwt_secret,
            config.result_token_ttl,
        )?)
    } else {
        None
    };

    Ok(AttemptResponse {
        attempt,
        result_token,
    })
}
