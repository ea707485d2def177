// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};

use super::SessionStore;
use crate::{
    error::AppError,
    models::{
        attempt::{AnswerMap, AttemptDraft, QuizAttempt},
        question::Question,
        quiz::{NewQuiz, Quiz, QuizMode},
    },
};

const ATTEMPT_COLUMNS: &str = "id, quiz_id, user_id, answers, score, current_question_index, \
                               completed, completed_at, created_at, updated_at";

/// Represents the 'quizzes' table in the database.
#[derive(Debug, FromRow)]
struct QuizRow {
    id: i64,
    title: String,
    mode: String,
    questions: Json<Vec<Question>>,
    created_by: i64,
    created_at: Option<DateTime<Utc>>,
}

impl From<QuizRow> for Quiz {
    fn from(row: QuizRow) -> Self {
        let mode = QuizMode::parse(&row.mode).unwrap_or_else(|| {
            tracing::warn!(quiz_id = row.id, "Unknown quiz mode {:?}, using full", row.mode);
            QuizMode::Full
        });
        Quiz {
            id: row.id,
            title: row.title,
            mode,
            questions: row.questions.0,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

/// Represents the 'quiz_attempts' table in the database.
#[derive(Debug, FromRow)]
struct AttemptRow {
    id: i64,
    quiz_id: i64,
    user_id: i64,
    answers: Json<AnswerMap>,
    score: i64,
    current_question_index: i32,
    completed: bool,
    completed_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<AttemptRow> for QuizAttempt {
    fn from(row: AttemptRow) -> Self {
        QuizAttempt {
            id: row.id,
            quiz_id: row.quiz_id,
            user_id: row.user_id,
            answers: row.answers.0,
            score: row.score,
            current_question_index: row.current_question_index.max(0) as u32,
            completed: row.completed,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create_quiz(&self, quiz: NewQuiz) -> Result<Quiz, AppError> {
        let row = sqlx::query_as::<_, QuizRow>(
            r#"
            INSERT INTO quizzes (title, mode, questions, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, mode, questions, created_by, created_at
            "#,
        )
        .bind(&quiz.title)
        .bind(quiz.mode.as_str())
        .bind(Json(&quiz.questions))
        .bind(quiz.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert quiz: {:?}", e);
            AppError::from(e)
        })?;

        Ok(row.into())
    }

    async fn get_quiz(&self, id: i64) -> Result<Option<Quiz>, AppError> {
        let row = sqlx::query_as::<_, QuizRow>(
            "SELECT id, title, mode, questions, created_by, created_at FROM quizzes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Quiz::from))
    }

    async fn get_attempt(&self, id: i64) -> Result<Option<QuizAttempt>, AppError> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(QuizAttempt::from))
    }

    async fn latest_attempt(
        &self,
        quiz_id: i64,
        user_id: i64,
        completed: bool,
    ) -> Result<Option<QuizAttempt>, AppError> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            r#"
            SELECT {ATTEMPT_COLUMNS}
            FROM quiz_attempts
            WHERE quiz_id = $1 AND user_id = $2 AND completed = $3
            ORDER BY updated_at DESC, id DESC
            LIMIT 1
            "#
        ))
        .bind(quiz_id)
        .bind(user_id)
        .bind(completed)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(QuizAttempt::from))
    }

    async fn upsert_active_attempt(
        &self,
        quiz_id: i64,
        user_id: i64,
        draft: AttemptDraft,
    ) -> Result<QuizAttempt, AppError> {
        // The partial unique index only covers active rows, so a completed
        // insert never collides and an active one folds into the existing row.
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            r#"
            INSERT INTO quiz_attempts
                (quiz_id, user_id, answers, score, current_question_index, completed, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, CASE WHEN $6 THEN NOW() ELSE NULL END)
            ON CONFLICT (quiz_id, user_id) WHERE NOT completed DO UPDATE SET
                answers = EXCLUDED.answers,
                score = EXCLUDED.score,
                current_question_index = EXCLUDED.current_question_index,
                completed = EXCLUDED.completed,
                completed_at = EXCLUDED.completed_at,
                updated_at = NOW()
            RETURNING {ATTEMPT_COLUMNS}
            "#
        ))
        .bind(quiz_id)
        .bind(user_id)
        .bind(Json(&draft.answers))
        .bind(draft.score)
        .bind(draft.current_question_index as i32)
        .bind(draft.completed)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(quiz_id, user_id, "Failed to upsert quiz attempt: {:?}", e);
            AppError::from(e)
        })?;

        Ok(row.into())
    }

    async fn update_attempt(&self, id: i64, draft: AttemptDraft) -> Result<QuizAttempt, AppError> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            r#"
            UPDATE quiz_attempts SET
                answers = $2,
                score = $3,
                current_question_index = $4,
                completed = $5,
                completed_at = CASE WHEN $5 THEN NOW() ELSE NULL END,
                updated_at = NOW()
            WHERE id = $1 AND NOT completed
            RETURNING {ATTEMPT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(Json(&draft.answers))
        .bind(draft.score)
        .bind(draft.current_question_index as i32)
        .bind(draft.completed)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(attempt_id = id, "Failed to update quiz attempt: {:?}", e);
            AppError::from(e)
        })?;

        match row {
            Some(row) => Ok(row.into()),
            None => match self.get_attempt(id).await? {
                Some(_) => Err(AppError::Conflict("Attempt is already completed".to_string())),
                None => Err(AppError::NotFound("Attempt not found".to_string())),
            },
        }
    }
}
