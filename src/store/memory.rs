// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::SessionStore;
use crate::{
    error::AppError,
    models::{
        attempt::{AttemptDraft, QuizAttempt},
        quiz::{NewQuiz, Quiz},
    },
};

#[derive(Default)]
struct Tables {
    quizzes: HashMap<i64, Quiz>,
    attempts: HashMap<i64, QuizAttempt>,
    next_quiz_id: i64,
    next_attempt_id: i64,
}

/// Process-local store with the same semantics as the Postgres tables.
#[derive(Default)]
pub struct MemorySessionStore {
    tables: RwLock<Tables>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply(attempt: &mut QuizAttempt, draft: AttemptDraft) {
    let now = Utc::now();
    attempt.answers = draft.answers;
    attempt.score = draft.score;
    attempt.current_question_index = draft.current_question_index;
    attempt.completed = draft.completed;
    attempt.completed_at = draft.completed.then_some(now);
    attempt.updated_at = Some(now);
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_quiz(&self, quiz: NewQuiz) -> Result<Quiz, AppError> {
        let mut tables = self.tables.write().await;
        tables.next_quiz_id += 1;
        let quiz = Quiz {
            id: tables.next_quiz_id,
            title: quiz.title,
            mode: quiz.mode,
            questions: quiz.questions,
            created_by: quiz.created_by,
            created_at: Some(Utc::now()),
        };
        tables.quizzes.insert(quiz.id, quiz.clone());
        Ok(quiz)
    }

    async fn get_quiz(&self, id: i64) -> Result<Option<Quiz>, AppError> {
        Ok(self.tables.read().await.quizzes.get(&id).cloned())
    }

    async fn get_attempt(&self, id: i64) -> Result<Option<QuizAttempt>, AppError> {
        Ok(self.tables.read().await.attempts.get(&id).cloned())
    }

    async fn latest_attempt(
        &self,
        quiz_id: i64,
        user_id: i64,
        completed: bool,
    ) -> Result<Option<QuizAttempt>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .attempts
            .values()
            .filter(|a| a.quiz_id == quiz_id && a.user_id == user_id && a.completed == completed)
            .max_by_key(|a| (a.updated_at, a.id))
            .cloned())
    }

    async fn upsert_active_attempt(
        &self,
        quiz_id: i64,
        user_id: i64,
        draft: AttemptDraft,
    ) -> Result<QuizAttempt, AppError> {
        let mut tables = self.tables.write().await;

        if let Some(active) = tables
            .attempts
            .values_mut()
            .find(|a| a.quiz_id == quiz_id && a.user_id == user_id && !a.completed)
        {
            apply(active, draft);
            return Ok(active.clone());
        }

        tables.next_attempt_id += 1;
        let now = Utc::now();
        let mut attempt = QuizAttempt {
            id: tables.next_attempt_id,
            quiz_id,
            user_id,
            answers: Default::default(),
            score: 0,
            current_question_index: 0,
            completed: false,
            completed_at: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        apply(&mut attempt, draft);
        tables.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn update_attempt(&self, id: i64, draft: AttemptDraft) -> Result<QuizAttempt, AppError> {
        let mut tables = self.tables.write().await;
        let attempt = tables
            .attempts
            .get_mut(&id)
            .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

        if attempt.completed {
            return Err(AppError::Conflict("Attempt is already completed".to_string()));
        }

        apply(attempt, draft);
        Ok(attempt.clone())
    }
}
