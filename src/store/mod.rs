// src/store/mod.rs

//! Persistence of quizzes and quiz attempts.
//!
//! Handlers and the attempt controller only see the [`SessionStore`] trait.
//! `PgSessionStore` is what the server runs on; `MemorySessionStore` backs
//! tests and local tooling.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptDraft, QuizAttempt},
        quiz::{NewQuiz, Quiz},
    },
};

pub use memory::MemorySessionStore;
pub use postgres::PgSessionStore;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_quiz(&self, quiz: NewQuiz) -> Result<Quiz, AppError>;

    async fn get_quiz(&self, id: i64) -> Result<Option<Quiz>, AppError>;

    async fn get_attempt(&self, id: i64) -> Result<Option<QuizAttempt>, AppError>;

    /// Most recently touched attempt of `user_id` on `quiz_id` with the given completion flag.
    async fn latest_attempt(
        &self,
        quiz_id: i64,
        user_id: i64,
        completed: bool,
    ) -> Result<Option<QuizAttempt>, AppError>;

    /// Creates an attempt, or overwrites the active one when (quiz, user) already has one.
    async fn upsert_active_attempt(
        &self,
        quiz_id: i64,
        user_id: i64,
        draft: AttemptDraft,
    ) -> Result<QuizAttempt, AppError>;

    /// Overwrites an attempt. Returns `Conflict` when it is already completed.
    async fn update_attempt(&self, id: i64, draft: AttemptDraft) -> Result<QuizAttempt, AppError>;
}
