// src/attempt/controller.rs

//! Drives one participant through a quiz.
//!
//! ```text
//! Loading ──load()──▶ InProgress ──submit() / countdown──▶ Completed
//! ```
//!
//! Every answer goes lock → score → persist → broadcast, in that order.
//! Persistence failures never roll back local state; they only raise the
//! `save_failed` indicator.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, watch};

use super::{
    countdown::{Countdown, TimerSettings},
    scoring::score_delta,
    session::{AttemptSession, ScoreSink},
};
use crate::{
    error::AppError,
    models::{
        attempt::{AnswerMap, AttemptResponse, SaveAttemptRequest},
        question::Question,
        quiz::{Quiz, QuizMode},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    Applied { correct: bool, score: i64 },
    /// The question was already answered; nothing changed.
    AlreadyLocked,
}

/// What the results view needs once the attempt is finished.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultHandoff {
    pub attempt_id: i64,
    pub quiz_id: i64,
    pub title: String,
    pub score: i64,
    pub total_questions: u32,
    pub answers: AnswerMap,
    pub questions: Vec<Question>,
    pub completed_at: DateTime<Utc>,
    pub result_token: Option<String>,
}

pub struct AttemptController<S, R> {
    session: S,
    sink: R,
    quiz_id: i64,
    user_id: i64,
    timers: TimerSettings,

    phase: Phase,
    quiz: Option<Quiz>,
    attempt_id: Option<i64>,
    answers: AnswerMap,
    locked: BTreeSet<u32>,
    score: i64,
    current: u32,
    countdown: Countdown,
    save_failed: bool,
    resumed: bool,
}

impl<S: AttemptSession, R: ScoreSink> AttemptController<S, R> {
    pub fn new(session: S, sink: R, quiz_id: i64, user_id: i64, timers: TimerSettings) -> Self {
        Self {
            session,
            sink,
            quiz_id,
            user_id,
            timers,
            phase: Phase::Loading,
            quiz: None,
            attempt_id: None,
            answers: AnswerMap::new(),
            locked: BTreeSet::new(),
            score: 0,
            current: 0,
            countdown: Countdown::new(timers.attempt_secs),
            save_failed: false,
            resumed: false,
        }
    }

    /// Fetches the quiz and, when one exists, the active attempt to resume.
    ///
    /// No interaction is accepted until this has succeeded. On failure the
    /// controller stays in `Loading` and `load` may be called again.
    pub async fn load(&mut self) -> Result<(), AppError> {
        if self.phase != Phase::Loading {
            return Ok(());
        }

        let quiz = self.session.fetch_quiz(self.quiz_id).await?;
        let latest = self.session.latest_attempt(self.quiz_id).await?;

        if let Some(attempt) = latest.filter(|a| !a.completed) {
            let last = quiz.total_questions().saturating_sub(1);
            self.attempt_id = Some(attempt.id);
            self.locked = attempt.answers.keys().copied().collect();
            self.answers = attempt.answers;
            self.score = attempt.score;
            self.current = attempt.current_question_index.min(last);
            self.resumed = true;
            tracing::info!(
                quiz_id = self.quiz_id,
                user_id = self.user_id,
                attempt_id = attempt.id,
                answered = self.locked.len(),
                "Resuming attempt"
            );
        }

        self.countdown = Countdown::new(self.timers.for_mode(quiz.mode));
        self.quiz = Some(quiz);
        self.phase = Phase::InProgress;
        Ok(())
    }

    fn in_progress(&self) -> Result<&Quiz, AppError> {
        match (self.phase, &self.quiz) {
            (Phase::InProgress, Some(quiz)) => Ok(quiz),
            (Phase::Completed, _) => Err(AppError::Conflict(
                "Attempt is already submitted".to_string(),
            )),
            _ => Err(AppError::BadRequest("Attempt is still loading".to_string())),
        }
    }

    /// Answers the current question with `option` and locks it.
    pub async fn select_option(&mut self, option: u32) -> Result<SelectOutcome, AppError> {
        let quiz = self.in_progress()?;
        let index = self.current;
        let question = quiz
            .question(index)
            .ok_or_else(|| AppError::BadRequest(format!("Question {index} does not exist")))?;

        if !question.has_option(option) {
            return Err(AppError::BadRequest(format!(
                "Option {option} does not exist for question {index}"
            )));
        }

        if self.locked.contains(&index) {
            tracing::debug!(
                quiz_id = self.quiz_id,
                user_id = self.user_id,
                index,
                "Question already answered, selection ignored"
            );
            return Ok(SelectOutcome::AlreadyLocked);
        }

        let correct_answer = question.correct_answer;
        let total_questions = quiz.total_questions();

        self.locked.insert(index);
        let previous = self.answers.insert(index, option);
        self.score += score_delta(previous, option, correct_answer);

        let _ = self.persist(false).await;

        if let Err(e) = self
            .sink
            .update_score(self.quiz_id, self.user_id, self.score, total_questions)
            .await
        {
            tracing::warn!(quiz_id = self.quiz_id, user_id = self.user_id, "Score broadcast failed: {}", e);
        }

        Ok(SelectOutcome::Applied {
            correct: option == correct_answer,
            score: self.score,
        })
    }

    pub async fn next(&mut self) -> Result<u32, AppError> {
        let last = self.in_progress()?.total_questions().saturating_sub(1);
        self.move_to((self.current + 1).min(last)).await
    }

    pub async fn previous(&mut self) -> Result<u32, AppError> {
        self.in_progress()?;
        self.move_to(self.current.saturating_sub(1)).await
    }

    pub async fn jump_to(&mut self, index: u32) -> Result<u32, AppError> {
        if index >= self.in_progress()?.total_questions() {
            return Err(AppError::BadRequest(format!("Question {index} does not exist")));
        }
        self.move_to(index).await
    }

    async fn move_to(&mut self, index: u32) -> Result<u32, AppError> {
        if index == self.current {
            return Ok(index);
        }
        self.current = index;
        if self.mode() == QuizMode::Practice {
            self.countdown.reset();
        }
        // Navigation before the first answer has nothing to save yet.
        if self.attempt_id.is_some() {
            let _ = self.persist(false).await;
        }
        Ok(index)
    }

    /// Persists the final state with `completed: true`.
    ///
    /// `&mut self` keeps submissions from overlapping. Completion is always
    /// written to a known attempt id, so a retried submit can never create a
    /// second completed attempt. On failure the controller stays in progress
    /// with every answer intact so the caller can retry.
    pub async fn submit(&mut self) -> Result<ResultHandoff, AppError> {
        self.in_progress()?;

        if self.attempt_id.is_none() {
            self.persist(false).await?;
        }
        let saved = self.persist(true).await?;
        self.phase = Phase::Completed;

        let quiz = self.quiz.as_ref().ok_or_else(|| {
            AppError::InternalServerError("quiz missing after load".to_string())
        })?;
        tracing::info!(
            quiz_id = self.quiz_id,
            user_id = self.user_id,
            attempt_id = saved.attempt.id,
            score = saved.attempt.score,
            "Attempt submitted"
        );

        Ok(ResultHandoff {
            attempt_id: saved.attempt.id,
            quiz_id: quiz.id,
            title: quiz.title.clone(),
            score: saved.attempt.score,
            total_questions: quiz.total_questions(),
            answers: saved.attempt.answers,
            questions: quiz.questions.clone(),
            completed_at: saved.attempt.completed_at.unwrap_or_else(Utc::now),
            result_token: saved.result_token,
        })
    }

    /// Advances the countdown by one second.
    ///
    /// In a full quiz reaching zero submits. In a practice quiz it moves to
    /// the next question and submits only on the last one. Returns the
    /// handoff when this tick finished the attempt.
    pub async fn tick(&mut self) -> Result<Option<ResultHandoff>, AppError> {
        let Ok(quiz) = self.in_progress() else {
            return Ok(None);
        };
        let on_last = self.current + 1 >= quiz.total_questions();

        if !self.countdown.tick() {
            return Ok(None);
        }

        if self.mode() == QuizMode::Practice && !on_last {
            tracing::debug!(quiz_id = self.quiz_id, index = self.current, "Question timed out");
            self.next().await?;
            return Ok(None);
        }

        tracing::info!(quiz_id = self.quiz_id, user_id = self.user_id, "Countdown expired, submitting");
        self.submit().await.map(Some)
    }

    async fn persist(&mut self, completed: bool) -> Result<AttemptResponse, AppError> {
        let req = SaveAttemptRequest {
            quiz_id: self.quiz_id,
            score: self.score,
            answers: self.answers.clone(),
            current_question_index: Some(self.current),
            completed: Some(completed),
        };

        let result = match self.attempt_id {
            None => self.session.create_attempt(&req).await,
            Some(id) => self.session.update_attempt(id, &req).await,
        };

        match result {
            Ok(saved) => {
                self.attempt_id = Some(saved.attempt.id);
                self.save_failed = false;
                Ok(saved)
            }
            Err(e) => {
                tracing::warn!(
                    quiz_id = self.quiz_id,
                    user_id = self.user_id,
                    completed,
                    "Saving attempt failed: {}",
                    e
                );
                self.save_failed = true;
                Err(e)
            }
        }
    }

    fn mode(&self) -> QuizMode {
        self.quiz.as_ref().map(|q| q.mode).unwrap_or_default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn quiz(&self) -> Option<&Quiz> {
        self.quiz.as_ref()
    }

    pub fn attempt_id(&self) -> Option<i64> {
        self.attempt_id
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn current_index(&self) -> u32 {
        self.current
    }

    pub fn is_locked(&self, index: u32) -> bool {
        self.locked.contains(&index)
    }

    pub fn locked(&self) -> &BTreeSet<u32> {
        &self.locked
    }

    pub fn remaining_secs(&self) -> u32 {
        self.countdown.remaining()
    }

    pub fn save_failed(&self) -> bool {
        self.save_failed
    }

    pub fn was_resumed(&self) -> bool {
        self.resumed
    }
}

/// Ticks the controller once per second until it completes, its countdown
/// expires, or `stop` flips to true (e.g. the participant navigated away).
pub async fn run_countdown<S, R>(
    controller: Arc<Mutex<AttemptController<S, R>>>,
    mut stop: watch::Receiver<bool>,
) -> Option<ResultHandoff>
where
    S: AttemptSession,
    R: ScoreSink,
{
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    // The first tick of an interval completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let mut controller = controller.lock().await;
                match controller.tick().await {
                    Ok(Some(handoff)) => return Some(handoff),
                    Ok(None) if controller.phase() != Phase::InProgress => return None,
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!("Forced submission failed: {}", e);
                        return None;
                    }
                }
                if controller.countdown.is_expired() {
                    return None;
                }
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    tracing::debug!("Countdown stopped");
                    return None;
                }
            }
        }
    }
}
