// src/reporting.rs

//! Read-only view of a finished attempt. Everything here is derived from the
//! quiz definition and the answer map; nothing is mutated.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    attempt::scoring::audit_score,
    config::POINTS_PER_CORRECT,
    models::{attempt::QuizAttempt, quiz::Quiz},
};

/// Topic used for questions that do not name one.
pub const DEFAULT_TOPIC: &str = "General";

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub index: u32,
    pub question: String,
    pub options: Vec<String>,
    pub selected: Option<u32>,
    pub correct_answer: u32,
    pub is_correct: bool,
    pub topic: String,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopicSummary {
    pub topic: String,
    pub total: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub unanswered: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultsReport {
    pub attempt_id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    pub title: String,
    pub score: i64,
    pub max_score: i64,
    pub percentage: f64,
    pub total_questions: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub unanswered: u32,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub questions: Vec<QuestionResult>,
    pub topics: Vec<TopicSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<String>,
}

impl ResultsReport {
    pub fn build(quiz: &Quiz, attempt: &QuizAttempt) -> Self {
        let mut questions = Vec::with_capacity(quiz.questions.len());
        let mut topics: BTreeMap<String, TopicSummary> = BTreeMap::new();
        let (mut correct, mut incorrect, mut unanswered) = (0, 0, 0);

        for (index, question) in quiz.questions.iter().enumerate() {
            let index = index as u32;
            let selected = attempt.answers.get(&index).copied();
            let is_correct = selected.is_some_and(|o| question.is_correct(o));
            let topic = question
                .topic
                .clone()
                .unwrap_or_else(|| DEFAULT_TOPIC.to_string());

            let summary = topics.entry(topic.clone()).or_insert_with(|| TopicSummary {
                topic: topic.clone(),
                ..Default::default()
            });
            summary.total += 1;
            match (selected, is_correct) {
                (None, _) => {
                    unanswered += 1;
                    summary.unanswered += 1;
                }
                (Some(_), true) => {
                    correct += 1;
                    summary.correct += 1;
                }
                (Some(_), false) => {
                    incorrect += 1;
                    summary.incorrect += 1;
                }
            }

            questions.push(QuestionResult {
                index,
                question: question.question.clone(),
                options: question.options.clone(),
                selected,
                correct_answer: question.correct_answer,
                is_correct,
                topic,
                explanation: question.explanation.clone(),
            });
        }

        let score = audit_score(&attempt.answers, &quiz.questions);
        if score != attempt.score {
            tracing::warn!(
                attempt_id = attempt.id,
                stored = attempt.score,
                audited = score,
                "Stored score differs from answers"
            );
        }

        let total_questions = quiz.total_questions();
        let percentage = if total_questions == 0 {
            0.0
        } else {
            (correct as f64 / total_questions as f64) * 100.0
        };

        Self {
            attempt_id: attempt.id,
            quiz_id: quiz.id,
            user_id: attempt.user_id,
            title: quiz.title.clone(),
            score,
            max_score: total_questions as i64 * POINTS_PER_CORRECT,
            percentage,
            total_questions,
            correct,
            incorrect,
            unanswered,
            completed: attempt.completed,
            completed_at: attempt.completed_at,
            questions,
            topics: topics.into_values().collect(),
            insights: None,
        }
    }
}
