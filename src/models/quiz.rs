// src/models/quiz.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::question::{CreateQuestionRequest, Question};

/// How the countdown of an attempt is run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuizMode {
    /// One countdown for the whole attempt.
    #[default]
    Full,
    /// A short countdown per question (1v1 / practice rounds).
    Practice,
}

impl QuizMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizMode::Full => "full",
            QuizMode::Practice => "practice",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "full" => Some(QuizMode::Full),
            "practice" => Some(QuizMode::Practice),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub mode: QuizMode,
    pub questions: Vec<Question>,
    pub created_by: i64,
    pub created_at: Option<DateTime<Utc>>,
}

impl Quiz {
    pub fn total_questions(&self) -> u32 {
        self.questions.len() as u32
    }

    pub fn question(&self, index: u32) -> Option<&Question> {
        self.questions.get(index as usize)
    }
}

/// Store input for a new quiz.
#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub title: String,
    pub mode: QuizMode,
    pub questions: Vec<Question>,
    pub created_by: i64,
}

/// DTO for creating a quiz.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub mode: QuizMode,
    #[validate(length(min = 1, max = 200))]
    #[validate(nested)]
    pub questions: Vec<CreateQuestionRequest>,
}
