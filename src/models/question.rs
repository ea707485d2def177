// src/models/question.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{error::AppError, utils::html::clean_html};

/// One multiple-choice question of a quiz.
/// Immutable once the quiz has been created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// The text content of the question.
    pub question: String,

    /// Ordered list of options (e.g., ["Option A", "Option B"]).
    pub options: Vec<String>,

    /// Index into `options` of the correct answer.
    pub correct_answer: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    /// Explanation of the correct answer, shown on the results page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Question {
    pub fn is_correct(&self, option: u32) -> bool {
        self.correct_answer == option
    }

    pub fn has_option(&self, option: u32) -> bool {
        (option as usize) < self.options.len()
    }
}

/// DTO for creating a new question.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub question: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    pub correct_answer: u32,
    #[validate(length(min = 1, max = 100))]
    pub topic: Option<String>,
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
}

impl CreateQuestionRequest {
    /// Checks cross-field constraints and sanitizes text for display.
    pub fn into_question(self) -> Result<Question, AppError> {
        if self.correct_answer as usize >= self.options.len() {
            return Err(AppError::BadRequest(format!(
                "correctAnswer {} is out of range for {} options",
                self.correct_answer,
                self.options.len()
            )));
        }

        Ok(Question {
            question: clean_html(&self.question),
            options: self.options.iter().map(|o| clean_html(o)).collect(),
            correct_answer: self.correct_answer,
            topic: self.topic.map(|t| clean_html(&t)),
            explanation: self.explanation.map(|e| clean_html(&e)),
        })
    }
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 {
        return Err(validator::ValidationError::new("at_least_two_options"));
    }
    for opt in options {
        if opt.is_empty() || opt.len() > 500 {
            return Err(validator::ValidationError::new("option_length"));
        }
    }
    Ok(())
}
