// src/insights.rs

//! Human-readable performance insights from an external text-generation service.
//!
//! The service is opaque: it receives a correctness summary and returns text.
//! Its failures never reach the caller of [`insights_or_fallback`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    config::INSIGHTS_UNAVAILABLE,
    error::AppError,
    reporting::{ResultsReport, TopicSummary},
};

/// Summarized correctness payload sent to the collaborator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightRequest {
    pub quiz_title: String,
    pub score: i64,
    pub max_score: i64,
    pub total_questions: u32,
    pub topics: Vec<TopicSummary>,
    pub answers: Vec<AnswerCorrectness>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerCorrectness {
    pub question: String,
    pub topic: String,
    pub answered: bool,
    pub correct: bool,
}

impl From<&ResultsReport> for InsightRequest {
    fn from(report: &ResultsReport) -> Self {
        Self {
            quiz_title: report.title.clone(),
            score: report.score,
            max_score: report.max_score,
            total_questions: report.total_questions,
            topics: report.topics.clone(),
            answers: report
                .questions
                .iter()
                .map(|q| AnswerCorrectness {
                    question: q.question.clone(),
                    topic: q.topic.clone(),
                    answered: q.selected.is_some(),
                    correct: q.is_correct,
                })
                .collect(),
        }
    }
}

#[async_trait]
pub trait InsightsProvider: Send + Sync {
    async fn generate(&self, request: &InsightRequest) -> Result<String, AppError>;
}

/// Used when no collaborator is configured.
pub struct DisabledInsights;

#[async_trait]
impl InsightsProvider for DisabledInsights {
    async fn generate(&self, _request: &InsightRequest) -> Result<String, AppError> {
        Err(AppError::NotFound("Insights are not configured".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct InsightResponse {
    text: String,
}

/// Posts the summary as JSON and expects `{"text": "..."}` back.
pub struct HttpInsights {
    client: reqwest::Client,
    url: Url,
}

impl HttpInsights {
    pub fn new(url: Url) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl InsightsProvider for HttpInsights {
    async fn generate(&self, request: &InsightRequest) -> Result<String, AppError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(request)
            .send()
            .await?
            .error_for_status()?;

        let body: InsightResponse = response.json().await?;
        Ok(body.text)
    }
}

/// Never fails: any collaborator error degrades to a neutral message.
pub async fn insights_or_fallback(provider: &dyn InsightsProvider, report: &ResultsReport) -> String {
    match provider.generate(&InsightRequest::from(report)).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => INSIGHTS_UNAVAILABLE.to_string(),
        Err(e) => {
            tracing::debug!(attempt_id = report.attempt_id, "Insights unavailable: {}", e);
            INSIGHTS_UNAVAILABLE.to_string()
        }
    }
}
