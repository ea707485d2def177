// src/openapi.rs

use axum::{Json, response::IntoResponse};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{
    handlers,
    models::{
        attempt::{AttemptResponse, QuizAttempt, SaveAttemptRequest},
        question::{CreateQuestionRequest, Question},
        quiz::{CreateQuizRequest, Quiz, QuizMode},
    },
    reporting::{QuestionResult, ResultsReport, TopicSummary},
    room::{RoomParticipant, ScoreUpdate},
};

struct SecurityAddon;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::quiz::create_quiz,
        handlers::quiz::get_quiz,
        handlers::attempt::latest_attempt,
        handlers::attempt::create_attempt,
        handlers::attempt::update_attempt,
        handlers::results::results_by_token,
        handlers::results::latest_results,
        handlers::room::room_socket,
        handlers::room::participants,
    ),
    components(schemas(
        Quiz,
        QuizMode,
        Question,
        CreateQuizRequest,
        CreateQuestionRequest,
        QuizAttempt,
        SaveAttemptRequest,
        AttemptResponse,
        ResultsReport,
        QuestionResult,
        TopicSummary,
        RoomParticipant,
        ScoreUpdate,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "quiz", description = "Quiz definitions"),
        (name = "attempts", description = "Attempt persistence and resume"),
        (name = "results", description = "Results and insights"),
        (name = "room", description = "Live quiz room"),
    )
)]
pub struct ApiDoc;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Serves the generated OpenAPI document.
pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
