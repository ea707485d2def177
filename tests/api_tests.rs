// tests/api_tests.rs

mod common;

use std::sync::Arc;

use axum::{Json, Router, routing::post};
use common::{spawn_app, spawn_app_with};
use quiz_room::{
    attempt::{AttemptController, HttpSession, Phase, RoomSink, SelectOutcome, TimerSettings},
    config::INSIGHTS_UNAVAILABLE,
    insights::HttpInsights,
    models::attempt::{AnswerMap, AttemptResponse},
    room::RoomEvent,
    utils::jwt::{ResultClaims, encode_result_claims},
};
use serde_json::{Value, json};

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn create_quiz_requires_elevated_role() {
    // Arrange
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let body = json!({
        "title": "Borrowing",
        "questions": [{"question": "Q", "options": ["a", "b"], "correctAnswer": 0}]
    });

    // Act
    let anonymous = client.post(app.url("/api/quiz")).json(&body).send().await.unwrap();
    let student = client
        .post(app.url("/api/quiz"))
        .bearer_auth(app.token(7, "student"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let faculty = client
        .post(app.url("/api/quiz"))
        .bearer_auth(app.token(2, "faculty"))
        .json(&body)
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(anonymous.status().as_u16(), 401);
    assert_eq!(student.status().as_u16(), 403);
    assert_eq!(faculty.status().as_u16(), 201);
    let quiz: Value = faculty.json().await.unwrap();
    assert_eq!(quiz["mode"], "full");
    assert_eq!(quiz["createdBy"], 2);
}

#[tokio::test]
async fn create_quiz_fails_validation() {
    // Arrange
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = app.token(1, "admin");

    // Act: a single option, then an out-of-range answer key
    let one_option = client
        .post(app.url("/api/quiz"))
        .bearer_auth(&token)
        .json(&json!({
            "title": "Traits",
            "questions": [{"question": "Q", "options": ["only"], "correctAnswer": 0}]
        }))
        .send()
        .await
        .unwrap();
    let bad_key = client
        .post(app.url("/api/quiz"))
        .bearer_auth(&token)
        .json(&json!({
            "title": "Traits",
            "questions": [{"question": "Q", "options": ["a", "b"], "correctAnswer": 5}]
        }))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(one_option.status().as_u16(), 400);
    assert_eq!(bad_key.status().as_u16(), 400);
}

#[tokio::test]
async fn quiz_text_is_sanitized() {
    // Arrange
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .post(app.url("/api/quiz"))
        .bearer_auth(app.token(1, "instructor"))
        .json(&json!({
            "title": "<script>alert(1)</script>Macros",
            "questions": [{"question": "Q", "options": ["a", "b"], "correctAnswer": 1}]
        }))
        .send()
        .await
        .unwrap();

    // Assert
    let quiz: Value = response.json().await.unwrap();
    assert_eq!(quiz["title"], "Macros");
}

#[tokio::test]
async fn get_quiz_returns_questions() {
    // Arrange
    let app = spawn_app().await;
    let quiz = app.create_quiz(&[1, 0, 2], "practice").await;
    let client = reqwest::Client::new();

    // Act
    let found = client
        .get(app.url(&format!("/api/quiz/{}", quiz["id"])))
        .bearer_auth(app.token(7, "student"))
        .send()
        .await
        .unwrap();
    let missing = client
        .get(app.url("/api/quiz/9999"))
        .bearer_auth(app.token(7, "student"))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(found.status().as_u16(), 200);
    let body: Value = found.json().await.unwrap();
    assert_eq!(body["mode"], "practice");
    assert_eq!(body["questions"].as_array().unwrap().len(), 3);
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn attempt_lifecycle_and_result_token() {
    // Arrange
    let app = spawn_app().await;
    let quiz = app.create_quiz(&[1, 0, 2], "full").await;
    let quiz_id = quiz["id"].as_i64().unwrap();
    let client = reqwest::Client::new();
    let token = app.token(7, "student");

    // Act & Assert: nothing to resume yet
    let none = client
        .get(app.url(&format!("/api/quizzes/reports/{quiz_id}/latest")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(none.status().as_u16(), 404);

    // A client score that disagrees with the answers is replaced
    let created: Value = client
        .post(app.url("/api/quizzes/reports"))
        .bearer_auth(&token)
        .json(&json!({"quizId": quiz_id, "score": 500, "answers": {"0": 1}, "currentQuestionIndex": 1}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(created["score"], 10);
    assert_eq!(created["completed"], false);
    assert!(created.get("resultToken").is_none());
    let attempt_id = created["id"].as_i64().unwrap();

    // A second POST while active reuses the same attempt
    let again: Value = client
        .post(app.url("/api/quizzes/reports"))
        .bearer_auth(&token)
        .json(&json!({"quizId": quiz_id, "score": 10, "answers": {"0": 1, "1": 2}}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(again["id"].as_i64(), Some(attempt_id));

    let latest: Value = client
        .get(app.url(&format!("/api/quizzes/reports/{quiz_id}/latest")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(latest["answers"], json!({"0": 1, "1": 2}));

    // Completing returns a result token
    let done: Value = client
        .put(app.url(&format!("/api/quizzes/reports/{attempt_id}")))
        .bearer_auth(&token)
        .json(&json!({
            "quizId": quiz_id,
            "score": 20,
            "answers": {"0": 1, "1": 2, "2": 2},
            "currentQuestionIndex": 2,
            "completed": true
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(done["completed"], true);
    assert_eq!(done["score"], 20);
    let result_token = done["resultToken"].as_str().unwrap().to_string();

    // Completed attempts are read-only and no longer resumable
    let conflict = client
        .put(app.url(&format!("/api/quizzes/reports/{attempt_id}")))
        .bearer_auth(&token)
        .json(&json!({"quizId": quiz_id, "score": 30, "answers": {"0": 1}}))
        .send()
        .await
        .unwrap();
    assert_eq!(conflict.status().as_u16(), 409);
    let gone = client
        .get(app.url(&format!("/api/quizzes/reports/{quiz_id}/latest")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status().as_u16(), 404);

    // The token resolves without a bearer header
    let report: Value = client
        .get(app.url(&format!("/api/quizzes/results/{result_token}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report["attemptId"].as_i64(), Some(attempt_id));
    assert_eq!(report["correct"], 2);
    assert_eq!(report["incorrect"], 1);
    assert_eq!(report["maxScore"], 30);
    assert_eq!(report["insights"], INSIGHTS_UNAVAILABLE);

    // Fallback report from the latest completed attempt
    let fallback: Value = client
        .get(app.url(&format!("/api/quizzes/reports/{quiz_id}/results")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fallback["attemptId"].as_i64(), Some(attempt_id));
    assert_eq!(fallback["score"], 20);
}

#[tokio::test]
async fn attempts_of_other_users_are_hidden() {
    // Arrange
    let app = spawn_app().await;
    let quiz = app.create_quiz(&[0, 0], "full").await;
    let quiz_id = quiz["id"].as_i64().unwrap();
    let client = reqwest::Client::new();

    let created: Value = client
        .post(app.url("/api/quizzes/reports"))
        .bearer_auth(app.token(7, "student"))
        .json(&json!({"quizId": quiz_id, "score": 0, "answers": {}}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Act
    let response = client
        .put(app.url(&format!("/api/quizzes/reports/{}", created["id"])))
        .bearer_auth(app.token(8, "student"))
        .json(&json!({"quizId": quiz_id, "score": 10, "answers": {"0": 0}}))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn expired_or_forged_result_tokens_are_rejected() {
    // Arrange
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let expired = encode_result_claims(
        &ResultClaims {
            sub: "7".to_string(),
            attempt_id: 1,
            quiz_id: 1,
            exp: (chrono::Utc::now().timestamp() - 3600) as usize,
        },
        &app.config.jwt_secret,
    )
    .unwrap();

    // Act
    let expired = client
        .get(app.url(&format!("/api/quizzes/results/{expired}")))
        .send()
        .await
        .unwrap();
    let forged = client
        .get(app.url("/api/quizzes/results/not-a-token"))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(expired.status().as_u16(), 401);
    assert_eq!(forged.status().as_u16(), 401);
}

#[tokio::test]
async fn insights_come_from_the_collaborator() {
    // Arrange: a stand-in text-generation service
    let insights_router = Router::new().route(
        "/insights",
        post(|Json(body): Json<Value>| async move {
            Json(json!({"text": format!("Solid work on {}", body["quizTitle"].as_str().unwrap_or(""))}))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, insights_router).await.unwrap();
    });
    let url = format!("http://127.0.0.1:{port}/insights").parse().unwrap();
    let app = spawn_app_with(Arc::new(HttpInsights::new(url).unwrap())).await;

    let quiz = app.create_quiz(&[2], "full").await;
    let client = reqwest::Client::new();
    let token = app.token(7, "student");
    client
        .post(app.url("/api/quizzes/reports"))
        .bearer_auth(&token)
        .json(&json!({"quizId": quiz["id"], "score": 10, "answers": {"0": 2}, "completed": true}))
        .send()
        .await
        .unwrap();

    // Act
    let report: Value = client
        .get(app.url(&format!("/api/quizzes/reports/{}/results", quiz["id"])))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(report["insights"], "Solid work on Rust basics");
}

#[tokio::test]
async fn controller_drives_the_rest_surface() {
    // Arrange
    let app = spawn_app().await;
    let quiz = app.create_quiz(&[1, 0, 2], "full").await;
    let quiz_id = quiz["id"].as_i64().unwrap();
    let mut events = app.rooms.subscribe(quiz_id).await;

    let session = HttpSession::new(app.url("/api"), app.token(7, "student"));
    let mut controller = AttemptController::new(
        session,
        RoomSink::new(app.rooms.clone()),
        quiz_id,
        7,
        TimerSettings::default(),
    );

    // Act
    controller.load().await.unwrap();
    let first = controller.select_option(1).await.unwrap();
    let repeat = controller.select_option(3).await.unwrap();
    controller.next().await.unwrap();
    controller.select_option(2).await.unwrap();

    // Assert
    assert_eq!(first, SelectOutcome::Applied { correct: true, score: 10 });
    assert_eq!(repeat, SelectOutcome::AlreadyLocked);
    assert_eq!(controller.score(), 10);
    assert!(!controller.save_failed());

    let mut seqs = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let RoomEvent::ScoreUpdated(update) = event.as_ref() {
            seqs.push((update.score, update.seq));
        }
    }
    // A wrong first answer leaves the score alone but is still announced
    assert_eq!(seqs, vec![(10, 1), (10, 2)]);

    // A fresh controller resumes the persisted attempt
    let mut resumed = AttemptController::new(
        HttpSession::new(app.url("/api"), app.token(7, "student")),
        RoomSink::new(app.rooms.clone()),
        quiz_id,
        7,
        TimerSettings::default(),
    );
    resumed.load().await.unwrap();
    assert!(resumed.was_resumed());
    assert_eq!(resumed.current_index(), 1);
    assert!(resumed.is_locked(0) && resumed.is_locked(1));

    let handoff = resumed.submit().await.unwrap();
    assert_eq!(resumed.phase(), Phase::Completed);
    assert_eq!(handoff.score, 10);
    assert!(handoff.result_token.is_some());
}

#[tokio::test]
async fn attempt_writes_decode_into_typed_responses() {
    // Arrange
    let app = spawn_app().await;
    let quiz = app.create_quiz(&[1, 0], "full").await;
    let quiz_id = quiz["id"].as_i64().unwrap();
    let client = reqwest::Client::new();
    let token = app.token(9, "student");

    // Act
    let created: AttemptResponse = client
        .post(app.url("/api/quizzes/reports"))
        .bearer_auth(&token)
        .json(&json!({"quizId": quiz_id, "score": 10, "answers": {"0": 1}}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let completed: AttemptResponse = client
        .put(app.url(&format!("/api/quizzes/reports/{}", created.attempt.id)))
        .bearer_auth(&token)
        .json(&json!({"quizId": quiz_id, "score": 10, "answers": {"0": 1, "1": 0}, "completed": true}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(created.attempt.answers, AnswerMap::from([(0, 1)]));
    assert!(created.result_token.is_none());
    assert_eq!(completed.attempt.id, created.attempt.id);
    assert_eq!(completed.attempt.answers, AnswerMap::from([(0, 1), (1, 0)]));
    assert_eq!(completed.attempt.score, 20);
    assert!(completed.result_token.is_some());
}

#[tokio::test]
async fn controller_submit_without_answers_over_http() {
    // Arrange
    let app = spawn_app().await;
    let quiz = app.create_quiz(&[1, 0], "full").await;
    let quiz_id = quiz["id"].as_i64().unwrap();
    let token = app.token(12, "student");
    let mut controller = AttemptController::new(
        HttpSession::new(app.url("/api"), token.clone()),
        RoomSink::new(app.rooms.clone()),
        quiz_id,
        12,
        TimerSettings::default(),
    );

    // Act
    controller.load().await.unwrap();
    let handoff = controller.submit().await.unwrap();

    // Assert
    assert!(!controller.save_failed());
    assert_eq!(Some(handoff.attempt_id), controller.attempt_id());
    let latest = reqwest::Client::new()
        .get(app.url(&format!("/api/quizzes/reports/{quiz_id}/latest")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(latest.status().as_u16(), 404);
}
