// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;

use quiz_room::{
    config::Config,
    insights::{DisabledInsights, InsightsProvider},
    room::RoomRegistry,
    routes,
    state::AppState,
    store::MemorySessionStore,
    utils::jwt::{Identity, sign_jwt},
};
use serde_json::{Value, json};

pub const SECRET: &str = "test_secret_for_integration_tests";

pub struct TestApp {
    /// Base URL, e.g. "http://127.0.0.1:12345".
    pub address: String,
    pub config: Config,
    pub rooms: Arc<RoomRegistry>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("{}{}", self.address.replacen("http://", "ws://", 1), path)
    }

    pub fn token(&self, id: i64, role: &str) -> String {
        let identity = Identity {
            id,
            name: format!("user-{id}"),
            role: role.to_string(),
        };
        sign_jwt(&identity, &self.config.jwt_secret, 600).expect("Failed to sign token")
    }

    /// Creates a quiz as an instructor. `keys` are the correct option per question.
    pub async fn create_quiz(&self, keys: &[u32], mode: &str) -> Value {
        let questions: Vec<Value> = keys
            .iter()
            .enumerate()
            .map(|(i, key)| {
                json!({
                    "question": format!("Question {}", i + 1),
                    "options": ["A", "B", "C", "D"],
                    "correctAnswer": key,
                    "topic": if i % 2 == 0 { Some("Ownership") } else { None },
                })
            })
            .collect();

        let response = reqwest::Client::new()
            .post(self.url("/api/quiz"))
            .bearer_auth(self.token(1, "instructor"))
            .json(&json!({"title": "Rust basics", "mode": mode, "questions": questions}))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.expect("Quiz body")
    }
}

/// Spawns the app on a random port with the in-memory store.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(Arc::new(DisabledInsights)).await
}

pub async fn spawn_app_with(insights: Arc<dyn InsightsProvider>) -> TestApp {
    let config = Config::for_tests(SECRET);
    let state = AppState::new(config.clone(), Arc::new(MemorySessionStore::new()), insights);
    let rooms = state.rooms.clone();

    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        config,
        rooms,
    }
}
