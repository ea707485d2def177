// src/config.rs

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;
use url::Url;

/// Points awarded for every correctly answered question.
pub const POINTS_PER_CORRECT: i64 = 10;

/// Roles allowed to start a quiz for the whole room and to author quizzes.
pub const ELEVATED_ROLES: &[&str] = &["admin", "superadmin", "instructor", "faculty"];

/// How often idle rooms are swept from the registry, in seconds.
pub const ROOM_SWEEP_INTERVAL_SECS: u64 = 60;

/// Fallback text when the insights collaborator cannot produce anything.
pub const INSIGHTS_UNAVAILABLE: &str = "Insights are unavailable right now.";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: String,

    /// Lifetime of the result token handed out on submission, in seconds.
    pub result_token_ttl: u64,

    /// Countdown for a full attempt, in seconds.
    pub attempt_duration_secs: u32,

    /// Per-question countdown for practice quizzes, in seconds.
    pub practice_question_secs: u32,

    /// Buffered events per room subscriber before it starts lagging.
    pub room_channel_capacity: usize,

    /// Endpoint of the text-generation collaborator. Insights are disabled when unset.
    pub insights_url: Option<Url>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let insights_url = match env::var("INSIGHTS_URL") {
            Ok(raw) if !raw.trim().is_empty() => match Url::parse(&raw) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!("Ignoring invalid INSIGHTS_URL {:?}: {}", raw, e);
                    None
                }
            },
            _ => None,
        };

        Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            result_token_ttl: env_or("RESULT_TOKEN_TTL", 900),
            attempt_duration_secs: env_or("ATTEMPT_DURATION_SECS", 600),
            practice_question_secs: env_or("PRACTICE_QUESTION_SECS", 15),
            room_channel_capacity: env_or("ROOM_CHANNEL_CAPACITY", 64),
            insights_url,
        }
    }

    /// Configuration suitable for tests and local tooling.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            database_url: String::new(),
            jwt_secret: jwt_secret.to_string(),
            rust_log: "error".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            result_token_ttl: 900,
            attempt_duration_secs: 600,
            practice_question_secs: 15,
            room_channel_capacity: 64,
            insights_url: None,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("{} is not a valid value, using the default", key);
            default
        }),
        Err(_) => default,
    }
}

pub fn is_elevated(role: &str) -> bool {
    ELEVATED_ROLES.contains(&role)
}
