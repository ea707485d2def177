// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempt, quiz, results, room},
    openapi::openapi_json,
    state::AppState,
    utils::jwt::{auth_middleware, elevated_middleware},
};

/// Assembles the main application router.
///
/// * Quiz authoring is restricted to elevated roles.
/// * Attempt, results and room reads require a bearer token.
/// * Result tokens and the room socket authenticate themselves.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let quiz_routes = Router::new()
        .route("/{id}", get(quiz::get_quiz))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .merge(
            Router::new()
                .route("/", post(quiz::create_quiz))
                // Auth first, then the role check
                .layer(middleware::from_fn(elevated_middleware))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let protected_routes = Router::new()
        .route("/reports", post(attempt::create_attempt))
        .route("/reports/{id}", put(attempt::update_attempt))
        // `{id}` is the quiz id below; the segment name is shared with the update route
        .route("/reports/{id}/latest", get(attempt::latest_attempt))
        .route("/reports/{id}/results", get(results::latest_results))
        .route("/{quiz_id}/participants", get(room::participants))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let quizzes_routes = Router::new()
        .route("/results/{token}", get(results::results_by_token))
        .route("/{quiz_id}/room", get(room::room_socket))
        .merge(protected_routes);

    Router::new()
        .nest("/api/quiz", quiz_routes)
        .nest("/api/quizzes", quizzes_routes)
        .route("/api/openapi.json", get(openapi_json))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
