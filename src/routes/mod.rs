//! Router assembly: HTTP endpoints, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers) – adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/api/v1/health", get(http::http_health))
        // Accounts
        .route("/api/v1/auth/signup", post(http::http_signup))
        .route("/api/v1/auth/login", post(http::http_login))
        .route("/api/v1/auth/logout", post(http::http_logout))
        // Q&A chat
        .route("/api/v1/tutor/ask", post(http::http_ask))
        // Quiz mode
        .route("/api/v1/quiz/new", post(http::http_quiz_new))
        .route("/api/v1/quiz/answer", post(http::http_quiz_answer))
        // Flashcard mode
        .route("/api/v1/flashcard/new", post(http::http_flashcard_new))
        .route("/api/v1/flashcard/reveal", post(http::http_flashcard_reveal))
        .route("/api/v1/flashcard/review", post(http::http_flashcard_review))
        // Progress
        .route("/api/v1/progress", get(http::http_progress))
        .route("/api/v1/progress/reset", post(http::http_progress_reset))
        // Billing
        .route("/api/v1/billing/checkout", post(http::http_checkout))
        .route("/api/v1/billing/webhook", post(http::http_webhook))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}
