//! Web server module for handling inbound webhooks.
//!
//! - `POST /bounce`: permanent failure events (JSON)
//! - `POST /mailinglist`: stored-message notifications (form-encoded)
//! - `GET /health`

pub mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    bounce_webhook, health, mailing_list_webhook, AppState, HealthResponse, WebhookResponse,
};

/// Build the application router with a bounded request body.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/bounce", post(bounce_webhook))
        .route("/mailinglist", post(mailing_list_webhook))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
