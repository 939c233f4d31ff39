//! Webhook endpoint handlers.
//!
//! Each handler parses its payload, runs the matching processor inline and
//! reports what happened. Malformed payloads are answered with 406 so the
//! provider does not retry them; everything else is a 200.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::FormRejection, Form, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::process::{
    handle_bounce, relay_list_message, BounceEvent, ListForm, ListMessage, NoticeDefaults,
    Outcome,
};
use crate::provider::MailProvider;
use crate::registry::{DomainRegistry, ListRegistry};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn MailProvider>,
    pub domains: Arc<DomainRegistry>,
    pub lists: Arc<ListRegistry>,
    pub defaults: Arc<NoticeDefaults>,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn MailProvider>,
        domains: DomainRegistry,
        lists: ListRegistry,
        defaults: NoticeDefaults,
    ) -> Self {
        Self {
            provider,
            domains: Arc::new(domains),
            lists: Arc::new(lists),
            defaults: Arc::new(defaults),
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Webhook response.
#[derive(Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
}

impl From<Outcome> for WebhookResponse {
    fn from(outcome: Outcome) -> Self {
        Self {
            status: outcome.as_str(),
        }
    }
}

fn malformed() -> (StatusCode, Json<WebhookResponse>) {
    (
        StatusCode::NOT_ACCEPTABLE,
        Json(WebhookResponse { status: "malformed" }),
    )
}

// =============================================================================
// Bounce Webhook
// =============================================================================

/// Permanent failure webhook endpoint (JSON body).
pub async fn bounce_webhook(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    info!(body_length = body.len(), "bounce_webhook_received");

    let event = match BounceEvent::from_json(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "bounce_webhook_malformed");
            return malformed();
        }
    };

    let outcome = handle_bounce(
        state.provider.as_ref(),
        &state.domains,
        &state.defaults,
        &event,
    )
    .await;

    (StatusCode::OK, Json(WebhookResponse::from(outcome)))
}

// =============================================================================
// Mailing List Webhook
// =============================================================================

/// Stored-message webhook endpoint (form-encoded body).
///
/// Bodies that cannot be read as a form are malformed, except for oversized
/// ones which keep their 413.
pub async fn mailing_list_webhook(
    State(state): State<AppState>,
    form: Result<Form<ListForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            warn!(error = %rejection.body_text(), "mailing_list_webhook_too_large");
            return rejection.into_response();
        }
        Err(rejection) => {
            warn!(
                status = %rejection.status(),
                error = %rejection.body_text(),
                "mailing_list_webhook_malformed"
            );
            return malformed().into_response();
        }
    };

    info!(
        recipient = %form.recipient,
        has_body_html = !form.body_html.is_empty(),
        has_attachments = form.attachments.is_some(),
        "mailing_list_webhook_received"
    );

    let message = match ListMessage::from_form(form) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "mailing_list_webhook_malformed");
            return malformed().into_response();
        }
    };

    let outcome = relay_list_message(
        state.provider.as_ref(),
        &state.lists,
        &state.defaults,
        &message,
    )
    .await;

    (StatusCode::OK, Json(WebhookResponse::from(outcome))).into_response()
}
