// File: eventsub-core/src/webhook/server.rs

use std::sync::Arc;
use axum::{
    Router,
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::post,
};
use bytes::Bytes;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::webhook::dispatch::{NotificationDispatcher, WebhookResponse};
use crate::webhook::verify::{VerifyOutcome, WebhookVerifier};

pub const HEADER_MESSAGE_ID: &str = "twitch-eventsub-message-id";
pub const HEADER_MESSAGE_TIMESTAMP: &str = "twitch-eventsub-message-timestamp";
pub const HEADER_MESSAGE_SIGNATURE: &str = "twitch-eventsub-message-signature";
pub const HEADER_MESSAGE_TYPE: &str = "twitch-eventsub-message-type";

/// One inbound webhook call, independent of any HTTP framework.
#[derive(Debug, Clone, Default)]
pub struct WebhookRequest {
    pub message_id: Option<String>,
    pub timestamp: Option<String>,
    pub signature: Option<String>,
    pub message_type: Option<String>,
    pub body: Bytes,
}

impl WebhookRequest {
    pub fn from_parts(headers: &HeaderMap, body: Bytes) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        Self {
            message_id: get(HEADER_MESSAGE_ID),
            timestamp: get(HEADER_MESSAGE_TIMESTAMP),
            signature: get(HEADER_MESSAGE_SIGNATURE),
            message_type: get(HEADER_MESSAGE_TYPE),
            body,
        }
    }
}

/// Verify, then dispatch. Shared by the axum route and anyone embedding the
/// client in their own server.
pub struct WebhookHandler {
    verifier: WebhookVerifier,
    dispatcher: NotificationDispatcher,
}

impl WebhookHandler {
    pub fn new(verifier: WebhookVerifier, dispatcher: NotificationDispatcher) -> Self {
        Self { verifier, dispatcher }
    }

    pub fn verifier(&self) -> &WebhookVerifier {
        &self.verifier
    }

    pub fn handle(&self, request: &WebhookRequest) -> WebhookResponse {
        let outcome = self.verifier.verify(
            &request.body,
            request.message_id.as_deref(),
            request.timestamp.as_deref(),
            request.signature.as_deref(),
        );
        if outcome != VerifyOutcome::Accepted {
            return WebhookResponse::empty(outcome.status());
        }
        debug!(
            "[Webhook] dispatching {} ({} bytes)",
            request.message_type.as_deref().unwrap_or("<none>"),
            request.body.len()
        );
        self.dispatcher
            .dispatch(request.message_type.as_deref(), &request.body)
    }
}

impl IntoResponse for WebhookResponse {
    fn into_response(self) -> Response {
        match (self.body, self.content_type) {
            (Some(body), Some(content_type)) => {
                (self.status, [(header::CONTENT_TYPE, content_type)], body).into_response()
            }
            (Some(body), None) => (self.status, body).into_response(),
            (None, _) => self.status.into_response(),
        }
    }
}

/// A router with a single POST route at `path` feeding `handler`.
pub fn router(handler: Arc<WebhookHandler>, path: &str) -> Router {
    Router::new()
        .route(path, post(handle_post))
        .with_state(handler)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

async fn handle_post(
    State(handler): State<Arc<WebhookHandler>>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResponse {
    handler.handle(&WebhookRequest::from_parts(&headers, body))
}
