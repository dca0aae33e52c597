// File: eventsub-core/src/webhook/dispatch.rs

use http::StatusCode;
use serde_json::Value;
use tracing::{debug, error, info};

use eventsub_common::models::{MessageType, Notification};
use crate::Error;
use crate::eventbus::{ClientEvent, EventHub};

pub const TEXT_PLAIN: &str = "text/plain";

/// What the webhook endpoint should answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: StatusCode,
    pub body: Option<String>,
    pub content_type: Option<&'static str>,
}

impl WebhookResponse {
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            body: None,
            content_type: None,
        }
    }

    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: Some(body.into()),
            content_type: Some(TEXT_PLAIN),
        }
    }
}

/// Turns verified webhook bodies into hub events.
#[derive(Clone)]
pub struct NotificationDispatcher {
    hub: EventHub,
}

impl NotificationDispatcher {
    pub fn new(hub: EventHub) -> Self {
        Self { hub }
    }

    /// Routes on the message-type header. Only call this with a body that
    /// already passed verification.
    pub fn dispatch(&self, message_type: Option<&str>, body: &[u8]) -> WebhookResponse {
        let kind = match message_type.map(MessageType::try_from) {
            Some(Ok(kind)) => kind,
            Some(Err(reason)) => return self.fail(StatusCode::INTERNAL_SERVER_ERROR, Error::Payload(reason)),
            None => {
                return self.fail(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Error::Payload("missing Twitch-Eventsub-Message-Type header".into()),
                );
            }
        };

        let value: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => return self.fail(StatusCode::BAD_REQUEST, e.into()),
        };

        match kind {
            MessageType::Notification => match Notification::from_envelope(value) {
                Ok(notification) => {
                    debug!("[Webhook] notification '{}'", notification.event_type);
                    self.hub.publish(ClientEvent::Notification(notification));
                    WebhookResponse::empty(StatusCode::OK)
                }
                Err(e) => self.fail(StatusCode::BAD_REQUEST, e),
            },
            MessageType::Verification => {
                let Some(challenge) = value.get("challenge").and_then(Value::as_str).map(str::to_owned) else {
                    return self.fail(
                        StatusCode::BAD_REQUEST,
                        Error::Payload("verification message has no 'challenge' string".into()),
                    );
                };
                info!("[Webhook] answering callback verification challenge");
                self.hub.publish(ClientEvent::Challenge(value));
                WebhookResponse::text(StatusCode::OK, challenge)
            }
            MessageType::Revocation => {
                let reason = value
                    .pointer("/subscription/status")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_owned();
                info!("[Webhook] subscription revoked: {}", reason);
                self.hub.publish(ClientEvent::Revocation(value));
                WebhookResponse::empty(StatusCode::OK)
            }
        }
    }

    fn fail(&self, status: StatusCode, err: Error) -> WebhookResponse {
        error!("[Webhook] {}", err);
        self.hub.publish(ClientEvent::error(err));
        WebhookResponse::empty(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use parking_lot::Mutex;
    use serde_json::json;
    use crate::eventbus::{EVENT_CHALLENGE, EVENT_ERROR, EVENT_REVOCATION};

    fn recorder(hub: &EventHub, name: &str) -> Arc<Mutex<Vec<ClientEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        hub.on(name, move |e| sink.lock().push(e.clone()));
        seen
    }

    #[test]
    fn notification_emits_event_named_after_subscription_type() {
        let hub = EventHub::new();
        let seen = recorder(&hub, "channel.raid");
        let body = json!({
            "subscription": { "id": "abc", "type": "channel.raid" },
            "event": { "from_broadcaster_user_id": "1", "viewers": 9001 }
        });

        let resp = NotificationDispatcher::new(hub)
            .dispatch(Some("notification"), body.to_string().as_bytes());

        assert_eq!(resp, WebhookResponse::empty(StatusCode::OK));
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        match &seen[0] {
            ClientEvent::Notification(n) => {
                assert_eq!(n.event["viewers"], 9001);
                assert_eq!(n.subscription_id(), Some("abc"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn verification_echoes_challenge_as_plain_text() {
        let hub = EventHub::new();
        let seen = recorder(&hub, EVENT_CHALLENGE);
        let body = json!({ "challenge": "pogchamp-kappa-360noscope-vohiyo", "subscription": {} });

        let resp = NotificationDispatcher::new(hub)
            .dispatch(Some("webhook_callback_verification"), body.to_string().as_bytes());

        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body.as_deref(), Some("pogchamp-kappa-360noscope-vohiyo"));
        assert_eq!(resp.content_type, Some(TEXT_PLAIN));
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn revocation_is_forwarded() {
        let hub = EventHub::new();
        let seen = recorder(&hub, EVENT_REVOCATION);
        let body = json!({ "subscription": { "status": "authorization_revoked" } });

        let resp = NotificationDispatcher::new(hub).dispatch(Some("revocation"), body.to_string().as_bytes());

        assert_eq!(resp.status, StatusCode::OK);
        assert!(matches!(&seen.lock()[0], ClientEvent::Revocation(v) if v["subscription"]["status"] == "authorization_revoked"));
    }

    #[test]
    fn unknown_or_missing_type_is_a_server_error() {
        let hub = EventHub::new();
        let errors = recorder(&hub, EVENT_ERROR);
        let dispatcher = NotificationDispatcher::new(hub);

        assert_eq!(dispatcher.dispatch(Some("bogus"), b"{}").status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(dispatcher.dispatch(None, b"{}").status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(errors.lock().len(), 2);
    }

    #[test]
    fn undecodable_bodies_are_bad_requests() {
        let hub = EventHub::new();
        let errors = recorder(&hub, EVENT_ERROR);
        let dispatcher = NotificationDispatcher::new(hub);

        assert_eq!(dispatcher.dispatch(Some("notification"), b"not json").status, StatusCode::BAD_REQUEST);
        let wrong_type = json!({ "subscription": { "type": 42 }, "event": {} });
        assert_eq!(
            dispatcher.dispatch(Some("notification"), wrong_type.to_string().as_bytes()).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            dispatcher.dispatch(Some("webhook_callback_verification"), b"{}").status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(errors.lock().len(), 3);
    }
}
