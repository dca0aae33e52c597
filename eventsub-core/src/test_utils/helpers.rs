// File: eventsub-core/src/test_utils/helpers.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use http::Method;
use parking_lot::Mutex;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::Error;
use crate::http::{ApiRequest, ApiResponse, HttpTransport, RequestBody};
use crate::utils::time::Clock;
use crate::webhook::{sign_message, WebhookRequest};

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn starting_now() -> Self {
        Self::at(Utc::now())
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

type Responder = Box<dyn Fn(&ApiRequest) -> Result<ApiResponse, Error> + Send + Sync>;

/// Fake transport that records every request and answers through a closure.
pub struct RecordingTransport {
    requests: Mutex<Vec<ApiRequest>>,
    responder: Responder,
}

impl RecordingTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ApiRequest) -> Result<ApiResponse, Error> + Send + Sync + 'static,
    {
        Self {
            requests: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        }
    }

    /// Answers like Twitch would: tokens from the OAuth endpoint, and
    /// create/list/delete on the subscriptions endpoint.
    pub fn twitch_like() -> Self {
        let counter = AtomicUsize::new(0);
        Self::new(move |req| Ok(twitch_like_response(req, &counter)))
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    /// How many requests with `method` went to a URL containing `url_part`.
    pub fn count(&self, method: Method, url_part: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.url.contains(url_part))
            .count()
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        let response = (self.responder)(&request);
        self.requests.lock().push(request);
        response
    }
}

/// The canned answer `RecordingTransport::twitch_like` gives.
pub fn twitch_like_response(req: &ApiRequest, counter: &AtomicUsize) -> ApiResponse {
    let n = counter.fetch_add(1, Ordering::SeqCst);
    if req.url.contains("oauth2/token") {
        return ApiResponse::new(
            200,
            json!({
                "access_token": format!("token-{n}"),
                "expires_in": 5011271,
                "token_type": "bearer"
            })
            .to_string(),
        );
    }
    match req.method {
        Method::POST => {
            let body = match &req.body {
                Some(RequestBody::Json(v)) => v.clone(),
                _ => Value::Null,
            };
            ApiResponse::new(
                202,
                json!({
                    "data": [subscription_json(&format!("sub-{n}"), &body)],
                    "total": 1,
                    "total_cost": 1,
                    "max_total_cost": 10000
                })
                .to_string(),
            )
        }
        Method::GET => ApiResponse::new(
            200,
            json!({
                "data": [],
                "total": 0,
                "total_cost": 0,
                "max_total_cost": 10000,
                "pagination": {}
            })
            .to_string(),
        ),
        Method::DELETE => ApiResponse::new(204, ""),
        _ => ApiResponse::new(405, "method not allowed"),
    }
}

/// A Helix subscription record built from a create request body.
pub fn subscription_json(id: &str, request: &Value) -> Value {
    let mut transport = request.get("transport").cloned().unwrap_or(Value::Null);
    if let Value::Object(map) = &mut transport {
        map.remove("secret");
    }
    json!({
        "id": id,
        "type": request.get("type").cloned().unwrap_or(Value::Null),
        "version": "1",
        "status": "webhook_callback_verification_pending",
        "cost": 1,
        "condition": request.get("condition").cloned().unwrap_or(Value::Null),
        "transport": transport,
        "created_at": "2019-11-16T10:11:12.634234626Z"
    })
}

/// A webhook call signed the way Twitch signs it, under a fresh message id.
pub fn signed_webhook(secret: &str, message_type: &str, timestamp: &str, body: &str) -> WebhookRequest {
    let message_id = Uuid::new_v4().to_string();
    WebhookRequest {
        signature: Some(sign_message(secret, &message_id, timestamp, body.as_bytes())),
        message_id: Some(message_id),
        timestamp: Some(timestamp.to_string()),
        message_type: Some(message_type.to_string()),
        body: Bytes::from(body.to_string()),
    }
}
