//! HTTP transport abstraction for the Helix and OAuth calls.
//!
//! Every outbound request goes through [`HttpTransport`], so the token
//! manager and the subscription manager can be exercised without a network:
//!
//! - unit tests use the `mockall`-generated `MockHttpTransport`
//! - integration tests use `test_utils::RecordingTransport`
//! - production code uses [`DefaultHttpTransport`], a thin reqwest wrapper
//!
//! # Example Usage:
//! ```ignore
//! use eventsub_core::http::{DefaultHttpTransport, HttpTransport};
//!
//! let transport: Arc<dyn HttpTransport> = Arc::new(DefaultHttpTransport::new());
//! let response = HelixRequestBuilder::new()
//!     .set_url(SUBSCRIPTIONS_URL)
//!     .send(transport.as_ref())
//!     .await?;
//! ```

use std::collections::BTreeMap;
use async_trait::async_trait;
use http::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
}

/// A fully assembled outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
    pub body: Option<RequestBody>,
}

impl ApiRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Raw response: status code and body text, nothing interpreted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turns a non-2xx response into `Error::Api`.
    pub fn error_for_status(self) -> Result<Self, Error> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::Api {
                status: self.status,
                body: self.body,
            })
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Sends an [`ApiRequest`] somewhere and hands back the raw response.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, Error>;
}

#[derive(Clone, Default)]
pub struct DefaultHttpTransport {
    client: reqwest::Client,
}

impl DefaultHttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for DefaultHttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        let mut builder = self.client.request(request.method, &request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        builder = match request.body {
            Some(RequestBody::Json(value)) => builder.json(&value),
            Some(RequestBody::Form(fields)) => builder.form(&fields),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ApiResponse { status, body })
    }
}
