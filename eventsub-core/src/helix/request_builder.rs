// ========================================================
// File: eventsub-core/src/helix/request_builder.rs
// ========================================================
use std::collections::BTreeMap;
use http::Method;
use serde::Serialize;

use crate::Error;
use crate::http::{ApiRequest, ApiResponse, HttpTransport, RequestBody};

/// Fluent builder for one outbound Helix / OAuth call.
///
/// Header names are lower-cased unless asked otherwise; query keys are kept
/// as given unless asked otherwise. The builder does no retries and sets no
/// timeouts.
#[derive(Debug, Clone, Default)]
pub struct HelixRequestBuilder {
    method: Option<Method>,
    url: Option<String>,
    headers: BTreeMap<String, String>,
    params: BTreeMap<String, String>,
    body: Option<RequestBody>,
}

impl HelixRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn set_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn add_header(self, name: &str, value: impl Into<String>) -> Self {
        self.add_header_with_case(name, value, true)
    }

    pub fn add_header_with_case(mut self, name: &str, value: impl Into<String>, lowercase: bool) -> Self {
        let key = if lowercase { name.to_lowercase() } else { name.to_string() };
        self.headers.insert(key, value.into());
        self
    }

    pub fn add_param(self, key: &str, value: impl Into<String>) -> Self {
        self.add_param_with_case(key, value, false)
    }

    pub fn add_param_with_case(mut self, key: &str, value: impl Into<String>, lowercase: bool) -> Self {
        let key = if lowercase { key.to_lowercase() } else { key.to_string() };
        self.params.insert(key, value.into());
        self
    }

    pub fn set_token(self, token: &str) -> Self {
        self.add_header("Authorization", format!("Bearer {}", token))
    }

    pub fn set_client_id(self, client_id: &str) -> Self {
        self.add_header("Client-Id", client_id)
    }

    /// JSON body; also sets `content-type: application/json`.
    pub fn set_json<T: Serialize>(self, body: &T) -> Result<Self, Error> {
        let value = serde_json::to_value(body)?;
        let mut this = self.add_header("Content-Type", "application/json");
        this.body = Some(RequestBody::Json(value));
        Ok(this)
    }

    /// `application/x-www-form-urlencoded` body.
    pub fn set_form(mut self, fields: &[(&str, &str)]) -> Self {
        self.body = Some(RequestBody::Form(
            fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        ));
        self
    }

    /// Assembles the request. Fails if no URL was set.
    pub fn build(self) -> Result<ApiRequest, Error> {
        let url = self.url.ok_or_else(|| {
            Error::Config("Target URL needs to be set before sending a request!".into())
        })?;
        Ok(ApiRequest {
            method: self.method.unwrap_or(Method::GET),
            url,
            headers: self.headers,
            params: self.params,
            body: self.body,
        })
    }

    pub async fn send(self, transport: &dyn HttpTransport) -> Result<ApiResponse, Error> {
        let request = self.build()?;
        transport.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockHttpTransport;

    #[test]
    fn headers_are_lowercased_by_default() {
        let req = HelixRequestBuilder::new()
            .set_url("https://example.com")
            .set_token("abc")
            .set_client_id("cid")
            .add_header_with_case("X-Keep-Case", "1", false)
            .build()
            .unwrap();
        assert_eq!(req.header("authorization"), Some("Bearer abc"));
        assert_eq!(req.header("client-id"), Some("cid"));
        assert_eq!(req.header("X-Keep-Case"), Some("1"));
        assert_eq!(req.method, Method::GET);
    }

    #[test]
    fn params_keep_case_unless_asked() {
        let req = HelixRequestBuilder::new()
            .set_url("https://example.com")
            .add_param("Status", "enabled")
            .add_param_with_case("After", "cursor", true)
            .build()
            .unwrap();
        assert_eq!(req.param("Status"), Some("enabled"));
        assert_eq!(req.param("after"), Some("cursor"));
    }

    #[tokio::test]
    async fn send_without_url_is_a_config_error_and_never_hits_the_wire() {
        let mut transport = MockHttpTransport::new();
        transport.expect_execute().never();

        let err = HelixRequestBuilder::new()
            .set_method(Method::POST)
            .send(&transport)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn send_passes_the_assembled_request_through() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_execute()
            .withf(|req| {
                req.method == Method::POST
                    && req.url == "https://example.com/x"
                    && req.header("content-type") == Some("application/json")
                    && matches!(&req.body, Some(RequestBody::Json(v)) if v["a"] == 1)
            })
            .times(1)
            .returning(|_| Ok(ApiResponse::new(202, "{}")));

        let resp = HelixRequestBuilder::new()
            .set_method(Method::POST)
            .set_url("https://example.com/x")
            .set_json(&serde_json::json!({ "a": 1 }))
            .unwrap()
            .send(&transport)
            .await
            .unwrap();
        assert_eq!(resp.status, 202);
    }
}
