// File: eventsub-core/src/helix/subscriptions.rs
//
// Create / list / delete EventSub subscriptions on Helix, with a local queue
// for subscriptions requested before an access token exists.

use std::sync::Arc;
use futures_util::future::join_all;
use http::Method;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use eventsub_common::models::{
    Condition, Subscription, SubscriptionList, SubscriptionRequest, SubscriptionStatus,
    SubscriptionType, Transport,
};
use crate::Error;
use crate::auth::AccessToken;
use crate::helix::HelixRequestBuilder;
use crate::http::HttpTransport;

/// What `subscribe` did with the request.
#[derive(Debug, Clone)]
pub enum SubscribeOutcome {
    /// No token yet; the request will be submitted by `flush_pending`.
    Queued,
    /// Submitted; Twitch's record of the new subscription.
    Created(Subscription),
}

/// Result of submitting one queued request.
#[derive(Debug)]
pub struct QueuedSubmission {
    pub request: SubscriptionRequest,
    pub result: Result<Subscription, Arc<Error>>,
}

pub struct SubscriptionManager {
    client_id: String,
    callback: String,
    secret: String,
    endpoint: String,
    transport: Arc<dyn HttpTransport>,
    token: watch::Receiver<Option<AccessToken>>,
    pending: Mutex<Vec<SubscriptionRequest>>,
}

impl SubscriptionManager {
    pub fn new(
        client_id: impl Into<String>,
        callback: impl Into<String>,
        secret: impl Into<String>,
        endpoint: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
        token: watch::Receiver<Option<AccessToken>>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            callback: callback.into(),
            secret: secret.into(),
            endpoint: endpoint.into(),
            transport,
            token,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    fn current_token(&self) -> Option<String> {
        self.token.borrow().as_ref().map(|t| t.access_token.clone())
    }

    fn require_token(&self, action: &str) -> Result<String, Error> {
        self.current_token().ok_or_else(|| {
            Error::Usage(format!("cannot {action} before an access token is available; call start() first"))
        })
    }

    /// Registers a webhook subscription, or queues it if there is no token yet.
    pub async fn subscribe(
        &self,
        sub_type: SubscriptionType,
        condition: Condition,
    ) -> Result<SubscribeOutcome, Error> {
        if !sub_type.accepts(&condition) {
            return Err(Error::Usage(format!(
                "{} requires a {} condition, got {}",
                sub_type,
                sub_type.condition_kind(),
                condition.kind()
            )));
        }
        condition.validate().map_err(Error::Usage)?;

        let request = SubscriptionRequest::new(
            sub_type,
            condition,
            Transport::webhook(self.callback.as_str(), self.secret.as_str()),
        );

        // The token is read under the queue lock; `flush_pending` drains the
        // queue under the same lock after the token is stored.
        let token = {
            let mut pending = self.pending.lock();
            match self.current_token() {
                Some(token) => token,
                None => {
                    debug!("[EventSub] no token yet, queueing {} subscription", sub_type);
                    pending.push(request);
                    return Ok(SubscribeOutcome::Queued);
                }
            }
        };

        let created = self.submit(&token, &request).await?;
        info!("[EventSub] subscribed to {} (id={})", sub_type, created.id);
        Ok(SubscribeOutcome::Created(created))
    }

    /// Submits every queued request concurrently.
    ///
    /// Returns one entry per request. Failed requests go back on the queue
    /// so a later flush can retry them.
    pub async fn flush_pending(&self) -> Result<Vec<QueuedSubmission>, Error> {
        let (token, batch) = {
            let mut pending = self.pending.lock();
            let token = self.require_token("flush queued subscriptions")?;
            (token, std::mem::take(&mut *pending))
        };
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        debug!("[EventSub] submitting {} queued subscription(s)", batch.len());

        let results = join_all(batch.iter().map(|req| self.submit(&token, req))).await;

        let mut out = Vec::with_capacity(batch.len());
        let mut failed = Vec::new();
        for (request, result) in batch.into_iter().zip(results) {
            match &result {
                Ok(sub) => info!("[EventSub] subscribed to {} (id={})", request.sub_type, sub.id),
                Err(e) => {
                    warn!("[EventSub] queued {} subscription failed: {}", request.sub_type, e);
                    failed.push(request.clone());
                }
            }
            out.push(QueuedSubmission {
                request,
                result: result.map_err(Arc::new),
            });
        }
        if !failed.is_empty() {
            let mut pending = self.pending.lock();
            // keep failures ahead of anything queued meanwhile
            failed.append(&mut pending);
            *pending = failed;
        }
        Ok(out)
    }

    /// Lists the app's subscriptions, optionally filtered by status.
    pub async fn get_subscriptions(
        &self,
        status: Option<SubscriptionStatus>,
    ) -> Result<SubscriptionList, Error> {
        let token = self.require_token("list subscriptions")?;
        let mut builder = HelixRequestBuilder::new()
            .set_method(Method::GET)
            .set_url(&self.endpoint)
            .set_token(&token)
            .set_client_id(&self.client_id);
        if let Some(status) = status {
            builder = builder.add_param("status", status.as_str());
        }
        builder
            .send(self.transport.as_ref())
            .await?
            .error_for_status()?
            .json()
    }

    pub async fn delete_subscription(&self, id: &str) -> Result<(), Error> {
        let token = self.require_token("delete a subscription")?;
        if id.trim().is_empty() {
            return Err(Error::Usage("subscription id must not be empty".into()));
        }
        HelixRequestBuilder::new()
            .set_method(Method::DELETE)
            .set_url(&self.endpoint)
            .set_token(&token)
            .set_client_id(&self.client_id)
            .add_param("id", id)
            .send(self.transport.as_ref())
            .await?
            .error_for_status()?;
        info!("[EventSub] deleted subscription {}", id);
        Ok(())
    }

    async fn submit(&self, token: &str, request: &SubscriptionRequest) -> Result<Subscription, Error> {
        let list: SubscriptionList = HelixRequestBuilder::new()
            .set_method(Method::POST)
            .set_url(&self.endpoint)
            .set_token(token)
            .set_client_id(&self.client_id)
            .set_json(request)?
            .send(self.transport.as_ref())
            .await?
            .error_for_status()?
            .json()?;
        list.data
            .into_iter()
            .next()
            .ok_or_else(|| Error::Payload("create subscription response had no data".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use crate::http::{ApiResponse, MockHttpTransport, RequestBody};

    const ENDPOINT: &str = "https://api.twitch.tv/helix/eventsub/subscriptions";

    fn token(value: Option<&str>) -> watch::Receiver<Option<AccessToken>> {
        let (tx, rx) = watch::channel(value.map(|v| AccessToken {
            access_token: v.to_string(),
            refresh_token: None,
            expires_in: None,
            obtained_at: Utc::now(),
        }));
        // the receiver keeps the last value after the sender is gone
        drop(tx);
        rx
    }

    fn manager(transport: MockHttpTransport, tok: Option<&str>) -> SubscriptionManager {
        SubscriptionManager::new(
            "cid",
            "https://example.com/hooks",
            "s3cr3t-value",
            ENDPOINT,
            Arc::new(transport),
            token(tok),
        )
    }

    fn created(id: &str) -> ApiResponse {
        ApiResponse::new(
            202,
            json!({
                "data": [{
                    "id": id,
                    "type": "stream.online",
                    "version": "1",
                    "status": "webhook_callback_verification_pending",
                    "cost": 1,
                    "condition": { "broadcaster_user_id": "1337" },
                    "transport": { "method": "webhook", "callback": "https://example.com/hooks" },
                    "created_at": "2019-11-16T10:11:12.634234626Z"
                }],
                "total": 1,
                "total_cost": 1,
                "max_total_cost": 10000
            })
            .to_string(),
        )
    }

    #[tokio::test]
    async fn subscribe_without_token_only_queues() {
        let mut transport = MockHttpTransport::new();
        transport.expect_execute().never();

        let mgr = manager(transport, None);
        let outcome = mgr
            .subscribe(SubscriptionType::StreamOnline, Condition::broadcaster("1337"))
            .await
            .unwrap();
        assert!(matches!(outcome, SubscribeOutcome::Queued));
        assert_eq!(mgr.pending_len(), 1);
    }

    #[tokio::test]
    async fn subscribe_with_token_posts_webhook_request() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_execute()
            .withf(|req| {
                req.method == Method::POST
                    && req.url == ENDPOINT
                    && req.header("authorization") == Some("Bearer tok")
                    && req.header("client-id") == Some("cid")
                    && matches!(&req.body, Some(RequestBody::Json(v))
                        if v["type"] == "stream.online"
                            && v["version"] == "1"
                            && v["condition"]["broadcaster_user_id"] == "1337"
                            && v["transport"]["method"] == "webhook"
                            && v["transport"]["callback"] == "https://example.com/hooks"
                            && v["transport"]["secret"] == "s3cr3t-value")
            })
            .times(1)
            .returning(|_| Ok(created("sub-1")));

        let mgr = manager(transport, Some("tok"));
        match mgr
            .subscribe(SubscriptionType::StreamOnline, Condition::broadcaster("1337"))
            .await
            .unwrap()
        {
            SubscribeOutcome::Created(sub) => assert_eq!(sub.id, "sub-1"),
            other => panic!("expected Created, got {other:?}"),
        }
        assert_eq!(mgr.pending_len(), 0);
    }

    #[tokio::test]
    async fn mismatched_condition_is_rejected_locally() {
        let mut transport = MockHttpTransport::new();
        transport.expect_execute().never();

        let mgr = manager(transport, Some("tok"));
        let err = mgr
            .subscribe(SubscriptionType::ChannelRaid, Condition::broadcaster("1337"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Usage(_)));

        let err = mgr
            .subscribe(SubscriptionType::StreamOnline, Condition::broadcaster(""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
    }

    #[tokio::test]
    async fn flush_reports_each_request_and_requeues_failures() {
        let mut transport = MockHttpTransport::new();
        transport.expect_execute().times(2).returning(|req| {
            match &req.body {
                Some(RequestBody::Json(v)) if v["type"] == "stream.online" => Ok(created("sub-ok")),
                _ => Ok(ApiResponse::new(409, r#"{"message":"subscription already exists"}"#)),
            }
        });

        let (tx, rx) = watch::channel(None);
        let mgr = SubscriptionManager::new(
            "cid",
            "https://example.com/hooks",
            "s3cr3t-value",
            ENDPOINT,
            Arc::new(transport),
            rx,
        );
        mgr.subscribe(SubscriptionType::StreamOnline, Condition::broadcaster("1"))
            .await
            .unwrap();
        mgr.subscribe(SubscriptionType::StreamOffline, Condition::broadcaster("1"))
            .await
            .unwrap();
        assert_eq!(mgr.pending_len(), 2);

        tx.send_replace(Some(AccessToken {
            access_token: "tok".into(),
            refresh_token: None,
            expires_in: None,
            obtained_at: Utc::now(),
        }));

        let results = mgr.flush_pending().await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].result.is_ok());
        assert!(matches!(&results[1].result, Err(e) if matches!(**e, Error::Api { status: 409, .. })));
        assert_eq!(results[1].request.sub_type, SubscriptionType::StreamOffline);
        assert_eq!(mgr.pending_len(), 1);
    }

    #[tokio::test]
    async fn flush_without_token_is_a_usage_error() {
        let mut transport = MockHttpTransport::new();
        transport.expect_execute().never();
        let mgr = manager(transport, None);
        assert!(matches!(mgr.flush_pending().await, Err(Error::Usage(_))));
    }

    #[tokio::test]
    async fn list_sends_status_filter() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_execute()
            .withf(|req| req.method == Method::GET && req.param("status") == Some("enabled"))
            .times(1)
            .returning(|_| {
                Ok(ApiResponse::new(
                    200,
                    r#"{"data":[],"total":0,"total_cost":0,"max_total_cost":10000,"pagination":{}}"#,
                ))
            });

        let mgr = manager(transport, Some("tok"));
        let list = mgr
            .get_subscriptions(Some(SubscriptionStatus::Enabled))
            .await
            .unwrap();
        assert!(list.data.is_empty());
        assert_eq!(list.max_total_cost, 10000);
    }

    #[tokio::test]
    async fn delete_sends_id_param() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_execute()
            .withf(|req| req.method == Method::DELETE && req.param("id") == Some("sub-9"))
            .times(1)
            .returning(|_| Ok(ApiResponse::new(204, "")));

        let mgr = manager(transport, Some("tok"));
        mgr.delete_subscription("sub-9").await.unwrap();
    }

    #[tokio::test]
    async fn delete_guards_run_before_any_request() {
        let mut transport = MockHttpTransport::new();
        transport.expect_execute().never();

        let without_token = manager(transport, None);
        assert!(matches!(
            without_token.delete_subscription("sub-9").await,
            Err(Error::Usage(_))
        ));

        let mut transport = MockHttpTransport::new();
        transport.expect_execute().never();
        let with_token = manager(transport, Some("tok"));
        assert!(matches!(with_token.delete_subscription("").await, Err(Error::Usage(_))));
    }

    #[tokio::test]
    async fn delete_surfaces_api_errors() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_execute()
            .returning(|_| Ok(ApiResponse::new(404, r#"{"message":"not found"}"#)));

        let mgr = manager(transport, Some("tok"));
        assert!(matches!(
            mgr.delete_subscription("missing").await,
            Err(Error::Api { status: 404, .. })
        ));
    }
}
