// File: eventsub-core/src/client.rs

use std::sync::Arc;
use axum::Router;
use rand::distr::Alphanumeric;
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{info, warn};
use url::Url;

use eventsub_common::models::{Condition, SubscriptionList, SubscriptionStatus, SubscriptionType};
use crate::Error;
use crate::auth::AccessTokenManager;
use crate::config::ClientConfig;
use crate::eventbus::{ClientEvent, EventHub};
use crate::helix::{QueuedSubmission, SubscribeOutcome, SubscriptionManager};
use crate::http::{DefaultHttpTransport, HttpTransport};
use crate::utils::time::{Clock, SystemClock};
use crate::webhook::{self, NotificationDispatcher, WebhookHandler, WebhookRequest, WebhookResponse, WebhookVerifier};

const GENERATED_SECRET_LEN: usize = 64;

/// Twitch EventSub over webhooks: token upkeep, subscription management and
/// the inbound callback, wired to one [`EventHub`].
///
/// # Example Usage:
/// ```ignore
/// let client = EventSubClient::new(
///     ClientConfig::new("bot.example.com").path("/webhooks/callback").from_env(),
/// )?;
/// client.on("stream.online", |event| println!("{:?}", event));
/// client.subscribe(SubscriptionType::StreamOnline, Condition::broadcaster("1337")).await?;
/// client.start().await?;
/// axum::serve(listener, client.router()).await?;
/// ```
pub struct EventSubClient {
    callback: Url,
    route_path: String,
    hub: EventHub,
    tokens: Arc<AccessTokenManager>,
    subscriptions: SubscriptionManager,
    webhook: Arc<WebhookHandler>,
}

impl EventSubClient {
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        Self::with_parts(config, Arc::new(DefaultHttpTransport::new()), Arc::new(SystemClock))
    }

    /// Like [`EventSubClient::new`] but with the outbound transport and the
    /// clock used for replay protection supplied by the caller.
    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Error> {
        let client_id = config
            .client_id
            .clone()
            .ok_or_else(|| Error::Config("Must provide a client ID!".into()))?;
        let client_secret = config
            .client_secret
            .clone()
            .ok_or_else(|| Error::Config("Must provide a client secret!".into()))?;
        let callback = config.callback_url()?;
        if config.refresh_interval.is_zero() {
            return Err(Error::Config("token refresh interval must be greater than zero".into()));
        }

        let secret = match config.webhook_secret.clone() {
            Some(secret) => secret,
            None => {
                warn!(
                    "[EventSub] no webhook secret configured; generated a random one. \
                     Subscriptions made with it cannot be verified after a restart."
                );
                generate_secret()
            }
        };

        let hub = EventHub::new();
        let tokens = Arc::new(
            AccessTokenManager::new(
                client_id.as_str(),
                client_secret,
                config.endpoints.oauth_token.as_str(),
                transport.clone(),
                hub.clone(),
            )
            .with_refresh_interval(config.refresh_interval)
            .with_retry_policy(config.retry.clone()),
        );
        let subscriptions = SubscriptionManager::new(
            client_id,
            callback.as_str(),
            secret.as_str(),
            config.endpoints.subscriptions.as_str(),
            transport,
            tokens.subscribe(),
        );
        let webhook = Arc::new(WebhookHandler::new(
            WebhookVerifier::with_clock(secret, clock),
            NotificationDispatcher::new(hub.clone()),
        ));

        info!("[EventSub] callback URL is {}", callback);
        Ok(Self {
            callback,
            route_path: config.route_path(),
            hub,
            tokens,
            subscriptions,
            webhook,
        })
    }

    /// Obtains the first access token, starts the refresh loop, then submits
    /// everything `subscribe` queued so far.
    ///
    /// Each failed submission is also published as `subscription.failed`.
    pub async fn start(&self) -> Result<Vec<QueuedSubmission>, Error> {
        self.tokens.start().await?;
        let results = self.subscriptions.flush_pending().await?;
        for item in &results {
            if let Err(error) = &item.result {
                self.hub.publish(ClientEvent::SubscriptionFailed {
                    request: item.request.clone(),
                    error: error.clone(),
                });
            }
        }
        info!("[EventSub] started; {} queued subscription(s) submitted", results.len());
        Ok(results)
    }

    pub async fn shutdown(&self) {
        self.tokens.shutdown().await;
        info!("[EventSub] shut down.");
    }

    pub fn on<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.hub.on(name, handler);
    }

    pub fn listen(&self, name: impl Into<String>, buffer_size: Option<usize>) -> mpsc::Receiver<ClientEvent> {
        self.hub.listen(name, buffer_size)
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    pub async fn subscribe(
        &self,
        sub_type: SubscriptionType,
        condition: Condition,
    ) -> Result<SubscribeOutcome, Error> {
        self.subscriptions.subscribe(sub_type, condition).await
    }

    pub async fn get_subscriptions(&self, status: Option<SubscriptionStatus>) -> Result<SubscriptionList, Error> {
        self.subscriptions.get_subscriptions(status).await
    }

    pub async fn delete_subscription(&self, id: &str) -> Result<(), Error> {
        self.subscriptions.delete_subscription(id).await
    }

    pub fn pending_subscriptions(&self) -> usize {
        self.subscriptions.pending_len()
    }

    pub fn access_token(&self) -> Option<String> {
        self.tokens.access_token()
    }

    /// Verifies and dispatches one inbound webhook call.
    pub fn handle_webhook(&self, request: &WebhookRequest) -> WebhookResponse {
        self.webhook.handle(request)
    }

    /// An axum router serving the callback at the configured path.
    pub fn router(&self) -> Router {
        webhook::router(self.webhook.clone(), &self.route_path)
    }

    pub fn callback_url(&self) -> &Url {
        &self.callback
    }

    pub fn route_path(&self) -> &str {
        &self.route_path
    }

    pub fn webhook_secret(&self) -> &str {
        self.webhook.verifier().secret()
    }
}

fn generate_secret() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_SECRET_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingTransport;

    fn config() -> ClientConfig {
        ClientConfig::new("bot.example.com")
            .client_id("cid")
            .client_secret("csecret")
            .path("webhooks/callback")
    }

    fn client(config: ClientConfig) -> Result<EventSubClient, Error> {
        EventSubClient::with_parts(config, Arc::new(RecordingTransport::twitch_like()), Arc::new(SystemClock))
    }

    #[test]
    fn missing_credentials_are_config_errors() {
        let no_id = ClientConfig::new("h").client_secret("s");
        assert!(matches!(client(no_id), Err(Error::Config(_))));

        let no_secret = ClientConfig::new("h").client_id("c");
        assert!(matches!(client(no_secret), Err(Error::Config(_))));

        let no_host = ClientConfig::new("").client_id("c").client_secret("s");
        assert!(matches!(client(no_host), Err(Error::Config(_))));
    }

    #[test]
    fn zero_refresh_interval_is_rejected_up_front() {
        let zero = config().refresh_interval(std::time::Duration::ZERO);
        assert!(matches!(client(zero), Err(Error::Config(_))));
    }

    #[test]
    fn secret_is_generated_when_not_configured() {
        let a = client(config()).unwrap();
        let b = client(config()).unwrap();
        assert_eq!(a.webhook_secret().len(), GENERATED_SECRET_LEN);
        assert!(a.webhook_secret().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a.webhook_secret(), b.webhook_secret());
    }

    #[test]
    fn configured_secret_is_used_as_is() {
        let c = client(config().webhook_secret("s3cr3t-value")).unwrap();
        assert_eq!(c.webhook_secret(), "s3cr3t-value");
        assert_eq!(c.callback_url().as_str(), "https://bot.example.com/webhooks/callback");
        assert_eq!(c.route_path(), "/webhooks/callback");
    }
}
