// File: eventsub-core/src/auth/token_manager.rs
//
// App access token lifecycle: one client-credentials exchange at start, then
// a refresh on a fixed interval until shutdown.

use std::sync::{Arc, Weak};
use std::time::Duration;
use chrono::{DateTime, Utc};
use http::Method;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::Error;
use crate::eventbus::{ClientEvent, EventHub};
use crate::helix::HelixRequestBuilder;
use crate::http::HttpTransport;

/// Twitch does not tell us how long app tokens last; 14 days is comfortably
/// below what they are observed to live.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60 * 24 * 14);

/// Exponential backoff for token exchanges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay after the `attempt`-th failure (1-based): doubles each time, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Matches Twitch's JSON from the token endpoint
#[derive(Deserialize)]
struct TwitchTokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Lifetime reported by Twitch, informational only.
    pub expires_in: Option<u64>,
    pub obtained_at: DateTime<Utc>,
}

pub struct AccessTokenManager {
    client_id: String,
    client_secret: String,
    token_url: String,
    transport: Arc<dyn HttpTransport>,
    hub: EventHub,
    refresh_interval: Duration,
    retry: RetryPolicy,
    token_tx: watch::Sender<Option<AccessToken>>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AccessTokenManager {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_url: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
        hub: EventHub,
    ) -> Self {
        let (token_tx, _) = watch::channel(None);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: token_url.into(),
            transport,
            hub,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            retry: RetryPolicy::default(),
            token_tx,
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Current access token, if one has been obtained.
    pub fn access_token(&self) -> Option<String> {
        self.token_tx
            .borrow()
            .as_ref()
            .map(|t| t.access_token.clone())
    }

    /// Receiver that sees every refreshed token.
    pub fn subscribe(&self) -> watch::Receiver<Option<AccessToken>> {
        self.token_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Fetches the first token and starts the refresh loop.
    ///
    /// Fails if the initial exchange fails after all retries; no loop is
    /// started in that case.
    pub async fn start(self: &Arc<Self>) -> Result<AccessToken, Error> {
        if self.refresh_interval.is_zero() {
            return Err(Error::Config("token refresh interval must be greater than zero".into()));
        }
        if self.is_running() {
            warn!("[TokenManager] start() called twice; keeping the running refresh loop");
            let current = self.token_tx.borrow().clone();
            if let Some(token) = current {
                return Ok(token);
            }
        }

        let token = self
            .exchange_with_retry()
            .await
            .map_err(|(attempts, e)| {
                error!("[TokenManager] initial token exchange failed after {} attempt(s): {}", attempts, e);
                e
            })?;
        self.store(token.clone());

        self.shutdown_tx.send_replace(false);
        let handle = tokio::spawn(refresh_loop(
            Arc::downgrade(self),
            self.refresh_interval,
            self.shutdown_tx.subscribe(),
        ));
        *self.task.lock() = Some(handle);

        info!(
            "[TokenManager] access token acquired; refreshing every {}s",
            self.refresh_interval.as_secs()
        );
        Ok(token)
    }

    /// Stops the refresh loop and waits for it to exit.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("[TokenManager] refresh task ended abnormally: {}", e);
            }
            info!("[TokenManager] refresh loop stopped.");
        }
    }

    /// One scheduled refresh. Failures become a `token.refresh_failed` event;
    /// the previous token stays in place.
    async fn refresh_scheduled(&self) {
        match self.exchange_with_retry().await {
            Ok(token) => {
                info!("[TokenManager] access token refreshed");
                self.store(token);
            }
            Err((attempts, e)) => {
                error!("[TokenManager] token refresh failed after {} attempt(s): {}", attempts, e);
                self.hub.publish(ClientEvent::TokenRefreshFailed {
                    attempts,
                    error: Arc::new(e),
                });
            }
        }
    }

    fn store(&self, token: AccessToken) {
        let access_token = token.access_token.clone();
        self.token_tx.send_replace(Some(token));
        self.hub.publish(ClientEvent::TokenRefreshed { access_token });
    }

    async fn exchange_with_retry(&self) -> Result<AccessToken, (u32, Error)> {
        let max = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.exchange().await {
                Ok(token) => return Ok(token),
                Err(e) if attempt >= max => return Err((attempt, e)),
                Err(e) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "[TokenManager] token exchange attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, max, e, delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn exchange(&self) -> Result<AccessToken, Error> {
        let response = HelixRequestBuilder::new()
            .set_method(Method::POST)
            .set_url(&self.token_url)
            .set_form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send(self.transport.as_ref())
            .await?
            .error_for_status()?;

        let parsed: TwitchTokenResponse = response.json()?;
        if parsed.access_token.is_empty() {
            return Err(Error::Auth("token endpoint returned an empty access_token".into()));
        }
        debug!("[TokenManager] token exchange ok, expires_in={:?}", parsed.expires_in);

        Ok(AccessToken {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token,
            expires_in: parsed.expires_in,
            obtained_at: Utc::now(),
        })
    }
}

async fn refresh_loop(
    manager: Weak<AccessTokenManager>,
    every: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let Some(first) = Instant::now().checked_add(every) else {
        warn!("[TokenManager] refresh interval {:?} is out of range; scheduled refresh disabled", every);
        let _ = shutdown_rx.wait_for(|stop| *stop).await;
        return;
    };
    let mut ticker = interval_at(first, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(manager) = manager.upgrade() else { break };
                tokio::select! {
                    _ = manager.refresh_scheduled() => {}
                    _ = shutdown_rx.changed() => break,
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
    debug!("[TokenManager] refresh loop exiting");
}
