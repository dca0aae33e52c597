// File: eventsub-core/src/config.rs

use std::time::Duration;
use url::Url;

use crate::Error;
use crate::auth::{RetryPolicy, DEFAULT_REFRESH_INTERVAL};
use crate::helix::ApiEndpoints;

pub const ENV_CLIENT_ID: &str = "TWITCH_API_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "TWITCH_API_CLIENT_SECRET";
pub const ENV_WEBHOOK_SECRET: &str = "TWITCH_WEBHOOK_SECRET";

/// Everything needed to build an `EventSubClient`.
///
/// Credentials left unset here are looked up in the environment by
/// [`ClientConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub webhook_secret: Option<String>,
    /// Public host Twitch will call, without scheme.
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    pub refresh_interval: Duration,
    pub retry: RetryPolicy,
    pub endpoints: ApiEndpoints,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            client_id: None,
            client_secret: None,
            webhook_secret: None,
            host: host.into(),
            port: None,
            path: "/".to_string(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            retry: RetryPolicy::default(),
            endpoints: ApiEndpoints::default(),
        }
    }

    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn refresh_interval(mut self, every: Duration) -> Self {
        self.refresh_interval = every;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoints(mut self, endpoints: ApiEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Loads `.env` (if any) and fills unset credentials from the process
    /// environment.
    pub fn from_env(self) -> Self {
        dotenv::dotenv().ok();
        self.from_lookup(|key| std::env::var(key).ok())
    }

    /// Fills unset credentials from `lookup`. Values already set win; empty
    /// values are treated as unset.
    pub fn from_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let fetch = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if self.client_id.is_none() {
            self.client_id = fetch(ENV_CLIENT_ID);
        }
        if self.client_secret.is_none() {
            self.client_secret = fetch(ENV_CLIENT_SECRET);
        }
        if self.webhook_secret.is_none() {
            self.webhook_secret = fetch(ENV_WEBHOOK_SECRET);
        }
        self
    }

    /// The route path as axum expects it, always with a leading slash.
    pub fn route_path(&self) -> String {
        format!("/{}", self.path.trim_start_matches('/'))
    }

    /// `https://host[:port]/path`
    pub fn callback_url(&self) -> Result<Url, Error> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(Error::Config(
                "Must provide a host for Twitch to send events & verifications to!".into(),
            ));
        }
        let authority = match self.port {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let url = Url::parse(&format!("https://{}{}", authority, self.route_path()))?;
        if url.host_str().is_none() {
            return Err(Error::Config(format!("'{}' is not a usable callback host", self.host)));
        }
        Ok(url)
    }
}
