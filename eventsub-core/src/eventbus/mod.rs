//! src/eventbus/mod.rs
//!
//! In-process event hub: handlers register under an event name and are
//! called, in registration order, whenever an event with that name is
//! published.

use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace, warn};

use eventsub_common::models::{Notification, SubscriptionRequest};
use crate::Error;

pub const EVENT_ERROR: &str = "error";
pub const EVENT_CHALLENGE: &str = "challenge";
pub const EVENT_REVOCATION: &str = "revocation";
pub const EVENT_REFRESH: &str = "refresh";
pub const EVENT_TOKEN_REFRESH_FAILED: &str = "token.refresh_failed";
pub const EVENT_SUBSCRIPTION_FAILED: &str = "subscription.failed";

/// Handlers registered under this name receive every event.
pub const WILDCARD: &str = "*";

/// Everything the client can emit to application code.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A verified `notification`; its name is the subscription type,
    /// e.g. "stream.online".
    Notification(Notification),

    /// `webhook_callback_verification` body, emitted before the challenge is echoed.
    Challenge(Value),

    /// `revocation` body.
    Revocation(Value),

    Error(Arc<Error>),

    /// The token manager obtained a new access token.
    TokenRefreshed { access_token: String },

    /// A scheduled refresh gave up after `attempts` tries.
    TokenRefreshFailed { attempts: u32, error: Arc<Error> },

    /// A queued subscription could not be submitted during startup.
    SubscriptionFailed {
        request: SubscriptionRequest,
        error: Arc<Error>,
    },
}

impl ClientEvent {
    /// The name handlers register under.
    pub fn name(&self) -> &str {
        match self {
            ClientEvent::Notification(n) => n.event_type.as_str(),
            ClientEvent::Challenge(_) => EVENT_CHALLENGE,
            ClientEvent::Revocation(_) => EVENT_REVOCATION,
            ClientEvent::Error(_) => EVENT_ERROR,
            ClientEvent::TokenRefreshed { .. } => EVENT_REFRESH,
            ClientEvent::TokenRefreshFailed { .. } => EVENT_TOKEN_REFRESH_FAILED,
            ClientEvent::SubscriptionFailed { .. } => EVENT_SUBSCRIPTION_FAILED,
        }
    }

    pub fn error(err: Error) -> Self {
        ClientEvent::Error(Arc::new(err))
    }
}

/// Returns false once the handler can never deliver again.
type Handler = Arc<dyn Fn(&ClientEvent) -> bool + Send + Sync>;

/// Default size for each `listen` channel.
const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Name → ordered handler list. Cloning shares the same registry.
#[derive(Clone, Default)]
pub struct EventHub {
    handlers: Arc<RwLock<HashMap<String, Vec<Handler>>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for events named `name` (or [`WILDCARD`]).
    pub fn on<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .entry(name.into())
            .or_default()
            .push(Arc::new(move |event: &ClientEvent| {
                handler(event);
                true
            }));
    }

    /// Channel-backed subscription for async consumers.
    ///
    /// Delivery never blocks the publisher: if the buffer is full the event
    /// is dropped for this receiver and a warning is logged. Once the
    /// receiver is dropped the registration is removed on the next publish.
    pub fn listen(&self, name: impl Into<String>, buffer_size: Option<usize>) -> mpsc::Receiver<ClientEvent> {
        let name = name.into();
        let (tx, rx) = mpsc::channel(buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE));
        let label = name.clone();
        let handler: Handler = Arc::new(move |event: &ClientEvent| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("[EventHub] listener for '{}' is full; dropping '{}'", label, event.name());
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
        self.handlers.write().entry(name).or_default().push(handler);
        rx
    }

    /// Calls every handler registered for the event's name, then the
    /// wildcard handlers. Returns how many handlers ran.
    pub fn publish(&self, event: ClientEvent) -> usize {
        // Snapshot so handlers may register more handlers without deadlocking.
        let targets: Vec<Handler> = {
            let map = self.handlers.read();
            map.get(event.name())
                .into_iter()
                .chain(map.get(WILDCARD))
                .flat_map(|list| list.iter().cloned())
                .collect()
        };
        trace!("[EventHub] publishing '{}' to {} handler(s)", event.name(), targets.len());
        let mut closed = Vec::new();
        for handler in &targets {
            if !handler(&event) {
                closed.push(handler);
            }
        }
        if !closed.is_empty() {
            self.prune(&closed);
        }
        targets.len()
    }

    fn prune(&self, closed: &[&Handler]) {
        let mut map = self.handlers.write();
        for list in map.values_mut() {
            list.retain(|h| !closed.iter().any(|c| Arc::ptr_eq(*c, h)));
        }
        map.retain(|_, list| !list.is_empty());
        debug!("[EventHub] removed {} closed listener(s)", closed.len());
    }

    pub fn handler_count(&self, name: &str) -> usize {
        self.handlers.read().get(name).map(Vec::len).unwrap_or(0)
    }
}
