// File: eventsub-core/src/webhook/verify.rs

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use http::StatusCode;
use parking_lot::Mutex;
use sha2::{Sha256, Sha512};
use tracing::{debug, warn};

use crate::utils::time::{parse_message_timestamp, Clock, SystemClock};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// How long a message id is remembered.
pub const DEDUP_WINDOW_SECS: i64 = 600;
/// Messages whose timestamp is older than this are refused.
pub const MAX_MESSAGE_AGE_SECS: i64 = 600;

/// Result of checking one inbound webhook request.
///
/// Only `Accepted` counts as valid; everything else is a rejection with its
/// own status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Accepted,
    /// Id, timestamp or signature header absent or empty.
    MissingHeaders,
    /// Id already seen inside the dedup window.
    Duplicate,
    InvalidTimestamp,
    StaleTimestamp,
    UnsupportedAlgorithm,
    BadSignature,
}

impl VerifyOutcome {
    pub fn status(&self) -> StatusCode {
        match self {
            VerifyOutcome::Accepted => StatusCode::OK,
            VerifyOutcome::Duplicate => StatusCode::NO_CONTENT,
            VerifyOutcome::MissingHeaders
            | VerifyOutcome::InvalidTimestamp
            | VerifyOutcome::StaleTimestamp
            | VerifyOutcome::UnsupportedAlgorithm
            | VerifyOutcome::BadSignature => StatusCode::BAD_REQUEST,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyOutcome::Accepted)
    }

    pub fn reason(&self) -> &'static str {
        match self {
            VerifyOutcome::Accepted => "accepted",
            VerifyOutcome::MissingHeaders => "missing id, timestamp or signature header",
            VerifyOutcome::Duplicate => "message id already processed",
            VerifyOutcome::InvalidTimestamp => "timestamp is not RFC 3339",
            VerifyOutcome::StaleTimestamp => "timestamp older than 10 minutes",
            VerifyOutcome::UnsupportedAlgorithm => "unsupported signature algorithm",
            VerifyOutcome::BadSignature => "signature mismatch",
        }
    }
}

/// Message ids with their expiry deadline. Expired entries are swept on
/// every access, so no timers are involved.
#[derive(Debug, Default)]
struct SeenMessages {
    deadlines: HashMap<String, DateTime<Utc>>,
    by_deadline: BTreeSet<(DateTime<Utc>, String)>,
}

impl SeenMessages {
    fn sweep(&mut self, now: DateTime<Utc>) {
        while let Some((deadline, _)) = self.by_deadline.first() {
            if *deadline > now {
                break;
            }
            if let Some((_, id)) = self.by_deadline.pop_first() {
                self.deadlines.remove(&id);
            }
        }
    }

    /// Records `id` unless it is still remembered. Returns true if it was new.
    fn insert_if_new(&mut self, id: &str, now: DateTime<Utc>, window: Duration) -> bool {
        self.sweep(now);
        if self.deadlines.contains_key(id) {
            return false;
        }
        let deadline = now + window;
        self.deadlines.insert(id.to_string(), deadline);
        self.by_deadline.insert((deadline, id.to_string()));
        true
    }

    fn len(&self) -> usize {
        self.deadlines.len()
    }
}

/// Checks authenticity, freshness and uniqueness of inbound webhook calls.
///
/// The order is fixed: headers present → dedup → timestamp → signature. A
/// replayed id is answered with 204 before any HMAC work happens.
pub struct WebhookVerifier {
    secret: Arc<str>,
    clock: Arc<dyn Clock>,
    seen: Mutex<SeenMessages>,
    dedup_window: Duration,
    max_age: Duration,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<Arc<str>>) -> Self {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    pub fn with_clock(secret: impl Into<Arc<str>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret: secret.into(),
            clock,
            seen: Mutex::new(SeenMessages::default()),
            dedup_window: Duration::seconds(DEDUP_WINDOW_SECS),
            max_age: Duration::seconds(MAX_MESSAGE_AGE_SECS),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Number of message ids currently remembered (after sweeping).
    pub fn remembered(&self) -> usize {
        let mut seen = self.seen.lock();
        seen.sweep(self.clock.now());
        seen.len()
    }

    pub fn verify(
        &self,
        body: &[u8],
        message_id: Option<&str>,
        timestamp: Option<&str>,
        signature: Option<&str>,
    ) -> VerifyOutcome {
        let (Some(message_id), Some(timestamp), Some(signature)) = (
            message_id.filter(|s| !s.is_empty()),
            timestamp.filter(|s| !s.is_empty()),
            signature.filter(|s| !s.is_empty()),
        ) else {
            warn!("[Webhook] rejecting request: missing verification headers");
            return VerifyOutcome::MissingHeaders;
        };

        let now = self.clock.now();
        if !self.seen.lock().insert_if_new(message_id, now, self.dedup_window) {
            debug!("[Webhook] duplicate message_id={}, ignoring", message_id);
            return VerifyOutcome::Duplicate;
        }

        let outcome = match parse_message_timestamp(timestamp) {
            None => VerifyOutcome::InvalidTimestamp,
            Some(sent_at) if now - sent_at > self.max_age => VerifyOutcome::StaleTimestamp,
            Some(_) => self.check_signature(message_id, timestamp, body, signature),
        };

        if outcome.is_valid() {
            debug!("[Webhook] message_id={} verified", message_id);
        } else {
            warn!("[Webhook] rejecting message_id={}: {}", message_id, outcome.reason());
        }
        outcome
    }

    fn check_signature(&self, message_id: &str, timestamp: &str, body: &[u8], header: &str) -> VerifyOutcome {
        let Some((algorithm, digest_hex)) = header.split_once('=') else {
            return VerifyOutcome::BadSignature;
        };
        let Ok(expected) = hex::decode(digest_hex) else {
            return VerifyOutcome::BadSignature;
        };
        let secret = self.secret.as_bytes();
        let matches = match algorithm.to_ascii_lowercase().as_str() {
            "sha256" => mac_matches::<HmacSha256>(secret, message_id, timestamp, body, &expected),
            "sha512" => mac_matches::<HmacSha512>(secret, message_id, timestamp, body, &expected),
            _ => return VerifyOutcome::UnsupportedAlgorithm,
        };
        if matches {
            VerifyOutcome::Accepted
        } else {
            VerifyOutcome::BadSignature
        }
    }
}

/// HMAC over `message_id + timestamp + body`, compared in constant time.
fn mac_matches<M: Mac + KeyInit>(
    secret: &[u8],
    message_id: &str,
    timestamp: &str,
    body: &[u8],
    expected: &[u8],
) -> bool {
    let Ok(mut mac) = <M as KeyInit>::new_from_slice(secret) else {
        return false;
    };
    mac.update(message_id.as_bytes());
    mac.update(timestamp.as_bytes());
    mac.update(body);
    mac.verify_slice(expected).is_ok()
}

/// Produces the `sha256=<hex>` header value Twitch would send for this message.
pub fn sign_message(secret: &str, message_id: &str, timestamp: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = <HmacSha256 as KeyInit>::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("hmac takes keys of any size"));
    mac.update(message_id.as_bytes());
    mac.update(timestamp.as_bytes());
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
