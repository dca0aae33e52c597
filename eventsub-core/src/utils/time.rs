use std::fmt;
use chrono::{DateTime, Utc};

/// Source of "now" for the webhook freshness and dedup checks.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Parses a `Twitch-Eventsub-Message-Timestamp` value (RFC 3339, usually
/// with nanoseconds).
pub fn parse_message_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_twitch_timestamps() {
        let ts = parse_message_timestamp("2019-11-16T10:11:12.634234626Z").unwrap();
        assert_eq!(ts.timestamp(), 1573899072);
        assert!(parse_message_timestamp("yesterday").is_none());
        assert!(parse_message_timestamp("").is_none());
    }
}
