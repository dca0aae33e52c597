// File: eventsub-common/src/models/notification.rs

use std::fmt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::Error;

/// Value of the `Twitch-Eventsub-Message-Type` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Notification,
    Verification,
    Revocation,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Notification => "notification",
            MessageType::Verification => "webhook_callback_verification",
            MessageType::Revocation => "revocation",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for MessageType {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "notification" => Ok(MessageType::Notification),
            "webhook_callback_verification" => Ok(MessageType::Verification),
            "revocation" => Ok(MessageType::Revocation),
            other => Err(format!("unsupported message type '{other}'")),
        }
    }
}

/// A verified `notification` message: `{ "subscription": { ... }, "event": { ... } }`.
///
/// Both halves are kept as raw JSON; use [`Notification::event_as`] to get a
/// typed payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub event_type: String,
    pub subscription: Value,
    pub event: Value,
}

impl Notification {
    /// Pulls the envelope apart. The subscription's `type` must be a string,
    /// it becomes the name of the emitted event.
    pub fn from_envelope(body: Value) -> Result<Self, Error> {
        let Value::Object(mut map) = body else {
            return Err(Error::Payload("notification body must be a JSON object".into()));
        };
        let subscription = map
            .remove("subscription")
            .ok_or_else(|| Error::Payload("notification is missing 'subscription'".into()))?;
        let event_type = match subscription.get("type") {
            Some(Value::String(t)) => t.clone(),
            Some(other) => {
                return Err(Error::Payload(format!(
                    "expected subscription.type to be a string, received {other}"
                )));
            }
            None => {
                return Err(Error::Payload(
                    "expected subscription.type to be a string, received nothing".into(),
                ));
            }
        };
        let event = map.remove("event").unwrap_or(Value::Null);

        Ok(Self {
            event_type,
            subscription,
            event,
        })
    }

    /// Decodes the `event` object into one of the typed payloads.
    pub fn event_as<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_value(self.event.clone())?)
    }

    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription.get("id").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_type_parses_known_values() {
        assert_eq!(MessageType::try_from("notification"), Ok(MessageType::Notification));
        assert_eq!(
            MessageType::try_from("webhook_callback_verification"),
            Ok(MessageType::Verification)
        );
        assert_eq!(MessageType::try_from("revocation"), Ok(MessageType::Revocation));
        assert!(MessageType::try_from("Notification").is_err());
    }

    #[test]
    fn envelope_yields_type_and_event() {
        let n = Notification::from_envelope(json!({
            "subscription": { "id": "sub-1", "type": "stream.offline" },
            "event": { "broadcaster_user_id": "1337" }
        }))
        .unwrap();
        assert_eq!(n.event_type, "stream.offline");
        assert_eq!(n.subscription_id(), Some("sub-1"));
        assert_eq!(n.event["broadcaster_user_id"], "1337");
    }

    #[test]
    fn non_string_type_is_a_payload_error() {
        let err = Notification::from_envelope(json!({
            "subscription": { "type": 12 },
            "event": {}
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Payload(_)));

        let err = Notification::from_envelope(json!({ "subscription": {}, "event": {} })).unwrap_err();
        assert!(matches!(err, Error::Payload(_)));
    }
}
