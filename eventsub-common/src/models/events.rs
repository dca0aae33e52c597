// File: eventsub-common/src/models/events.rs
//
// Typed `event` payloads for the subscription types the client knows. Other
// types stay as raw JSON on the notification.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Payload of `stream.online`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamOnline {
    /// Stream id, not a user id.
    pub id: String,
    pub broadcaster_user_id: String,
    pub broadcaster_user_login: String,
    pub broadcaster_user_name: String,
    /// `live` for a normal stream; Twitch leaves it empty for some reruns.
    #[serde(default, rename = "type")]
    pub stream_type: String,
    pub started_at: DateTime<Utc>,
}

/// Payload of `stream.offline`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamOffline {
    pub broadcaster_user_id: String,
    pub broadcaster_user_login: String,
    pub broadcaster_user_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRaid {
    pub from_broadcaster_user_id: String,
    pub from_broadcaster_user_login: String,
    pub from_broadcaster_user_name: String,
    pub to_broadcaster_user_id: String,
    pub to_broadcaster_user_login: String,
    pub to_broadcaster_user_name: String,
    pub viewers: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::Error;
    use crate::models::Notification;

    fn notification(sub_type: &str, event: serde_json::Value) -> Notification {
        Notification::from_envelope(json!({
            "subscription": { "id": "sub-1", "type": sub_type, "version": "1" },
            "event": event
        }))
        .unwrap()
    }

    #[test]
    fn stream_online_type_defaults_to_empty() {
        let n = notification(
            "stream.online",
            json!({
                "id": "9001",
                "broadcaster_user_id": "1337",
                "broadcaster_user_login": "cool_user",
                "broadcaster_user_name": "Cool_User",
                "started_at": "2020-10-11T10:11:12.123Z"
            }),
        );
        let online: StreamOnline = n.event_as().unwrap();
        assert_eq!(online.id, "9001");
        assert_eq!(online.stream_type, "");
        assert_eq!(online.started_at.to_rfc3339(), "2020-10-11T10:11:12.123+00:00");
    }

    #[test]
    fn stream_offline_decodes_from_a_notification() {
        let n = notification(
            "stream.offline",
            json!({
                "broadcaster_user_id": "1337",
                "broadcaster_user_login": "cool_user",
                "broadcaster_user_name": "Cool_User"
            }),
        );
        let offline: StreamOffline = n.event_as().unwrap();
        assert_eq!(
            offline,
            StreamOffline {
                broadcaster_user_id: "1337".into(),
                broadcaster_user_login: "cool_user".into(),
                broadcaster_user_name: "Cool_User".into(),
            }
        );
    }

    #[test]
    fn channel_raid_decodes_both_sides_and_viewers() {
        let n = notification(
            "channel.raid",
            json!({
                "from_broadcaster_user_id": "1234",
                "from_broadcaster_user_login": "cool_user",
                "from_broadcaster_user_name": "Cool_User",
                "to_broadcaster_user_id": "1337",
                "to_broadcaster_user_login": "cooler_user",
                "to_broadcaster_user_name": "Cooler_User",
                "viewers": 9001
            }),
        );
        let raid: ChannelRaid = n.event_as().unwrap();
        assert_eq!(raid.from_broadcaster_user_login, "cool_user");
        assert_eq!(raid.to_broadcaster_user_id, "1337");
        assert_eq!(raid.viewers, 9001);
    }

    #[test]
    fn wrong_payload_shape_is_a_json_error() {
        let n = notification("channel.raid", json!({ "to_broadcaster_user_id": "1337", "viewers": "many" }));
        assert!(matches!(n.event_as::<ChannelRaid>(), Err(Error::Json(_))));
    }
}
