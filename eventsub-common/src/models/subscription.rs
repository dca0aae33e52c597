// File: eventsub-common/src/models/subscription.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::condition::{Condition, ConditionKind};

/// EventSub subscription types this library knows how to register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionType {
    StreamOnline,
    StreamOffline,
    ChannelUpdate,
    ChannelFollow,
    ChannelSubscribe,
    ChannelCheer,
    ChannelRaid,
    ChannelBan,
    ChannelUnban,
    ChannelPointsCustomRewardAdd,
    ChannelPointsCustomRewardUpdate,
    ChannelPointsCustomRewardRemove,
    ChannelPointsCustomRewardRedemptionAdd,
    ChannelPointsCustomRewardRedemptionUpdate,
    DropEntitlementGrant,
    ExtensionBitsTransactionCreate,
    UserUpdate,
    UserAuthorizationGrant,
    UserAuthorizationRevoke,
}

impl SubscriptionType {
    pub const ALL: [SubscriptionType; 19] = [
        SubscriptionType::StreamOnline,
        SubscriptionType::StreamOffline,
        SubscriptionType::ChannelUpdate,
        SubscriptionType::ChannelFollow,
        SubscriptionType::ChannelSubscribe,
        SubscriptionType::ChannelCheer,
        SubscriptionType::ChannelRaid,
        SubscriptionType::ChannelBan,
        SubscriptionType::ChannelUnban,
        SubscriptionType::ChannelPointsCustomRewardAdd,
        SubscriptionType::ChannelPointsCustomRewardUpdate,
        SubscriptionType::ChannelPointsCustomRewardRemove,
        SubscriptionType::ChannelPointsCustomRewardRedemptionAdd,
        SubscriptionType::ChannelPointsCustomRewardRedemptionUpdate,
        SubscriptionType::DropEntitlementGrant,
        SubscriptionType::ExtensionBitsTransactionCreate,
        SubscriptionType::UserUpdate,
        SubscriptionType::UserAuthorizationGrant,
        SubscriptionType::UserAuthorizationRevoke,
    ];

    /// The wire name, which is also the name of the local event emitted for it.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionType::StreamOnline => "stream.online",
            SubscriptionType::StreamOffline => "stream.offline",
            SubscriptionType::ChannelUpdate => "channel.update",
            SubscriptionType::ChannelFollow => "channel.follow",
            SubscriptionType::ChannelSubscribe => "channel.subscribe",
            SubscriptionType::ChannelCheer => "channel.cheer",
            SubscriptionType::ChannelRaid => "channel.raid",
            SubscriptionType::ChannelBan => "channel.ban",
            SubscriptionType::ChannelUnban => "channel.unban",
            SubscriptionType::ChannelPointsCustomRewardAdd => "channel.channel_points_custom_reward.add",
            SubscriptionType::ChannelPointsCustomRewardUpdate => "channel.channel_points_custom_reward.update",
            SubscriptionType::ChannelPointsCustomRewardRemove => "channel.channel_points_custom_reward.remove",
            SubscriptionType::ChannelPointsCustomRewardRedemptionAdd => "channel.channel_points_custom_reward_redemption.add",
            SubscriptionType::ChannelPointsCustomRewardRedemptionUpdate => "channel.channel_points_custom_reward_redemption.update",
            SubscriptionType::DropEntitlementGrant => "drop.entitlement.grant",
            SubscriptionType::ExtensionBitsTransactionCreate => "extension.bits_transaction.create",
            SubscriptionType::UserUpdate => "user.update",
            SubscriptionType::UserAuthorizationGrant => "user.authorization.grant",
            SubscriptionType::UserAuthorizationRevoke => "user.authorization.revoke",
        }
    }

    /// The condition shape Twitch requires for this type.
    pub fn condition_kind(&self) -> ConditionKind {
        match self {
            SubscriptionType::StreamOnline
            | SubscriptionType::StreamOffline
            | SubscriptionType::ChannelUpdate
            | SubscriptionType::ChannelFollow
            | SubscriptionType::ChannelSubscribe
            | SubscriptionType::ChannelCheer
            | SubscriptionType::ChannelBan
            | SubscriptionType::ChannelUnban => ConditionKind::BroadcasterUserId,
            SubscriptionType::ChannelRaid => ConditionKind::ChannelRaid,
            SubscriptionType::ChannelPointsCustomRewardAdd => ConditionKind::BroadcasterUserId,
            SubscriptionType::ChannelPointsCustomRewardUpdate
            | SubscriptionType::ChannelPointsCustomRewardRemove
            | SubscriptionType::ChannelPointsCustomRewardRedemptionAdd
            | SubscriptionType::ChannelPointsCustomRewardRedemptionUpdate => ConditionKind::CustomReward,
            SubscriptionType::DropEntitlementGrant => ConditionKind::DropEntitlementGrant,
            SubscriptionType::ExtensionBitsTransactionCreate => ConditionKind::ExtensionClientId,
            SubscriptionType::UserUpdate => ConditionKind::UserId,
            SubscriptionType::UserAuthorizationGrant
            | SubscriptionType::UserAuthorizationRevoke => ConditionKind::ClientId,
        }
    }

    /// Whether `condition` is acceptable for this type. A reward condition
    /// without a `reward_id` is just a broadcaster filter, so the two shapes
    /// are interchangeable where rewards are concerned.
    pub fn accepts(&self, condition: &Condition) -> bool {
        let expected = self.condition_kind();
        let got = condition.kind();
        expected == got
            || (expected == ConditionKind::CustomReward && got == ConditionKind::BroadcasterUserId)
    }
}

impl fmt::Display for SubscriptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SubscriptionType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubscriptionType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown subscription type: {}", s))
    }
}

impl Serialize for SubscriptionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SubscriptionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// How Twitch delivers notifications for a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transport {
    pub method: String,
    pub callback: String,
    /// Only present on requests; Twitch never echoes it back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl Transport {
    pub fn webhook(callback: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            method: "webhook".to_string(),
            callback: callback.into(),
            secret: Some(secret.into()),
        }
    }
}

/// Body of `POST /helix/eventsub/subscriptions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionRequest {
    #[serde(rename = "type")]
    pub sub_type: SubscriptionType,
    pub version: String,
    pub condition: Condition,
    pub transport: Transport,
}

impl SubscriptionRequest {
    pub fn new(sub_type: SubscriptionType, condition: Condition, transport: Transport) -> Self {
        Self {
            sub_type,
            version: "1".to_string(),
            condition,
            transport,
        }
    }
}

/// Status values Twitch reports for a subscription, also usable as a list filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Enabled,
    WebhookCallbackVerificationPending,
    WebhookCallbackVerificationFailed,
    NotificationFailuresExceeded,
    AuthorizationRevoked,
    ModeratorRemoved,
    UserRemoved,
    VersionRemoved,
    #[serde(other)]
    Unknown,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Enabled => "enabled",
            SubscriptionStatus::WebhookCallbackVerificationPending => "webhook_callback_verification_pending",
            SubscriptionStatus::WebhookCallbackVerificationFailed => "webhook_callback_verification_failed",
            SubscriptionStatus::NotificationFailuresExceeded => "notification_failures_exceeded",
            SubscriptionStatus::AuthorizationRevoked => "authorization_revoked",
            SubscriptionStatus::ModeratorRemoved => "moderator_removed",
            SubscriptionStatus::UserRemoved => "user_removed",
            SubscriptionStatus::VersionRemoved => "version_removed",
            SubscriptionStatus::Unknown => "unknown",
        }
    }
}

/// A subscription as Helix returns it.
///
/// `type` stays a plain string so listing never fails on types this crate
/// does not model.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Subscription {
    pub id: String,
    #[serde(rename = "type")]
    pub sub_type: String,
    pub version: String,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub cost: u32,

    #[serde(default)]
    pub condition: serde_json::Value,

    #[serde(default)]
    pub transport: serde_json::Value,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Pagination {
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Response of both create and list calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionList {
    pub data: Vec<Subscription>,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub total_cost: u32,
    #[serde(default)]
    pub max_total_cost: u32,
    #[serde(default)]
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_matches_helix_shape() {
        let req = SubscriptionRequest::new(
            SubscriptionType::StreamOnline,
            Condition::broadcaster("1337"),
            Transport::webhook("https://example.com/hooks", "s3cr3t-value"),
        );
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "type": "stream.online",
                "version": "1",
                "condition": { "broadcaster_user_id": "1337" },
                "transport": {
                    "method": "webhook",
                    "callback": "https://example.com/hooks",
                    "secret": "s3cr3t-value"
                }
            })
        );
    }

    #[test]
    fn type_names_round_trip_through_from_str() {
        for t in SubscriptionType::ALL {
            assert_eq!(t.as_str().parse::<SubscriptionType>().unwrap(), t);
        }
        assert!("channel.nonsense".parse::<SubscriptionType>().is_err());
    }

    #[test]
    fn condition_compatibility() {
        assert!(SubscriptionType::StreamOnline.accepts(&Condition::broadcaster("1")));
        assert!(!SubscriptionType::StreamOnline.accepts(&Condition::user("1")));
        assert!(SubscriptionType::ChannelRaid.accepts(&Condition::raid_from("1")));
        assert!(SubscriptionType::ChannelPointsCustomRewardRedemptionAdd
            .accepts(&Condition::broadcaster("1")));
        assert!(SubscriptionType::UserUpdate.accepts(&Condition::user("1")));
    }

    #[test]
    fn list_response_tolerates_unknown_status() {
        let list: SubscriptionList = serde_json::from_value(json!({
            "data": [{
                "id": "f1c2a387-161a-49f9-a165-0f21d7a4e1c4",
                "type": "stream.online",
                "version": "1",
                "status": "something_new",
                "cost": 1,
                "condition": { "broadcaster_user_id": "1337" },
                "transport": { "method": "webhook", "callback": "https://example.com/hooks" },
                "created_at": "2019-11-16T10:11:12.634234626Z"
            }],
            "total": 1,
            "total_cost": 1,
            "max_total_cost": 10000,
            "pagination": {}
        }))
        .unwrap();
        assert_eq!(list.data.len(), 1);
        assert_eq!(list.data[0].status, SubscriptionStatus::Unknown);
        assert!(list.data[0].created_at.is_some());
    }

    #[test]
    fn user_authorization_types_take_a_client_id() {
        assert!(SubscriptionType::UserAuthorizationGrant.accepts(&Condition::client("my-client-id")));
        assert!(!SubscriptionType::UserAuthorizationRevoke.accepts(&Condition::extension("my-client-id")));

        let req = SubscriptionRequest::new(
            SubscriptionType::UserAuthorizationGrant,
            Condition::client("my-client-id"),
            Transport::webhook("https://example.com/hooks", "s3cr3t-value"),
        );
        let wire = serde_json::to_value(&req).unwrap();
        assert_eq!(wire["type"], "user.authorization.grant");
        assert_eq!(wire["condition"], json!({ "client_id": "my-client-id" }));
    }
}
