// File: eventsub-common/src/models/condition.rs

use std::fmt;
use serde::{Deserialize, Serialize};

/// Which condition shape a subscription type expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    BroadcasterUserId,
    CustomReward,
    UserId,
    ExtensionClientId,
    ClientId,
    ChannelRaid,
    DropEntitlementGrant,
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionKind::BroadcasterUserId => "broadcaster_user_id",
            ConditionKind::CustomReward => "custom_reward",
            ConditionKind::UserId => "user_id",
            ConditionKind::ExtensionClientId => "extension_client_id",
            ConditionKind::ClientId => "client_id",
            ConditionKind::ChannelRaid => "channel_raid",
            ConditionKind::DropEntitlementGrant => "drop_entitlement_grant",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BroadcasterUserIdCondition {
    pub broadcaster_user_id: String,
}

/// Channel points reward conditions. Without `reward_id` every reward of the
/// broadcaster matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRewardCondition {
    pub broadcaster_user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdCondition {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionClientIdCondition {
    pub extension_client_id: String,
}

/// `user.authorization.*` filter on the app's own client id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdCondition {
    pub client_id: String,
}

/// `channel.raid` takes exactly one of the two ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelRaidCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_broadcaster_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_broadcaster_user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropEntitlementGrantCondition {
    pub organization_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
}

/// Event-type-specific filter sent along with a subscription.
///
/// Serialized untagged, so the JSON is exactly the field set Twitch expects.
/// Variant order matters for deserialization: a bare broadcaster id must win
/// over a custom reward without `reward_id`, and the all-optional raid shape
/// goes last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    DropEntitlementGrant(DropEntitlementGrantCondition),
    BroadcasterUserId(BroadcasterUserIdCondition),
    CustomReward(CustomRewardCondition),
    UserId(UserIdCondition),
    ExtensionClientId(ExtensionClientIdCondition),
    ClientId(ClientIdCondition),
    ChannelRaid(ChannelRaidCondition),
}

impl Condition {
    pub fn broadcaster(id: impl Into<String>) -> Self {
        Condition::BroadcasterUserId(BroadcasterUserIdCondition {
            broadcaster_user_id: id.into(),
        })
    }

    pub fn user(id: impl Into<String>) -> Self {
        Condition::UserId(UserIdCondition { user_id: id.into() })
    }

    pub fn extension(client_id: impl Into<String>) -> Self {
        Condition::ExtensionClientId(ExtensionClientIdCondition {
            extension_client_id: client_id.into(),
        })
    }

    pub fn client(client_id: impl Into<String>) -> Self {
        Condition::ClientId(ClientIdCondition {
            client_id: client_id.into(),
        })
    }

    pub fn custom_reward(broadcaster_id: impl Into<String>, reward_id: Option<String>) -> Self {
        Condition::CustomReward(CustomRewardCondition {
            broadcaster_user_id: broadcaster_id.into(),
            reward_id,
        })
    }

    pub fn raid_from(broadcaster_id: impl Into<String>) -> Self {
        Condition::ChannelRaid(ChannelRaidCondition {
            from_broadcaster_user_id: Some(broadcaster_id.into()),
            to_broadcaster_user_id: None,
        })
    }

    pub fn raid_to(broadcaster_id: impl Into<String>) -> Self {
        Condition::ChannelRaid(ChannelRaidCondition {
            from_broadcaster_user_id: None,
            to_broadcaster_user_id: Some(broadcaster_id.into()),
        })
    }

    pub fn kind(&self) -> ConditionKind {
        match self {
            Condition::BroadcasterUserId(_) => ConditionKind::BroadcasterUserId,
            Condition::CustomReward(_) => ConditionKind::CustomReward,
            Condition::UserId(_) => ConditionKind::UserId,
            Condition::ExtensionClientId(_) => ConditionKind::ExtensionClientId,
            Condition::ClientId(_) => ConditionKind::ClientId,
            Condition::ChannelRaid(_) => ConditionKind::ChannelRaid,
            Condition::DropEntitlementGrant(_) => ConditionKind::DropEntitlementGrant,
        }
    }

    /// Checks the field-level rules Twitch enforces server side: every id
    /// that is present must be non-empty, and a raid names exactly one side.
    pub fn validate(&self) -> Result<(), String> {
        fn non_empty(field: &str, value: &str) -> Result<(), String> {
            if value.trim().is_empty() {
                Err(format!("{field} must not be empty"))
            } else {
                Ok(())
            }
        }
        fn optional(field: &str, value: &Option<String>) -> Result<(), String> {
            value.as_deref().map_or(Ok(()), |v| non_empty(field, v))
        }

        match self {
            Condition::BroadcasterUserId(c) => non_empty("broadcaster_user_id", &c.broadcaster_user_id),
            Condition::CustomReward(c) => {
                non_empty("broadcaster_user_id", &c.broadcaster_user_id)?;
                optional("reward_id", &c.reward_id)
            }
            Condition::UserId(c) => non_empty("user_id", &c.user_id),
            Condition::ExtensionClientId(c) => non_empty("extension_client_id", &c.extension_client_id),
            Condition::ClientId(c) => non_empty("client_id", &c.client_id),
            Condition::DropEntitlementGrant(c) => {
                non_empty("organization_id", &c.organization_id)?;
                optional("category_id", &c.category_id)?;
                optional("campaign_id", &c.campaign_id)
            }
            Condition::ChannelRaid(raid) => {
                match (&raid.from_broadcaster_user_id, &raid.to_broadcaster_user_id) {
                    (Some(id), None) => non_empty("from_broadcaster_user_id", id),
                    (None, Some(id)) => non_empty("to_broadcaster_user_id", id),
                    _ => Err(
                        "channel.raid needs exactly one of from_broadcaster_user_id / to_broadcaster_user_id"
                            .to_string(),
                    ),
                }
            }
        }
    }
}
