// File: eventsub-common/src/models/mod.rs
pub mod condition;
pub mod subscription;
pub mod notification;
pub mod events;

pub use condition::{Condition, ConditionKind};
pub use subscription::{
    Subscription, SubscriptionList, SubscriptionRequest, SubscriptionStatus, SubscriptionType,
    Transport,
};
pub use notification::{MessageType, Notification};
pub use events::{ChannelRaid, StreamOffline, StreamOnline};
