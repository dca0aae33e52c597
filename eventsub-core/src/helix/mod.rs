// File: eventsub-core/src/helix/mod.rs

pub mod endpoints;
pub mod request_builder;
pub mod subscriptions;

pub use endpoints::ApiEndpoints;
pub use request_builder::HelixRequestBuilder;
pub use subscriptions::{QueuedSubmission, SubscribeOutcome, SubscriptionManager};
