//! Inbound side: request verification, dispatch to the event hub and the
//! axum route that ties them together.

pub mod dispatch;
pub mod server;
pub mod verify;

pub use dispatch::{NotificationDispatcher, WebhookResponse};
pub use server::{router, WebhookHandler, WebhookRequest};
pub use verify::{sign_message, VerifyOutcome, WebhookVerifier};
