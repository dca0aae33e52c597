pub mod helpers;

pub use helpers::{signed_webhook, ManualClock, RecordingTransport};
