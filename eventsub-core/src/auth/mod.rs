// File: eventsub-core/src/auth/mod.rs

pub mod token_manager;

pub use token_manager::{AccessToken, AccessTokenManager, RetryPolicy, DEFAULT_REFRESH_INTERVAL};
