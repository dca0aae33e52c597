// src/lib.rs

pub mod auth;
pub mod client;
pub mod config;
pub mod eventbus;
pub mod helix;
pub mod http;
pub mod utils;
pub mod webhook;
pub mod test_utils;

pub use client::EventSubClient;
pub use config::ClientConfig;
pub use eventbus::{ClientEvent, EventHub};
pub use eventsub_common::error::Error;
pub use http::{DefaultHttpTransport, HttpTransport};
