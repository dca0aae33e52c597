// src/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing credentials or host, malformed callback URL, request without a target.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The API was used in the wrong order, e.g. before a token exists.
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Twitch answered with a non-success status.
    #[error("Twitch API error: HTTP {status} => {body}")]
    Api { status: u16, body: String },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A verified webhook body did not have the expected shape.
    #[error("Payload error: {0}")]
    Payload(String),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}
