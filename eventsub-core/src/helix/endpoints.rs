// File: eventsub-core/src/helix/endpoints.rs

pub const SUBSCRIPTIONS_URL: &str = "https://api.twitch.tv/helix/eventsub/subscriptions";
pub const OAUTH2_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";

/// Where the outbound calls go. Overridable so tests and proxies can point
/// the client somewhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    pub oauth_token: String,
    pub subscriptions: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            oauth_token: OAUTH2_TOKEN_URL.to_string(),
            subscriptions: SUBSCRIPTIONS_URL.to_string(),
        }
    }
}
