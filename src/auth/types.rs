// Token lifecycle types

use serde::Deserialize;

/// Complete credential set held in memory while signed in
#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiry of the access token, UTC epoch seconds
    pub expires_at: i64,
}

/// Fresh token material produced by a code exchange or refresh
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    /// Absolute expiry, UTC epoch seconds (now + expires_in at receipt)
    pub expires_at: i64,
    /// Present on the initial code exchange; refresh responses normally omit it
    pub refresh_token: Option<String>,
}

/// Token endpoint response body
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: i64,
    pub refresh_token: Option<String>,
}

/// Outcome of one interactive authorization round-trip
#[derive(Debug, Clone)]
pub enum AuthorizationResponse {
    /// The redirect carried an authorization code
    Code(String),
    /// The user cancelled or the provider reported an error
    Denied(String),
}

/// Snapshot of persisted credential state, for display without network calls
#[derive(Debug, Clone)]
pub struct StoredStatus {
    pub has_access_token: bool,
    pub has_refresh_token: bool,
    pub expires_at: Option<i64>,
}

/// Userinfo response, trimmed to what the sign-in health check needs
#[derive(Debug, Deserialize)]
pub struct UserProfile {
    pub email: Option<String>,
}

/// channels.list response, trimmed to the first snippet title
#[derive(Debug, Deserialize)]
pub struct ChannelList {
    #[serde(default)]
    pub items: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
pub struct Channel {
    pub snippet: Option<ChannelSnippet>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelSnippet {
    pub title: String,
}
