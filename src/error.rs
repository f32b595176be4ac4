// Error handling module
// Defines the error surface of the token lifecycle

use thiserror::Error;

/// Errors that can occur during sign-in, refresh, and revocation
#[derive(Error, Debug)]
pub enum AuthError {
    /// Endpoint unreachable, browser launch failed, or other transport-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Token endpoint answered with a non-2xx status; body kept for diagnostics
    #[error("Token endpoint error: {status} - {body}")]
    TokenEndpoint { status: u16, body: String },

    /// User cancelled the consent screen or the redirect carried no code
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    /// Token endpoint answered 2xx but the body is missing expected fields
    #[error("Malformed token response: {0}")]
    MalformedResponse(String),

    /// Revoke endpoint answered with a non-2xx status; local state is untouched
    #[error("Revocation failed: {status} - {body}")]
    RevocationFailed { status: u16, body: String },

    /// Credential or preference storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Result type alias for token lifecycle operations
pub type Result<T> = std::result::Result<T, AuthError>;
