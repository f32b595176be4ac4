// Token endpoint calls: code exchange, refresh, revocation
//
// Exchange and refresh differ only in the form body; both flow through the
// same response handling. No retries here - the caller's next attempt is the
// retry mechanism.

use chrono::Utc;
use reqwest::Client;
use url::Url;

use super::types::{TokenGrant, TokenResponse};
use crate::error::{AuthError, Result};

/// Trade an authorization code (plus its PKCE verifier) for tokens
pub async fn exchange_code(
    client: &Client,
    token_endpoint: &Url,
    client_id: &str,
    code: &str,
    redirect_uri: &str,
    code_verifier: &str,
) -> Result<TokenGrant> {
    tracing::debug!("Exchanging authorization code for tokens");

    let form = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("client_id", client_id),
        ("code_verifier", code_verifier),
    ];

    post_token_form(client, token_endpoint, &form).await
}

/// Trade a refresh token for a fresh access token
pub async fn refresh(
    client: &Client,
    token_endpoint: &Url,
    client_id: &str,
    refresh_token: &str,
) -> Result<TokenGrant> {
    tracing::debug!("Refreshing access token");

    let form = [
        ("client_id", client_id),
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
    ];

    post_token_form(client, token_endpoint, &form).await
}

async fn post_token_form(
    client: &Client,
    endpoint: &Url,
    form: &[(&str, &str)],
) -> Result<TokenGrant> {
    let response = client
        .post(endpoint.clone())
        .form(form)
        .send()
        .await
        .map_err(|e| AuthError::Network(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AuthError::Network(e.to_string()))?;

    if !status.is_success() {
        return Err(AuthError::TokenEndpoint {
            status: status.as_u16(),
            body,
        });
    }

    let parsed: TokenResponse =
        serde_json::from_str(&body).map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

    if parsed.access_token.is_empty() {
        return Err(AuthError::MalformedResponse(
            "response does not contain an access token".to_string(),
        ));
    }

    let expires_at = Utc::now().timestamp() + parsed.expires_in;
    tracing::debug!(expires_at, "Token endpoint call succeeded");

    Ok(TokenGrant {
        access_token: parsed.access_token,
        expires_at,
        refresh_token: parsed.refresh_token,
    })
}

/// Revoke an access token. Non-2xx is a hard failure so the caller can keep
/// its local state consistent with what the server still considers valid.
pub async fn revoke(client: &Client, revoke_endpoint: &Url, access_token: &str) -> Result<()> {
    tracing::debug!("Revoking access token");

    let response = client
        .post(revoke_endpoint.clone())
        .form(&[("token", access_token)])
        .send()
        .await
        .map_err(|e| AuthError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::RevocationFailed {
            status: status.as_u16(),
            body,
        });
    }

    Ok(())
}
