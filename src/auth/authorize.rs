// Interactive authorization: consent URL construction and redirect handling

use async_trait::async_trait;
use url::Url;

use super::types::AuthorizationResponse;
use crate::error::{AuthError, Result};

/// Scopes requested at sign-in: Drive, account email, YouTube read-write and
/// read-only. Space-joined into the `scope` query parameter.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/youtube.force-ssl",
    "https://www.googleapis.com/auth/youtube.readonly",
];

/// Single-shot redirect handler. Opens the authorization URL and resolves
/// exactly once with the outcome of the first redirect; cancellation arrives
/// as a `Denied` response or an error, never as a hang forever.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(
        &self,
        auth_url: Url,
        redirect_uri: &str,
    ) -> Result<AuthorizationResponse>;
}

/// Build the consent screen URL with the fixed parameter set
pub fn build_auth_url(
    auth_endpoint: &Url,
    client_id: &str,
    redirect_uri: &str,
    code_challenge: &str,
) -> Url {
    let mut url = auth_endpoint.clone();
    let scope = SCOPES.join(" ");
    url.query_pairs_mut()
        .append_pair("scope", &scope)
        .append_pair("access_type", "offline")
        .append_pair("include_granted_scopes", "true")
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("client_id", client_id)
        .append_pair("code_challenge_method", "S256")
        .append_pair("code_challenge", code_challenge);
    url
}

/// Fallback redirect handler for terminals without a browser or a usable
/// loopback port: prints the URL and reads the pasted redirect back.
pub struct PromptAuthenticator;

#[async_trait]
impl Authenticator for PromptAuthenticator {
    async fn authenticate(
        &self,
        auth_url: Url,
        redirect_uri: &str,
    ) -> Result<AuthorizationResponse> {
        println!("Open this URL in a browser and authorize access:");
        println!("\n  {auth_url}\n");
        println!("After approving you will be redirected to {redirect_uri}");
        let pasted: String = dialoguer::Input::new()
            .with_prompt("Paste the full redirect URL (or just the code)")
            .interact_text()
            .map_err(|e| AuthError::AuthorizationDenied(format!("prompt aborted: {e}")))?;
        Ok(parse_redirect(&pasted))
    }
}

/// Extract the authorization outcome from a pasted redirect URL or bare code
fn parse_redirect(input: &str) -> AuthorizationResponse {
    let input = input.trim();
    if input.is_empty() {
        return AuthorizationResponse::Denied("empty redirect".to_string());
    }
    if let Ok(url) = Url::parse(input) {
        let mut code = None;
        let mut error = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                _ => {}
            }
        }
        if let Some(code) = code {
            return AuthorizationResponse::Code(code);
        }
        return AuthorizationResponse::Denied(
            error.unwrap_or_else(|| "redirect carried no code".to_string()),
        );
    }
    // Not a URL, treat the paste as the bare code
    AuthorizationResponse::Code(input.to_string())
}
