// Loopback redirect listener for the interactive flow
//
// Binds the loopback address named by the redirect URI, opens the system
// browser, and resolves with the first redirect that hits the callback path.
// The oneshot channel guarantees the flow resolves exactly once; a bounded
// wait guards against an abandoned browser tab.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::Query;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::sync::oneshot;
use url::Url;

use crate::auth::authorize::Authenticator;
use crate::auth::types::AuthorizationResponse;
use crate::error::{AuthError, Result};

const LANDING_PAGE: &str =
    "<html><body><p>Authorization complete. You can close this window.</p></body></html>";

/// Query parameters Google appends to the redirect
#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

pub struct LoopbackAuthenticator {
    /// How long to wait for the browser round-trip
    wait_timeout: Duration,
}

impl LoopbackAuthenticator {
    pub fn new(wait_timeout: Duration) -> Self {
        LoopbackAuthenticator { wait_timeout }
    }
}

#[async_trait]
impl Authenticator for LoopbackAuthenticator {
    async fn authenticate(
        &self,
        auth_url: Url,
        redirect_uri: &str,
    ) -> Result<AuthorizationResponse> {
        let (addr, path) = listen_target(redirect_uri)?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| AuthError::Network(format!("failed to bind {addr}: {e}")))?;

        let (tx, rx) = oneshot::channel::<AuthorizationResponse>();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let handler = move |Query(params): Query<CallbackParams>| {
            let tx = tx.clone();
            async move {
                if let Some(tx) = tx.lock().unwrap_or_else(|e| e.into_inner()).take() {
                    let _ = tx.send(outcome_from(params));
                }
                Html(LANDING_PAGE)
            }
        };
        let app = Router::new().route(&path, get(handler));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::warn!("Callback listener error: {e}");
            }
        });

        tracing::info!(%redirect_uri, "Waiting for the authorization redirect");
        if let Err(e) = open::that(auth_url.as_str()) {
            let _ = shutdown_tx.send(());
            let _ = server.await;
            return Err(AuthError::Network(format!(
                "could not launch system browser: {e}"
            )));
        }

        let outcome = match tokio::time::timeout(self.wait_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                AuthorizationResponse::Denied("redirect channel closed".to_string())
            }
            Err(_) => {
                AuthorizationResponse::Denied("timed out waiting for the redirect".to_string())
            }
        };

        let _ = shutdown_tx.send(());
        let _ = server.await;
        Ok(outcome)
    }
}

fn outcome_from(params: CallbackParams) -> AuthorizationResponse {
    match (params.code, params.error) {
        (Some(code), _) if !code.is_empty() => AuthorizationResponse::Code(code),
        (_, Some(error)) => AuthorizationResponse::Denied(error),
        _ => AuthorizationResponse::Denied("redirect carried no code".to_string()),
    }
}

/// Resolve the loopback bind address and callback path from the redirect URI
fn listen_target(redirect_uri: &str) -> Result<(SocketAddr, String)> {
    let url = Url::parse(redirect_uri)
        .map_err(|e| AuthError::Network(format!("invalid redirect URI {redirect_uri}: {e}")))?;

    if url.scheme() != "http" {
        return Err(AuthError::Network(format!(
            "loopback redirect must use http, got {redirect_uri}"
        )));
    }

    match url.host_str() {
        Some("127.0.0.1") | Some("localhost") => {}
        _ => {
            return Err(AuthError::Network(format!(
                "loopback redirect must target 127.0.0.1, got {redirect_uri}"
            )));
        }
    }

    let port = url.port_or_known_default().unwrap_or(80);
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    Ok((addr, url.path().to_string()))
}
