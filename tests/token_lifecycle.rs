// Integration tests for the token lifecycle
//
// These drive the manager through sign-in, refresh, and revocation against a
// mock token endpoint, asserting the persisted state after each transition.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use mockito::Matcher;
use url::Url;

use tubecast_auth::auth::authorize::Authenticator;
use tubecast_auth::auth::types::AuthorizationResponse;
use tubecast_auth::auth::TokenManager;
use tubecast_auth::config::Endpoints;
use tubecast_auth::error::{AuthError, Result as AuthResult};
use tubecast_auth::store::{
    MemoryStore, PrefStore, SecretStore, ACCESS_TOKEN_KEY, EXPIRY_KEY, REFRESH_TOKEN_KEY,
};

const REDIRECT_URI: &str = "http://127.0.0.1:12345/";

// ==================================================================================================
// Test Helpers
// ==================================================================================================

/// Authenticator double resolving with a canned response, counting calls
struct ScriptedAuthenticator {
    response: AuthorizationResponse,
    calls: AtomicUsize,
}

impl ScriptedAuthenticator {
    fn returning_code(code: &str) -> Arc<Self> {
        Arc::new(ScriptedAuthenticator {
            response: AuthorizationResponse::Code(code.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn denying(reason: &str) -> Arc<Self> {
        Arc::new(ScriptedAuthenticator {
            response: AuthorizationResponse::Denied(reason.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authenticator for ScriptedAuthenticator {
    async fn authenticate(
        &self,
        _auth_url: Url,
        _redirect_uri: &str,
    ) -> AuthResult<AuthorizationResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

fn endpoints_for(server: &mockito::Server) -> Endpoints {
    let base = server.url();
    let parse = |path: &str| Url::parse(&format!("{base}{path}")).unwrap();
    Endpoints {
        auth: parse("/auth"),
        token: parse("/token"),
        revoke: parse("/revoke"),
        userinfo: parse("/userinfo"),
        channels: parse("/channels"),
    }
}

fn manager_with(
    server: &mockito::Server,
    store: Arc<MemoryStore>,
    authenticator: Arc<ScriptedAuthenticator>,
) -> TokenManager {
    TokenManager::new(
        endpoints_for(server),
        "test-client-id".to_string(),
        REDIRECT_URI.to_string(),
        reqwest::Client::new(),
        store.clone(),
        store,
        authenticator,
    )
}

/// Seed the store with a full persisted credential set
async fn seed_credentials(store: &MemoryStore, access: &str, refresh: &str, expires_at: i64) {
    store.set(ACCESS_TOKEN_KEY, access).await.unwrap();
    store.set(REFRESH_TOKEN_KEY, refresh).await.unwrap();
    store.set_i64(EXPIRY_KEY, expires_at).await.unwrap();
}

// ==================================================================================================
// Interactive flow
// ==================================================================================================

#[tokio::test]
async fn fresh_install_runs_interactive_flow() {
    let mut server = mockito::Server::new_async().await;

    let token_mock = server
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            Matcher::UrlEncoded("code".into(), "abc".into()),
            Matcher::UrlEncoded("redirect_uri".into(), REDIRECT_URI.into()),
            Matcher::UrlEncoded("client_id".into(), "test-client-id".into()),
            // Fresh PKCE verifier: 32 bytes as unpadded url-safe base64
            Matcher::Regex("code_verifier=[A-Za-z0-9_-]{43}".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"access_token":"AT1","refresh_token":"RT1","expires_in":3600}"#)
        .create_async()
        .await;

    let userinfo_mock = server
        .mock("GET", "/userinfo")
        .match_header("authorization", "Bearer AT1")
        .with_status(200)
        .with_body(r#"{"email":"creator@example.com"}"#)
        .create_async()
        .await;

    server
        .mock("GET", "/channels")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"items":[{"snippet":{"title":"Creator Channel"}}]}"#)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let authenticator = ScriptedAuthenticator::returning_code("abc");
    let manager = manager_with(&server, store.clone(), authenticator.clone());

    let before = Utc::now().timestamp();
    manager.ensure_signed_in().await.unwrap();

    token_mock.assert_async().await;
    userinfo_mock.assert_async().await;

    assert_eq!(authenticator.calls(), 1);
    assert!(manager.is_signed_in());
    assert_eq!(manager.bearer_token().as_deref(), Some("AT1"));
    assert_eq!(manager.email().as_deref(), Some("creator@example.com"));

    // Persisted state: both tokens plus an absolute expiry of now + 3600
    assert_eq!(
        store.get(ACCESS_TOKEN_KEY).await.unwrap().as_deref(),
        Some("AT1")
    );
    assert_eq!(
        store.get(REFRESH_TOKEN_KEY).await.unwrap().as_deref(),
        Some("RT1")
    );
    let expires_at = store.get_i64(EXPIRY_KEY).await.unwrap().unwrap();
    assert!(expires_at >= before + 3600 && expires_at <= before + 3605);
}

#[tokio::test]
async fn denied_authorization_leaves_no_state() {
    let mut server = mockito::Server::new_async().await;
    let token_mock = server
        .mock("POST", "/token")
        .expect(0)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let authenticator = ScriptedAuthenticator::denying("access_denied");
    let manager = manager_with(&server, store.clone(), authenticator.clone());

    let err = manager.ensure_signed_in().await.unwrap_err();
    match err {
        AuthError::AuthorizationDenied(reason) => assert_eq!(reason, "access_denied"),
        other => panic!("expected AuthorizationDenied, got {other:?}"),
    }

    token_mock.assert_async().await;
    assert_eq!(authenticator.calls(), 1);
    assert!(!manager.is_signed_in());
    assert!(store.get(ACCESS_TOKEN_KEY).await.unwrap().is_none());
    assert!(store.get(REFRESH_TOKEN_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn malformed_exchange_response_surfaces() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/token")
        .with_status(200)
        .with_body(r#"{"token_type":"Bearer"}"#)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let authenticator = ScriptedAuthenticator::returning_code("abc");
    let manager = manager_with(&server, store, authenticator);

    let err = manager.ensure_signed_in().await.unwrap_err();
    assert!(matches!(err, AuthError::MalformedResponse(_)));
    assert!(!manager.is_signed_in());
}

// ==================================================================================================
// Silent refresh
// ==================================================================================================

#[tokio::test]
async fn expired_token_refreshes_without_browser() {
    let mut server = mockito::Server::new_async().await;
    let now = Utc::now().timestamp();

    let token_mock = server
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("client_id".into(), "test-client-id".into()),
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "RT1".into()),
        ]))
        .with_status(200)
        // Refresh responses normally omit the refresh token
        .with_body(r#"{"access_token":"AT2","expires_in":3600}"#)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    seed_credentials(&store, "AT1", "RT1", now - 100).await;

    let authenticator = ScriptedAuthenticator::returning_code("unused");
    let manager = manager_with(&server, store.clone(), authenticator.clone());

    manager.ensure_signed_in().await.unwrap();

    token_mock.assert_async().await;
    assert_eq!(authenticator.calls(), 0, "browser flow must not run");
    assert_eq!(manager.bearer_token().as_deref(), Some("AT2"));

    // The stored refresh token survives a response that omitted it
    assert_eq!(
        store.get(REFRESH_TOKEN_KEY).await.unwrap().as_deref(),
        Some("RT1")
    );
}

#[tokio::test]
async fn refresh_failure_propagates_without_interactive_fallback() {
    let mut server = mockito::Server::new_async().await;
    let now = Utc::now().timestamp();

    server
        .mock("POST", "/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    seed_credentials(&store, "AT1", "RT1", now - 100).await;

    let authenticator = ScriptedAuthenticator::returning_code("unused");
    let manager = manager_with(&server, store.clone(), authenticator.clone());

    let err = manager.ensure_signed_in().await.unwrap_err();
    match err {
        AuthError::TokenEndpoint { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("expected TokenEndpoint, got {other:?}"),
    }

    assert_eq!(authenticator.calls(), 0, "failed refresh must not escalate");
    assert!(!manager.is_signed_in());
    // The stale refresh token stays put; the caller decides what happens next
    assert_eq!(
        store.get(REFRESH_TOKEN_KEY).await.unwrap().as_deref(),
        Some("RT1")
    );
}

#[tokio::test]
async fn valid_token_is_reused_without_network_calls() {
    let mut server = mockito::Server::new_async().await;
    let now = Utc::now().timestamp();

    let token_mock = server
        .mock("POST", "/token")
        .expect(0)
        .create_async()
        .await;
    let userinfo_mock = server
        .mock("GET", "/userinfo")
        .with_status(200)
        .with_body(r#"{"email":"creator@example.com"}"#)
        .expect(1)
        .create_async()
        .await;
    let channels_mock = server
        .mock("GET", "/channels")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"items":[]}"#)
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    seed_credentials(&store, "AT1", "RT1", now + 3600).await;

    let authenticator = ScriptedAuthenticator::returning_code("unused");
    let manager = manager_with(&server, store, authenticator.clone());

    // First call loads the persisted credential and runs the health check
    manager.ensure_signed_in().await.unwrap();
    assert!(manager.is_signed_in());
    assert_eq!(manager.bearer_token().as_deref(), Some("AT1"));

    // Second call is a no-op: zero additional network calls
    manager.ensure_signed_in().await.unwrap();

    token_mock.assert_async().await;
    userinfo_mock.assert_async().await;
    channels_mock.assert_async().await;
    assert_eq!(authenticator.calls(), 0);
}

// ==================================================================================================
// Sign-out
// ==================================================================================================

async fn signed_in_manager(server: &mockito::Server, store: Arc<MemoryStore>) -> TokenManager {
    let now = Utc::now().timestamp();
    seed_credentials(&store, "AT1", "RT1", now + 3600).await;

    let manager = manager_with(
        server,
        store,
        ScriptedAuthenticator::returning_code("unused"),
    );
    manager.ensure_signed_in().await.unwrap();
    assert!(manager.is_signed_in());
    manager
}

#[tokio::test]
async fn sign_out_revokes_and_clears_everything() {
    let mut server = mockito::Server::new_async().await;
    let revoke_mock = server
        .mock("POST", "/revoke")
        .match_body(Matcher::UrlEncoded("token".into(), "AT1".into()))
        .with_status(200)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let manager = signed_in_manager(&server, store.clone()).await;

    manager.sign_out().await.unwrap();

    revoke_mock.assert_async().await;
    assert!(!manager.is_signed_in());
    assert!(manager.email().is_none());
    assert!(manager.bearer_token().is_none());
    assert!(store.get(ACCESS_TOKEN_KEY).await.unwrap().is_none());
    assert!(store.get(REFRESH_TOKEN_KEY).await.unwrap().is_none());
    assert!(store.get_i64(EXPIRY_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn sign_out_failure_keeps_local_state() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/revoke")
        .with_status(500)
        .with_body("revocation backend down")
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let manager = signed_in_manager(&server, store.clone()).await;

    let err = manager.sign_out().await.unwrap_err();
    match err {
        AuthError::RevocationFailed { status, .. } => assert_eq!(status, 500),
        other => panic!("expected RevocationFailed, got {other:?}"),
    }

    // Still signed in, every persisted key untouched
    assert!(manager.is_signed_in());
    assert_eq!(manager.bearer_token().as_deref(), Some("AT1"));
    assert_eq!(
        store.get(ACCESS_TOKEN_KEY).await.unwrap().as_deref(),
        Some("AT1")
    );
    assert_eq!(
        store.get(REFRESH_TOKEN_KEY).await.unwrap().as_deref(),
        Some("RT1")
    );
    assert!(store.get_i64(EXPIRY_KEY).await.unwrap().is_some());
}

#[tokio::test]
async fn sign_out_without_credentials_is_a_noop() {
    let mut server = mockito::Server::new_async().await;
    let revoke_mock = server
        .mock("POST", "/revoke")
        .expect(0)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let manager = manager_with(
        &server,
        store,
        ScriptedAuthenticator::returning_code("unused"),
    );

    manager.sign_out().await.unwrap();
    revoke_mock.assert_async().await;
    assert!(!manager.is_signed_in());
}

// ==================================================================================================
// Resume and storage failures
// ==================================================================================================

#[tokio::test]
async fn try_resume_refreshes_from_stored_refresh_token() {
    let mut server = mockito::Server::new_async().await;
    let now = Utc::now().timestamp();

    server
        .mock("POST", "/token")
        .with_status(200)
        .with_body(r#"{"access_token":"AT2","expires_in":3600}"#)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    seed_credentials(&store, "AT1", "RT1", now - 100).await;

    let authenticator = ScriptedAuthenticator::returning_code("unused");
    let manager = manager_with(&server, store, authenticator.clone());

    assert!(manager.try_resume().await.unwrap());
    assert!(manager.is_signed_in());
    assert_eq!(authenticator.calls(), 0);
}

#[tokio::test]
async fn storage_failure_surfaces_as_error() {
    let server = mockito::Server::new_async().await;

    let store = Arc::new(MemoryStore::new());
    store.fail_all(true);

    let manager = manager_with(
        &server,
        store,
        ScriptedAuthenticator::returning_code("unused"),
    );

    let err = manager.ensure_signed_in().await.unwrap_err();
    assert!(matches!(err, AuthError::Storage(_)));
    assert!(!manager.is_signed_in());
}
