use std::sync::{Arc, RwLock};

use chrono::Utc;
use reqwest::Client;
use tokio::sync::Mutex;

use super::authorize::{self, Authenticator};
use super::exchange;
use super::pkce::PkcePair;
use super::profile;
use super::types::{AuthorizationResponse, Credential, StoredStatus, TokenGrant};
use crate::config::Endpoints;
use crate::error::{AuthError, Result};
use crate::store::{PrefStore, SecretStore, ACCESS_TOKEN_KEY, EXPIRY_KEY, REFRESH_TOKEN_KEY};

/// Safety buffer subtracted from "now" when judging expiry, absorbing clock
/// skew and request latency
const EXPIRY_SKEW_SECS: i64 = 10;

/// Token lifecycle manager
///
/// Owns credential acquisition (interactive PKCE flow), persistence, expiry
/// tracking, silent refresh, and revocation. Constructed once by the
/// composition root and shared by reference; operations are serialized behind
/// a single guard so concurrent callers cannot race on the persisted stores.
pub struct TokenManager {
    endpoints: Endpoints,
    client_id: String,
    redirect_uri: String,

    /// Shared HTTP client for token endpoint and health check calls
    client: Client,

    secrets: Arc<dyn SecretStore>,
    prefs: Arc<dyn PrefStore>,
    authenticator: Arc<dyn Authenticator>,

    /// One sign-in/sign-out operation at a time
    op_lock: Mutex<()>,

    /// In-memory credential; present iff signed in
    credential: RwLock<Option<Credential>>,
    email: RwLock<Option<String>>,
}

/// Strictly-greater comparison so an expiry sitting exactly on the skew
/// boundary still counts as valid
fn is_expired(now: i64, expires_at: i64) -> bool {
    now - EXPIRY_SKEW_SECS > expires_at
}

impl TokenManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        endpoints: Endpoints,
        client_id: String,
        redirect_uri: String,
        client: Client,
        secrets: Arc<dyn SecretStore>,
        prefs: Arc<dyn PrefStore>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        TokenManager {
            endpoints,
            client_id,
            redirect_uri,
            client,
            secrets,
            prefs,
            authenticator,
            op_lock: Mutex::new(()),
            credential: RwLock::new(None),
            email: RwLock::new(None),
        }
    }

    /// Signed in iff a credential with a non-empty access token is in memory
    pub fn is_signed_in(&self) -> bool {
        self.credential
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|c| !c.access_token.is_empty())
    }

    /// Email of the signed-in account, once the health check has resolved it
    pub fn email(&self) -> Option<String> {
        self.email
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Opaque bearer handle for downstream API clients
    pub fn bearer_token(&self) -> Option<String> {
        self.credential
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|c| c.access_token.clone())
    }

    /// Absolute expiry of the in-memory access token, UTC epoch seconds
    pub fn expires_at(&self) -> Option<i64> {
        self.credential
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|c| c.expires_at)
    }

    /// Idempotent sign-in entry point
    ///
    /// Reuses the persisted access token while it is valid, refreshes
    /// silently when a refresh token exists, and only falls back to the
    /// interactive browser flow when there is nothing to refresh with. A
    /// failed refresh propagates; it never silently escalates to the
    /// interactive flow.
    pub async fn ensure_signed_in(&self) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        let expires_at = self.prefs.get_i64(EXPIRY_KEY).await?.unwrap_or(0);
        let expired = is_expired(Utc::now().timestamp(), expires_at);
        let refresh_token = self.secrets.get(REFRESH_TOKEN_KEY).await?;

        match refresh_token {
            Some(refresh_token) if expired => {
                tracing::debug!("Access token expired, using refresh token");
                let grant = exchange::refresh(
                    &self.client,
                    &self.endpoints.token,
                    &self.client_id,
                    &refresh_token,
                )
                .await?;
                self.persist_grant(&grant).await?;
            }
            Some(_) => {
                if self.is_signed_in() {
                    tracing::debug!("Access token still valid, nothing to do");
                    return Ok(());
                }
                tracing::debug!("Reusing persisted access token");
            }
            None => {
                tracing::debug!("No refresh token, starting interactive sign-in");
                self.interactive_sign_in().await?;
            }
        }

        self.load_credential().await?;
        self.health_check().await;
        Ok(())
    }

    /// Restore a session at startup: signs in silently when a refresh token
    /// is persisted, otherwise leaves the manager signed out. Returns whether
    /// the manager ended up signed in.
    pub async fn try_resume(&self) -> Result<bool> {
        if self.is_signed_in() {
            return Ok(true);
        }
        if self.secrets.get(REFRESH_TOKEN_KEY).await?.is_none() {
            return Ok(false);
        }
        self.ensure_signed_in().await?;
        Ok(true)
    }

    /// Revoke the current access token and clear local state
    ///
    /// The revocation response is awaited and checked; on failure nothing
    /// local is cleared, so the manager never claims "signed out" while the
    /// server may still consider the token valid.
    pub async fn sign_out(&self) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        let access_token = match self.secrets.get(ACCESS_TOKEN_KEY).await? {
            Some(token) => token,
            None => {
                tracing::debug!("No stored access token, nothing to revoke");
                self.clear_local().await?;
                return Ok(());
            }
        };

        exchange::revoke(&self.client, &self.endpoints.revoke, &access_token).await?;
        tracing::info!("Access token revoked");
        self.clear_local().await
    }

    /// Persisted credential state for display, no network calls
    pub async fn stored_status(&self) -> Result<StoredStatus> {
        Ok(StoredStatus {
            has_access_token: self.secrets.get(ACCESS_TOKEN_KEY).await?.is_some(),
            has_refresh_token: self.secrets.get(REFRESH_TOKEN_KEY).await?.is_some(),
            expires_at: self.prefs.get_i64(EXPIRY_KEY).await?,
        })
    }

    async fn interactive_sign_in(&self) -> Result<()> {
        let pkce = PkcePair::generate();
        let auth_url = authorize::build_auth_url(
            &self.endpoints.auth,
            &self.client_id,
            &self.redirect_uri,
            &pkce.challenge,
        );

        let response = self
            .authenticator
            .authenticate(auth_url, &self.redirect_uri)
            .await?;

        let code = match response {
            AuthorizationResponse::Code(code) => code,
            AuthorizationResponse::Denied(reason) => {
                return Err(AuthError::AuthorizationDenied(reason));
            }
        };

        let grant = exchange::exchange_code(
            &self.client,
            &self.endpoints.token,
            &self.client_id,
            &code,
            &self.redirect_uri,
            &pkce.verifier,
        )
        .await?;

        self.persist_grant(&grant).await
    }

    /// Persist fresh token material. The refresh token is written only when
    /// the response carried one; a refresh response without it must not
    /// clobber the stored token.
    async fn persist_grant(&self, grant: &TokenGrant) -> Result<()> {
        self.secrets.set(ACCESS_TOKEN_KEY, &grant.access_token).await?;
        self.prefs.set_i64(EXPIRY_KEY, grant.expires_at).await?;
        if let Some(ref refresh_token) = grant.refresh_token {
            self.secrets.set(REFRESH_TOKEN_KEY, refresh_token).await?;
        }
        Ok(())
    }

    /// Load the persisted credential into memory, making the manager signed in
    async fn load_credential(&self) -> Result<()> {
        let access_token = self
            .secrets
            .get(ACCESS_TOKEN_KEY)
            .await?
            .ok_or_else(|| AuthError::Storage(anyhow::anyhow!("no access token in store")))?;
        let refresh_token = self
            .secrets
            .get(REFRESH_TOKEN_KEY)
            .await?
            .unwrap_or_default();
        let expires_at = self.prefs.get_i64(EXPIRY_KEY).await?.unwrap_or(0);

        *self.credential.write().unwrap_or_else(|e| e.into_inner()) = Some(Credential {
            access_token,
            refresh_token,
            expires_at,
        });
        Ok(())
    }

    async fn clear_local(&self) -> Result<()> {
        self.secrets.remove(ACCESS_TOKEN_KEY).await?;
        self.secrets.remove(REFRESH_TOKEN_KEY).await?;
        self.prefs.remove(EXPIRY_KEY).await?;
        *self.credential.write().unwrap_or_else(|e| e.into_inner()) = None;
        *self.email.write().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }

    /// Best-effort profile and channel lookup after a successful sign-in.
    /// Failures are logged and do not invalidate the sign-in.
    async fn health_check(&self) {
        let Some(token) = self.bearer_token() else {
            return;
        };

        match profile::fetch_email(&self.client, &self.endpoints.userinfo, &token).await {
            Ok(Some(email)) => {
                tracing::info!(%email, "Signed in");
                *self.email.write().unwrap_or_else(|e| e.into_inner()) = Some(email);
            }
            Ok(None) => tracing::warn!("Userinfo response carried no email"),
            Err(e) => tracing::warn!("Failed to fetch user profile: {e:#}"),
        }

        match profile::fetch_channel_title(&self.client, &self.endpoints.channels, &token).await {
            Ok(Some(title)) => tracing::info!(channel = %title, "Channel lookup succeeded"),
            Ok(None) => tracing::warn!("No channel found or permissions issue"),
            Err(e) => tracing::warn!("Failed to fetch channel info: {e:#}"),
        }
    }
}
