//! API-key session management
//!
//! The CZK API issues a short-lived bearer token in exchange for an API
//! key/secret pair, together with a refresh token. [`SessionManager`] holds
//! both and keeps the bearer token valid:
//!
//! ```text
//! Unauthenticated ──authenticate──► Authenticated ──time──► Expired
//!        ▲                               ▲                     │
//!        │                               └──refresh / re-auth──┘
//!        └──────────────invalidate────────────────────────────────
//! ```
//!
//! ## Design Notes
//!
//! - Expiry is checked lazily in [`SessionManager::ensure_valid`]; there is no
//!   background refresh task.
//! - A failed refresh is never fatal on its own: it falls back to a full
//!   re-authentication with the stored credentials.
//! - Tokens are logged only as a masked prefix.

use chrono::{Duration, Utc};
use czkdrive_core::config::CredentialsConfig;
use czkdrive_core::ports::Tokens;
use reqwest::multipart::Form;
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::client::{CallProfile, CzkClient};
use crate::envelope::{Envelope, EnvelopeKind, SUCCESS_CODE};
use crate::{mask_secret, CzkError};

/// Path of the API-key authentication endpoint
pub const AUTHENTICATE_PATH: &str = "/authenticate";

/// Path of the token refresh endpoint
pub const REFRESH_PATH: &str = "/refresh_token";

/// Message the server sends with a successful authentication, sometimes
/// without a 200 status
pub const AUTH_SUCCESS_MESSAGE: &str = "认证成功";

/// Refresh rejections that mean the refresh token itself is unusable
const REFRESH_REJECTIONS: &[&str] = &["需要提供刷新令牌", "无效或过期的刷新令牌"];

/// Where the session currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No token has been obtained (or the session was invalidated)
    Unauthenticated,
    /// A token is held and has not yet expired
    Authenticated,
    /// A token is held but its expiry has passed
    Expired,
}

#[derive(Debug, Default, Deserialize)]
struct AuthData {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: i64,
    #[serde(default)]
    token_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RefreshData {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Owns the credentials and tokens of one storage session
pub struct SessionManager {
    client: CzkClient,
    credentials: CredentialsConfig,
    tokens: Option<Tokens>,
}

impl SessionManager {
    /// Creates an unauthenticated session
    pub fn new(client: CzkClient, credentials: CredentialsConfig) -> Self {
        Self {
            client,
            credentials,
            tokens: None,
        }
    }

    /// Seeds the session with previously obtained tokens
    pub fn with_tokens(mut self, tokens: Tokens) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Replaces the held tokens
    pub fn set_tokens(&mut self, tokens: Tokens) {
        self.tokens = Some(tokens);
    }

    /// Currently held tokens, if any
    pub fn tokens(&self) -> Option<&Tokens> {
        self.tokens.as_ref()
    }

    /// Reports the session state
    pub fn state(&self) -> SessionState {
        match &self.tokens {
            None => SessionState::Unauthenticated,
            Some(tokens) if tokens.is_expired() => SessionState::Expired,
            Some(_) => SessionState::Authenticated,
        }
    }

    /// Returns a valid access token, refreshing or re-authenticating first
    /// when needed
    ///
    /// A session that is still within its expiry performs no network call.
    ///
    /// # Errors
    /// Fails only if the fallback authentication fails
    pub async fn ensure_valid(&mut self) -> Result<String, CzkError> {
        if self.state() != SessionState::Authenticated {
            debug!(state = ?self.state(), "Access token missing or expired, refreshing");
            if let Err(e) = self.refresh().await {
                warn!(error = %e, "Token refresh failed, re-authenticating");
                self.authenticate().await?;
            }
        }

        self.tokens
            .as_ref()
            .map(|tokens| tokens.access_token.clone())
            .ok_or_else(|| CzkError::Auth("no access token after authentication".to_string()))
    }

    /// Exchanges the API key and secret for a fresh token pair
    ///
    /// # Errors
    /// - [`CzkError::Config`] if the key or secret is empty (nothing is sent)
    /// - [`CzkError::Auth`] if the request fails or the server rejects it
    pub async fn authenticate(&mut self) -> Result<(), CzkError> {
        if self.credentials.api_key.trim().is_empty()
            || self.credentials.api_secret.trim().is_empty()
        {
            return Err(CzkError::Config(
                "api_key and api_secret are required".to_string(),
            ));
        }

        info!("Authenticating with API key");

        let request = self
            .client
            .request(Method::GET, AUTHENTICATE_PATH, CallProfile::Standard)
            .header("x-api-key", &self.credentials.api_key)
            .header("x-api-secret", &self.credentials.api_secret);

        let envelope = self
            .client
            .fetch(request, EnvelopeKind::Service)
            .await
            .map_err(|e| CzkError::Auth(format!("authentication request failed: {e}")))?;

        let accepted = envelope.code() == Some(SUCCESS_CODE)
            || envelope.message() == Some(AUTH_SUCCESS_MESSAGE);
        if !accepted {
            return Err(CzkError::Auth(format!(
                "status={}, message={}",
                envelope
                    .code()
                    .map_or_else(|| "none".to_string(), |c| c.to_string()),
                envelope.error_message()
            )));
        }

        let data: AuthData = envelope.data_as().map_err(auth_error)?;
        if data.access_token.is_empty() || data.refresh_token.is_empty() {
            return Err(CzkError::Auth(
                "authentication response is missing a token".to_string(),
            ));
        }

        debug!(
            access_token = %mask_secret(&data.access_token),
            token_type = data.token_type.as_deref().unwrap_or("unknown"),
            expires_in = data.expires_in,
            "Authentication succeeded"
        );

        self.tokens = Some(Tokens {
            access_token: data.access_token,
            refresh_token: Some(data.refresh_token),
            expires_at: Utc::now() + Duration::seconds(data.expires_in),
        });
        Ok(())
    }

    /// Obtains a new access token with the held refresh token
    ///
    /// # Errors
    /// [`CzkError::Auth`] if no refresh token is held or the server rejects it
    pub async fn refresh(&mut self) -> Result<(), CzkError> {
        let refresh_token = self
            .tokens
            .as_ref()
            .and_then(|tokens| tokens.refresh_token.clone())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| CzkError::Auth("no refresh token available".to_string()))?;

        debug!(refresh_token = %mask_secret(&refresh_token), "Refreshing access token");

        let form = Form::new().text("refresh_token", refresh_token);
        let request = self
            .client
            .request(Method::POST, REFRESH_PATH, CallProfile::Standard)
            .multipart(form);

        let envelope = self
            .client
            .fetch(request, EnvelopeKind::Service)
            .await
            .map_err(|e| CzkError::Auth(format!("refresh request failed: {e}")))?;

        if envelope.success() != Some(true) || envelope.code() != Some(SUCCESS_CODE) {
            return Err(refresh_rejection(&envelope));
        }

        let data: RefreshData = envelope.data_as().map_err(auth_error)?;
        if data.access_token.is_empty() {
            return Err(CzkError::Auth(
                "refresh response is missing an access token".to_string(),
            ));
        }

        let previous_refresh = self.tokens.take().and_then(|t| t.refresh_token);
        let refresh_token = data
            .refresh_token
            .filter(|token| !token.is_empty())
            .or(previous_refresh);

        self.tokens = Some(Tokens {
            access_token: data.access_token,
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(data.expires_in),
        });

        info!(expires_in = data.expires_in, "Access token refreshed");
        Ok(())
    }

    /// Drops all tokens; the next [`ensure_valid`](Self::ensure_valid)
    /// authenticates from scratch
    pub fn invalidate(&mut self) {
        if self.tokens.take().is_some() {
            debug!("Session invalidated");
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("base_url", &self.client.base_url())
            .field("credentials", &self.credentials)
            .field("tokens", &self.tokens)
            .finish()
    }
}

fn auth_error(err: CzkError) -> CzkError {
    CzkError::Auth(err.to_string())
}

fn refresh_rejection(envelope: &Envelope) -> CzkError {
    let message = envelope.error_message();
    if REFRESH_REJECTIONS.contains(&message.as_str()) {
        CzkError::Auth(format!(
            "refresh token is likely invalid or expired: {message}"
        ))
    } else {
        CzkError::Auth(format!("refresh rejected: {message}"))
    }
}
