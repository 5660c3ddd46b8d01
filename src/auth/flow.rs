// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OAuth2 authorization-code flow against the bank.
//!
//! ## States
//!
//! | State | Condition | `authorize()` |
//! |-------|-----------|---------------|
//! | Unauthenticated | no refresh token in session or store | consent URL |
//! | Authenticated-Stale | expiry older than the refresh window | consent URL |
//! | Unusable | access token expired and no refresh token | consent URL |
//! | Authenticated-Fresh | otherwise | `None` (ready) |
//!
//! The refresh window (28 days) is a conservative forced re-consent policy,
//! independent of the access token lifetime. Short-lived access tokens are
//! renewed transparently with the `refresh_token` grant by
//! [`OAuthFlow::access_token`]. When the bank rejects the refresh token the
//! session and the stored record are dropped, so the next run asks for
//! consent again.
//!
//! Every consent URL carries a random `state` that is remembered in the
//! [`Session`]. The callback is only accepted with that exact `state`, once.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use url::Url;

use super::error::AuthError;
use super::session::Session;
use crate::config::{Config, ConfigError, BANK_API_BASE_URL_ENV};
use crate::storage::{StoreError, Token, TokenDatabase, TokenStore};

pub const AUTHORIZE_PATH: &str = "gw/oidc/authorize";
pub const TOKEN_PATH: &str = "gw/oidc/token";

/// Scopes requested from the bank; `offline_access` yields a refresh token.
pub const SCOPES: [&str; 5] = [
    "read_transactions",
    "read_accounts",
    "read_credit_cards_list_with_details",
    "read_credit_card_transactions",
    "offline_access",
];

/// Tokens whose expiry lies further in the past than this are re-consented.
pub const TOKEN_REFRESH_WINDOW_DAYS: i64 = 28;

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl OAuthTokenResponse {
    fn into_token(self, now: DateTime<Utc>, previous_refresh: Option<&str>) -> Token {
        let lifetime = self.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        Token {
            access_token: self.access_token,
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            refresh_token: self
                .refresh_token
                .filter(|r| !r.is_empty())
                .or_else(|| previous_refresh.map(str::to_string))
                .unwrap_or_default(),
            expiry: now + Duration::seconds(lifetime),
        }
    }
}

/// Failure of a request to the token endpoint.
enum TokenRequestError {
    /// The endpoint answered with a non-success status.
    Rejected { status: StatusCode, body: String },
    /// Transport failure or unusable response body.
    Failed(String),
}

impl TokenRequestError {
    /// Whether the bank refused the grant itself (invalid or revoked).
    fn is_grant_rejection(&self) -> bool {
        matches!(self, TokenRequestError::Rejected { status, .. } if status.is_client_error())
    }
}

impl From<TokenRequestError> for AuthError {
    fn from(e: TokenRequestError) -> Self {
        match e {
            TokenRequestError::Rejected { status, body } => {
                AuthError::ProviderExchange(format!("token request returned {status}: {body}"))
            }
            TokenRequestError::Failed(message) => AuthError::ProviderExchange(message),
        }
    }
}

/// Whether `token` is past the forced re-consent window at `now`.
pub fn needs_refresh(token: &Token, now: DateTime<Utc>, window: Duration) -> bool {
    now - window > token.expiry
}

/// Authorization flow for one configured bank account.
pub struct OAuthFlow {
    client_id: String,
    client_secret: String,
    auth_url: Url,
    token_url: Url,
    redirect_url: String,
    account_id: String,
    refresh_window: Duration,
    store: Arc<TokenStore>,
    http: Client,
}

impl OAuthFlow {
    pub fn new(config: &Config, store: Arc<TokenStore>, http: Client) -> Result<Self, ConfigError> {
        let base = Url::parse(&config.bank_api_base_url).map_err(|e| ConfigError::Invalid {
            name: BANK_API_BASE_URL_ENV,
            reason: e.to_string(),
        })?;
        let join = |path: &str| {
            base.join(path).map_err(|e| ConfigError::Invalid {
                name: BANK_API_BASE_URL_ENV,
                reason: e.to_string(),
            })
        };

        Ok(Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            auth_url: join(AUTHORIZE_PATH)?,
            token_url: join(TOKEN_PATH)?,
            redirect_url: config.redirect_url.clone(),
            account_id: config.account_number.clone(),
            refresh_window: Duration::days(TOKEN_REFRESH_WINDOW_DAYS),
            store,
            http,
        })
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Provider consent page for a request identified by `state`.
    pub fn authorization_url(&self, state: &str) -> String {
        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("access_type", "offline")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_url)
            .append_pair("response_type", "code")
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("state", state);
        url.into()
    }

    /// Issue a fresh consent URL and remember its `state` in the session.
    async fn begin_consent(&self, session: &Session) -> String {
        let state = uuid::Uuid::new_v4().to_string();
        let url = self.authorization_url(&state);
        session.begin_consent(state).await;
        url
    }

    /// Make sure the session is authorized.
    ///
    /// Returns `Some(url)` when the user must consent first, `None` when
    /// the session holds (or was just loaded with) a usable token.
    pub async fn authorize(&self, session: &Session) -> Option<String> {
        if session.has_refresh_token().await {
            return None;
        }

        let now = Utc::now();
        match self.store.get_token(&self.account_id) {
            Ok(token) if needs_refresh(&token, now, self.refresh_window) => {
                info!(account = %self.account_id, expiry = %token.expiry, "Stored token is stale; re-authorization required");
                Some(self.begin_consent(session).await)
            }
            Ok(token) if token.is_expired_at(now) && !token.has_refresh_token() => {
                info!(account = %self.account_id, expiry = %token.expiry, "Stored token expired and cannot be refreshed; re-authorization required");
                Some(self.begin_consent(session).await)
            }
            Ok(token) => {
                debug!(account = %self.account_id, "Loaded stored token into session");
                session.set(token).await;
                None
            }
            Err(StoreError::NotFound(_)) => {
                info!(account = %self.account_id, "No stored token; authorization required");
                Some(self.begin_consent(session).await)
            }
            Err(e) => {
                warn!(account = %self.account_id, error = %e, "Could not read stored token; authorization required");
                Some(self.begin_consent(session).await)
            }
        }
    }

    /// Exchange an authorization code for a token, then update the session
    /// and the store. On failure the session is left untouched.
    pub async fn exchange_code(&self, session: &Session, code: &str) -> Result<Token, AuthError> {
        let response = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_url.as_str()),
            ])
            .await?;

        let token = response.into_token(Utc::now(), None);
        session.set(token.clone()).await;
        self.persist(&token);
        info!(account = %self.account_id, expiry = %token.expiry, "Authorization code exchanged");
        Ok(token)
    }

    /// Handle the redirect back from the consent page.
    ///
    /// `state` must match the one issued with the latest consent URL. The
    /// pending state is consumed either way.
    pub async fn handle_callback(
        &self,
        session: &Session,
        code: Option<&str>,
        state: Option<&str>,
    ) -> Result<(), AuthError> {
        let expected = session.take_consent_state().await;
        if expected.is_none() || expected.as_deref() != state {
            warn!(account = %self.account_id, "Authorization callback state does not match the consent request");
            return Err(AuthError::BadCallback);
        }

        let code = code
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(AuthError::BadCallback)?;
        self.exchange_code(session, code).await?;
        Ok(())
    }

    /// Token usable for a bank call, renewing an expired access token
    /// with the refresh grant when possible.
    pub async fn access_token(&self, session: &Session) -> Result<Token, AuthError> {
        let token = session.token().await.ok_or(AuthError::Unauthenticated)?;
        if !token.is_expired_at(Utc::now()) {
            return Ok(token);
        }
        if !token.has_refresh_token() {
            return Err(AuthError::TokenExpired);
        }
        self.refresh(session, &token.refresh_token).await
    }

    async fn refresh(&self, session: &Session, refresh_token: &str) -> Result<Token, AuthError> {
        let response = match self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await
        {
            Ok(response) => response,
            Err(e) => {
                if e.is_grant_rejection() {
                    self.forget(session).await;
                }
                return Err(e.into());
            }
        };

        let token = response.into_token(Utc::now(), Some(refresh_token));
        session.set(token.clone()).await;
        self.persist(&token);
        info!(account = %self.account_id, expiry = %token.expiry, "Access token refreshed");
        Ok(token)
    }

    /// Drop a token the bank no longer accepts from the session and the store.
    async fn forget(&self, session: &Session) {
        warn!(account = %self.account_id, "Refresh token rejected; re-authorization required");
        session.clear().await;
        if let Err(e) = self.store.remove_token(&self.account_id) {
            error!(account = %self.account_id, error = %e, "Could not remove rejected token from storage");
        }
    }

    async fn request_token(
        &self,
        grant: &[(&str, &str)],
    ) -> Result<OAuthTokenResponse, TokenRequestError> {
        let mut form: Vec<(&str, &str)> = grant.to_vec();
        form.push(("client_id", self.client_id.as_str()));
        form.push(("client_secret", self.client_secret.as_str()));

        let response = self
            .http
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| TokenRequestError::Failed(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TokenRequestError::Rejected { status, body });
        }

        let token: OAuthTokenResponse = response
            .json()
            .await
            .map_err(|e| TokenRequestError::Failed(format!("invalid token response: {e}")))?;

        if token.access_token.trim().is_empty() {
            return Err(TokenRequestError::Failed(
                "token response did not include access_token".to_string(),
            ));
        }
        Ok(token)
    }

    /// Save the token; failures are logged, the session stays authoritative.
    fn persist(&self, token: &Token) {
        match self.store.upsert_token(&self.account_id, token) {
            Ok(()) => {}
            Err(e @ (StoreError::Deserialization(_) | StoreError::Cipher(_))) => {
                warn!(account = %self.account_id, error = %e, "Token database unreadable; replacing it");
                let db = TokenDatabase::from([(self.account_id.clone(), token.dehydrate())]);
                if let Err(e) = self.store.set_database(&db) {
                    error!(account = %self.account_id, error = %e, "Could not save token to storage");
                }
            }
            Err(e) => {
                error!(account = %self.account_id, error = %e, "Could not save token to storage");
            }
        }
    }
}
