// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-process OAuth2 session.
//!
//! Holds the token used for authenticated bank calls and the `state` of the
//! consent request in flight. The session is an explicit value owned by the
//! application state and handed to every operation that needs a bearer
//! token; nothing reads a global.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::storage::Token;

/// Shared handle to the current token.
#[derive(Clone, Default)]
pub struct Session {
    current: Arc<RwLock<Option<Token>>>,
    pending_state: Arc<RwLock<Option<String>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session pre-loaded with a token.
    pub fn with_token(token: Token) -> Self {
        Self {
            current: Arc::new(RwLock::new(Some(token))),
            pending_state: Arc::default(),
        }
    }

    /// Snapshot of the current token.
    pub async fn token(&self) -> Option<Token> {
        self.current.read().await.clone()
    }

    /// Replace the current token as a whole.
    pub async fn set(&self, token: Token) {
        *self.current.write().await = Some(token);
    }

    /// Drop the current token; the next run has to re-authorize.
    pub async fn clear(&self) {
        *self.current.write().await = None;
    }

    /// Remember the `state` sent with the latest consent URL. Replaces any
    /// earlier one, so only the most recent consent page can complete.
    pub async fn begin_consent(&self, state: String) {
        *self.pending_state.write().await = Some(state);
    }

    /// Consume the pending consent `state`, if any.
    pub async fn take_consent_state(&self) -> Option<String> {
        self.pending_state.write().await.take()
    }

    /// Whether a refresh token is held (the session is authorized).
    pub async fn has_refresh_token(&self) -> bool {
        self.current
            .read()
            .await
            .as_ref()
            .is_some_and(Token::has_refresh_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn token(refresh: &str) -> Token {
        Token {
            access_token: "access".to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: refresh.to_string(),
            expiry: Utc::now(),
        }
    }

    #[tokio::test]
    async fn starts_empty() {
        let session = Session::new();
        assert!(session.token().await.is_none());
        assert!(!session.has_refresh_token().await);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let session = Session::new();
        let other = session.clone();
        other.set(token("refresh")).await;
        assert!(session.has_refresh_token().await);

        session.clear().await;
        assert!(other.token().await.is_none());
    }

    #[tokio::test]
    async fn consent_state_is_single_use_and_latest_wins() {
        let session = Session::new();
        session.begin_consent("first".to_string()).await;
        session.begin_consent("second".to_string()).await;

        assert_eq!(session.take_consent_state().await.as_deref(), Some("second"));
        assert_eq!(session.take_consent_state().await, None);
    }

    #[tokio::test]
    async fn token_without_refresh_is_not_authorized() {
        let session = Session::with_token(token(""));
        assert!(session.token().await.is_some());
        assert!(!session.has_refresh_token().await);
    }
}
