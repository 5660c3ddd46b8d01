// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// OAuth2 authorization error type.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The bank redirected back without a `code`, or with a `state` this
    /// session did not issue
    #[error("the authorization callback has no code or an unexpected state")]
    BadCallback,
    /// Token endpoint unreachable or rejected the grant
    #[error("token exchange with the bank failed: {0}")]
    ProviderExchange(String),
    /// No token is held for this session
    #[error("no OAuth2 token available; authorization required")]
    Unauthenticated,
    /// Access token expired and no refresh token is held
    #[error("access token expired and no refresh token is available")]
    TokenExpired,
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::BadCallback => "bad_callback",
            AuthError::ProviderExchange(_) => "provider_exchange_error",
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::TokenExpired => "token_expired",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::BadCallback => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::ProviderExchange(_) => StatusCode::BAD_GATEWAY,
            AuthError::Unauthenticated | AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn bad_callback_returns_500() {
        let response = AuthError::BadCallback.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "bad_callback");
    }

    #[tokio::test]
    async fn exchange_failure_returns_502() {
        let response = AuthError::ProviderExchange("invalid_grant".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
