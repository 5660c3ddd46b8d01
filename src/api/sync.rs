// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::auth::AuthError;
use crate::connector::AccountConnector;
use crate::error::ApiError;
use crate::state::AppState;
use crate::sync::{self, SyncOutcome};

/// Result of a sync run.
#[derive(Debug, Serialize, ToSchema)]
pub struct SyncResponse {
    /// "submitted" or "no_transactions".
    pub status: String,
    /// Transactions newly created in the ledger.
    pub created: usize,
    /// Transactions rejected as already imported.
    pub duplicates: usize,
    /// Transactions reported as saved.
    pub saved: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    /// Authorization code issued by the bank.
    pub code: Option<String>,
    /// `state` echoed from the consent URL.
    pub state: Option<String>,
}

/// `302 Found` to `location`.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// Run one synchronization.
///
/// Redirects to the bank's consent page when the session is not authorized.
#[utoipa::path(
    get,
    path = "/",
    tag = "Sync",
    responses(
        (status = 200, description = "Run completed", body = SyncResponse),
        (status = 302, description = "Authorization required; redirect to the bank"),
        (status = 502, description = "Bank or ledger API failed")
    )
)]
pub async fn run_sync(State(state): State<AppState>) -> Result<Response, ApiError> {
    let outcome = sync::run_once(&state.connector, &state.ctx, &state.ledger)
        .await
        .map_err(|e| ApiError::bad_gateway(e.to_string()))?;

    let body = match outcome {
        SyncOutcome::AuthorizationRequired(url) => return Ok(found(&url)),
        SyncOutcome::NoTransactions => SyncResponse {
            status: "no_transactions".to_string(),
            created: 0,
            duplicates: 0,
            saved: 0,
        },
        SyncOutcome::Submitted(summary) => SyncResponse {
            status: "submitted".to_string(),
            created: summary.created,
            duplicates: summary.duplicates,
            saved: summary.saved,
        },
    };
    Ok(Json(body).into_response())
}

/// OAuth callback from the bank.
///
/// Exchanges the code and redirects back to `/` so the sync can proceed.
#[utoipa::path(
    get,
    path = "/authorized",
    tag = "Sync",
    params(CallbackParams),
    responses(
        (status = 302, description = "Authorized; redirect to /"),
        (status = 500, description = "Missing code or unexpected state"),
        (status = 502, description = "Token exchange failed")
    )
)]
pub async fn authorized(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AuthError> {
    state
        .connector
        .handle_authorization_callback(&state.ctx, params.code.as_deref(), params.state.as_deref())
        .await
        .inspect_err(|e| warn!(error = %e, "Authorization callback failed"))?;
    info!(connector = state.connector.name(), "Authorization completed");
    Ok(found("/"))
}
