// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{http::HeaderName, routing::get, Router};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;

pub mod health;
pub mod sync;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/", get(sync::run_sync))
        .route("/authorized", get(sync::authorized))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        sync::run_sync,
        sync::authorized,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            sync::SyncResponse,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks
        )
    ),
    tags(
        (name = "Sync", description = "Bank to ledger synchronization"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::elect;
    use crate::connector::tests::test_context;
    use crate::providers::dbapi::tests::CASH_TRANSACTIONS_RESPONSE;
    use crate::providers::{build_http_client, LedgerClient};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ACCOUNT: &str = "DE49500105178844289951";

    fn test_state(base_url: &str) -> (AppState, TempDir) {
        let (ctx, dir) = test_context(ACCOUNT, base_url);
        let ledger = LedgerClient::new(
            &ctx.config.ledger_api_base_url,
            &ctx.config.ledger_budget_id,
            &ctx.config.ledger_secret,
            build_http_client().unwrap(),
        );
        (AppState::new(elect(ACCOUNT).unwrap(), ctx, ledger), dir)
    }

    async fn get(app: &Router, uri: &str) -> axum::response::Response {
        app.clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn location(response: &axum::response::Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    /// Start a consent request through `/` and return its `state`.
    async fn consent_state(app: &Router) -> String {
        let response = get(app, "/").await;
        assert_eq!(response.status(), StatusCode::FOUND);
        url::Url::parse(location(&response))
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .expect("state parameter")
    }

    #[tokio::test]
    async fn liveness_is_ok_and_tagged_with_request_id() {
        let (state, _dir) = test_state("http://127.0.0.1:1");
        let response = get(&router(state), "/health/live").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(json_body(response).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn readiness_reports_store_and_session() {
        let (state, _dir) = test_state("http://127.0.0.1:1");
        let response = get(&router(state), "/health/ready").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["checks"]["token_store"], "ok");
        assert_eq!(body["checks"]["session"], "unauthorized");
    }

    #[tokio::test]
    async fn unauthorized_root_redirects_to_bank() {
        let (state, _dir) = test_state("https://simulator-api.db.com");
        let response = get(&router(state), "/").await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(location(&response).starts_with("https://simulator-api.db.com/gw/oidc/authorize?"));
    }

    #[tokio::test]
    async fn callback_without_code_is_500() {
        let (state, _dir) = test_state("http://127.0.0.1:1");
        let response = get(&router(state), "/authorized").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error_code"], "bad_callback");
    }

    #[tokio::test]
    async fn callback_with_unexpected_state_is_500() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gw/oidc/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ACCESS_TOKEN",
                "refresh_token": "REFRESH"
            })))
            .expect(0)
            .mount(&server)
            .await;

        let (state, _dir) = test_state(&server.uri());
        let app = router(state);
        consent_state(&app).await;

        let response = get(&app, "/authorized?code=abc&state=forged").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error_code"], "bad_callback");
    }

    #[tokio::test]
    async fn failed_exchange_is_502() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gw/oidc/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let (state, _dir) = test_state(&server.uri());
        let app = router(state);
        let consent = consent_state(&app).await;
        let response = get(&app, &format!("/authorized?code=abc&state={consent}")).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn authorize_then_sync() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gw/oidc/token"))
            .and(body_string_contains("code=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ACCESS_TOKEN",
                "token_type": "Bearer",
                "refresh_token": "REFRESH",
                "expires_in": 600
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gw/dbapi/banking/transactions/v2/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CASH_TRANSACTIONS_RESPONSE))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/budgets/budget-id/transactions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "data": {
                    "transaction_ids": ["t-1"],
                    "duplicate_import_ids": ["9a78f21363fe716814a0875ea75fa662"],
                    "transactions": [{"id": "t-1"}]
                }
            })))
            .mount(&server)
            .await;

        let (state, _dir) = test_state(&server.uri());
        let app = router(state);

        let consent = consent_state(&app).await;
        let response = get(&app, &format!("/authorized?code=abc&state={consent}")).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/");

        let response = get(&app, "/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"status": "submitted", "created": 1, "duplicates": 1, "saved": 1})
        );
    }

    #[tokio::test]
    async fn bank_failure_is_502() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gw/oidc/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ACCESS_TOKEN",
                "refresh_token": "REFRESH",
                "expires_in": 600
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .mount(&server)
            .await;

        let (state, _dir) = test_state(&server.uri());
        let app = router(state);
        let consent = consent_state(&app).await;
        let response = get(&app, &format!("/authorized?code=abc&state={consent}")).await;
        assert_eq!(response.status(), StatusCode::FOUND);

        let response = get(&app, "/").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(json_body(response).await["error"]
            .as_str()
            .unwrap()
            .contains("500"));
    }

    #[tokio::test]
    async fn serves_openapi_document() {
        let (state, _dir) = test_state("http://127.0.0.1:1");
        let response = get(&router(state), "/api-doc/openapi.json").await;
        assert_eq!(response.status(), StatusCode::OK);
        let doc = json_body(response).await;
        assert!(doc["paths"]["/authorized"].is_object());
        assert!(doc["paths"]["/health/live"].is_object());
    }
}
