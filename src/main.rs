// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;

use bank_ledger_sync::{
    api::router,
    config::Config,
    connector::{elect, AccountConnector},
    logging::{init_tracing, LogFormat},
    state::AppState,
};
use tracing::info;

#[tokio::main]
async fn main() {
    init_tracing(LogFormat::from_env());

    // Missing configuration or an unrecognized account is fatal.
    let config = Config::from_env().expect("Failed to load configuration");
    let connector = elect(&config.account_number).expect("Failed to elect a connector");
    connector
        .validate_params(&config)
        .expect("Connector parameters are incomplete");

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Failed to parse bind address");

    info!(connector = connector.name(), config = ?config, "Starting bank ledger sync");

    let state = AppState::from_config(config, connector).expect("Failed to initialise state");
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    info!(%addr, "Listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("HTTP server failed");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
