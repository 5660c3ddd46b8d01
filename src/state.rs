// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{OAuthFlow, Session};
use crate::config::{Config, ConfigError, BANK_API_BASE_URL_ENV};
use crate::connector::{Connector, ConnectorContext};
use crate::providers::{build_http_client, BankClient, LedgerClient};
use crate::storage::{CipherError, StoragePaths, TokenStore};

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot open token store: {0}")]
    TokenStore(#[from] CipherError),

    #[error("cannot build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub connector: Connector,
    pub ctx: ConnectorContext,
    pub ledger: LedgerClient,
}

impl AppState {
    pub fn new(connector: Connector, ctx: ConnectorContext, ledger: LedgerClient) -> Self {
        Self {
            connector,
            ctx,
            ledger,
        }
    }

    /// Wire the collaborators for `config` around an elected connector.
    pub fn from_config(config: Config, connector: Connector) -> Result<Self, StateError> {
        let http = build_http_client()?;
        let store = Arc::new(TokenStore::open(
            &StoragePaths::new(&config.data_dir),
            &config.token_store_key,
        )?);
        let flow = OAuthFlow::new(&config, store, http.clone())?;
        let bank = BankClient::new(&config.bank_api_base_url, http.clone()).map_err(|e| {
            ConfigError::Invalid {
                name: BANK_API_BASE_URL_ENV,
                reason: e.to_string(),
            }
        })?;
        let ledger = LedgerClient::new(
            &config.ledger_api_base_url,
            &config.ledger_budget_id,
            &config.ledger_secret,
            http,
        );

        let ctx = ConnectorContext {
            config: Arc::new(config),
            flow: Arc::new(flow),
            session: Session::new(),
            bank,
        };
        Ok(Self::new(connector, ctx, ledger))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;
    use crate::connector::elect;

    #[test]
    fn wires_state_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config("1234", "https://simulator-api.db.com");
        config.data_dir = dir.path().to_path_buf();

        let state = AppState::from_config(config, elect("1234").unwrap()).unwrap();
        assert_eq!(state.ctx.flow.account_id(), "1234");
        assert!(state.ctx.flow.store().get_database().unwrap().is_empty());
    }

    #[test]
    fn rejects_unusable_bank_url() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config("1234", "https://simulator-api.db.com");
        config.data_dir = dir.path().to_path_buf();
        config.bank_api_base_url = "not a url/".to_string();

        let err = AppState::from_config(config, elect("1234").unwrap())
            .err()
            .expect("bad url");
        assert!(matches!(err, StateError::Config(ConfigError::Invalid { .. })));
    }
}
