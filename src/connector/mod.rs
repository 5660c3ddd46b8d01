// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Bank Connectors
//!
//! One connector per account type. The caller hands over an opaque account
//! identifier and [`elect`] picks the connector that understands it:
//!
//! | Connector | Accepted identifier |
//! |-----------|---------------------|
//! | [`CashConnector`] | IBAN (plus the bank's sandbox IBAN) |
//! | [`CreditConnector`] | exactly four digits (card suffix) |
//!
//! Election is a linear scan in the order above; the first connector whose
//! validator accepts the identifier wins.

pub mod cash;
pub mod credit;
pub mod iban;

use std::future::Future;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use tracing::{info, warn};

use crate::auth::{AuthError, OAuthFlow, Session};
use crate::config::{Config, ConfigError};
use crate::ledger::{self, LedgerEntry, ToLedgerEntry};
use crate::providers::{BankClient, BankError};

pub use cash::CashConnector;
pub use credit::CreditConnector;

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Bank(#[from] BankError),

    #[error("no credit card found on account with last digits {0}")]
    CardNotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ElectionError {
    #[error("Account ID is not recognized as a valid IBAN or the last 4 digits of a credit card")]
    NoMatchingConnector,
}

/// Collaborators a connector needs during a run.
#[derive(Clone)]
pub struct ConnectorContext {
    pub config: Arc<Config>,
    pub flow: Arc<OAuthFlow>,
    pub session: Session,
    pub bank: BankClient,
}

impl ConnectorContext {
    /// First booking date of the retrieval window.
    pub fn booking_date_from(&self) -> NaiveDate {
        self.today() - Duration::days(self.config.lookback_days)
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Bearer token for a bank call, refreshed if needed.
    pub async fn bearer(&self) -> Result<String, ConnectorError> {
        let token = self.flow.access_token(&self.session).await?;
        Ok(token.access_token)
    }

    /// Convert raw transactions for the configured ledger account.
    /// Unconvertible transactions are skipped.
    pub async fn convert<T>(&self, transactions: Vec<T>) -> Vec<LedgerEntry>
    where
        T: ToLedgerEntry + Send + 'static,
    {
        let received = transactions.len();
        let batch = ledger::convert_batch(&self.config.ledger_account_id, transactions).await;
        if !batch.failures.is_empty() {
            warn!(
                received,
                skipped = batch.failures.len(),
                "Some transactions were skipped during conversion"
            );
        }
        batch.entries
    }
}

/// Capabilities of an account-type connector.
pub trait AccountConnector {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether this connector handles `account_number`.
    fn is_valid_account_number(&self, account_number: &str) -> Result<bool, ConnectorError>;

    /// Retrieve and convert recent transactions of `account_number`.
    fn get_transactions<'a>(
        &'a self,
        ctx: &'a ConnectorContext,
        account_number: &'a str,
    ) -> impl Future<Output = Result<Vec<LedgerEntry>, ConnectorError>> + Send + 'a;

    /// Verify every required connector parameter is configured.
    fn validate_params(&self, config: &Config) -> Result<(), ConfigError> {
        config.check_params()
    }

    /// `Some(url)` if the user must consent at the bank first.
    fn authorize<'a>(
        &'a self,
        ctx: &'a ConnectorContext,
    ) -> impl Future<Output = Option<String>> + Send + 'a {
        ctx.flow.authorize(&ctx.session)
    }

    /// Exchange the code delivered to the OAuth callback, after checking
    /// `state` against the pending consent request.
    fn handle_authorization_callback<'a>(
        &'a self,
        ctx: &'a ConnectorContext,
        code: Option<&'a str>,
        state: Option<&'a str>,
    ) -> impl Future<Output = Result<(), AuthError>> + Send + 'a {
        ctx.flow.handle_callback(&ctx.session, code, state)
    }
}

/// Connector variants, in election order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    Cash(CashConnector),
    Credit(CreditConnector),
}

impl Connector {
    pub fn available() -> [Connector; 2] {
        [
            Connector::Cash(CashConnector),
            Connector::Credit(CreditConnector),
        ]
    }
}

impl AccountConnector for Connector {
    fn name(&self) -> &'static str {
        match self {
            Connector::Cash(c) => c.name(),
            Connector::Credit(c) => c.name(),
        }
    }

    fn is_valid_account_number(&self, account_number: &str) -> Result<bool, ConnectorError> {
        match self {
            Connector::Cash(c) => c.is_valid_account_number(account_number),
            Connector::Credit(c) => c.is_valid_account_number(account_number),
        }
    }

    async fn get_transactions<'a>(
        &'a self,
        ctx: &'a ConnectorContext,
        account_number: &'a str,
    ) -> Result<Vec<LedgerEntry>, ConnectorError> {
        match self {
            Connector::Cash(c) => c.get_transactions(ctx, account_number).await,
            Connector::Credit(c) => c.get_transactions(ctx, account_number).await,
        }
    }
}

/// Elect the connector for `account_id` among [`Connector::available`].
pub fn elect(account_id: &str) -> Result<Connector, ElectionError> {
    elect_from(Connector::available(), account_id)
}

/// First candidate whose validator accepts `account_id`.
///
/// A validator error is logged and the scan moves on.
pub fn elect_from<C, I>(candidates: I, account_id: &str) -> Result<C, ElectionError>
where
    C: AccountConnector,
    I: IntoIterator<Item = C>,
{
    for candidate in candidates {
        match candidate.is_valid_account_number(account_id) {
            Ok(true) => {
                info!(connector = candidate.name(), "Elected connector");
                return Ok(candidate);
            }
            Ok(false) => {}
            Err(e) => {
                warn!(connector = candidate.name(), error = %e, "Account validation failed; trying next connector");
            }
        }
    }
    Err(ElectionError::NoMatchingConnector)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::flow::tests::test_flow;
    use crate::config::tests::test_config;
    use crate::providers::build_http_client;
    use tempfile::TempDir;

    pub(crate) fn test_context(account: &str, base_url: &str) -> (ConnectorContext, TempDir) {
        let (flow, _store, dir) = test_flow(account, base_url);
        let config = test_config(account, base_url);
        let bank = BankClient::new(&config.bank_api_base_url, build_http_client().unwrap()).unwrap();
        let ctx = ConnectorContext {
            config: Arc::new(config),
            flow: Arc::new(flow),
            session: Session::new(),
            bank,
        };
        (ctx, dir)
    }

    #[test]
    fn elects_cash_for_iban() {
        assert_eq!(
            elect("DE49500105178844289951"),
            Ok(Connector::Cash(CashConnector))
        );
        assert_eq!(
            elect("DE10010000000000006136"),
            Ok(Connector::Cash(CashConnector))
        );
    }

    #[test]
    fn elects_credit_for_card_suffix() {
        assert_eq!(elect("1234"), Ok(Connector::Credit(CreditConnector)));
    }

    #[test]
    fn rejects_unknown_identifiers() {
        for id in ["DE100100000001111", "DE10010000000111106136", "12345", "", "abcd"] {
            assert_eq!(elect(id), Err(ElectionError::NoMatchingConnector), "{id}");
        }
    }

    #[derive(Debug, PartialEq)]
    struct Candidate {
        name: &'static str,
        verdict: Option<bool>,
    }

    impl AccountConnector for Candidate {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_valid_account_number(&self, id: &str) -> Result<bool, ConnectorError> {
            self.verdict
                .ok_or_else(|| ConnectorError::CardNotFound(id.to_string()))
        }

        async fn get_transactions<'a>(
            &'a self,
            _ctx: &'a ConnectorContext,
            _account_number: &'a str,
        ) -> Result<Vec<LedgerEntry>, ConnectorError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn validator_errors_do_not_stop_the_scan() {
        let candidates = vec![
            Candidate { name: "broken", verdict: None },
            Candidate { name: "no", verdict: Some(false) },
            Candidate { name: "yes", verdict: Some(true) },
            Candidate { name: "later", verdict: Some(true) },
        ];
        assert_eq!(elect_from(candidates, "x").unwrap().name, "yes");
    }

    #[test]
    fn all_rejecting_candidates_is_no_match() {
        let candidates = vec![Candidate { name: "broken", verdict: None }];
        assert_eq!(
            elect_from(candidates, "x"),
            Err(ElectionError::NoMatchingConnector)
        );
    }

    #[test]
    fn election_error_message() {
        assert_eq!(
            ElectionError::NoMatchingConnector.to_string(),
            "Account ID is not recognized as a valid IBAN or the last 4 digits of a credit card"
        );
    }

    #[tokio::test]
    async fn default_authorize_delegates_to_flow() {
        let (ctx, _dir) = test_context("1234", "http://127.0.0.1:1");
        let connector = elect("1234").unwrap();
        assert!(connector.validate_params(&ctx.config).is_ok());
        assert!(connector.authorize(&ctx).await.is_some());
        assert!(matches!(
            connector.handle_authorization_callback(&ctx, None, None).await,
            Err(AuthError::BadCallback)
        ));
    }
}
