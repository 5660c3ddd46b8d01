// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP clients for the external services: the bank API and the ledger.

pub mod dbapi;
pub mod ynab;

use std::time::Duration;

use reqwest::Client;

pub use dbapi::{BankClient, BankError, DbCashTransaction, DbCreditCard, DbCreditTransaction};
pub use ynab::{LedgerClient, LedgerError, SaveSummary};

/// Request-level timeout for every outbound call. A timeout surfaces as a
/// transport error.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared HTTP client for outbound calls.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder().timeout(HTTP_TIMEOUT).build()
}
