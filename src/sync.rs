// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! One synchronization run: authorize, retrieve, convert, submit.
//!
//! Connector election and parameter validation happen once at startup; a
//! run starts from an elected connector.

use tracing::{error, info};

use crate::connector::{AccountConnector, ConnectorContext, ConnectorError};
use crate::providers::{LedgerClient, LedgerError, SaveSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The user must consent at this URL before the run can proceed.
    AuthorizationRequired(String),
    /// Nothing booked in the retrieval window.
    NoTransactions,
    /// The batch was submitted to the ledger.
    Submitted(SaveSummary),
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("could not retrieve transactions: {0}")]
    Retrieval(#[from] ConnectorError),

    #[error("could not submit transactions to the ledger: {0}")]
    Submission(#[from] LedgerError),
}

/// Drive one run for the configured account. Failures are logged here and
/// returned to the caller.
pub async fn run_once<C>(
    connector: &C,
    ctx: &ConnectorContext,
    ledger: &LedgerClient,
) -> Result<SyncOutcome, SyncError>
where
    C: AccountConnector + Sync,
{
    let account = ctx.config.account_number.as_str();

    if let Some(url) = connector.authorize(ctx).await {
        info!(connector = connector.name(), "Authorization required; redirecting");
        return Ok(SyncOutcome::AuthorizationRequired(url));
    }

    let entries = connector
        .get_transactions(ctx, account)
        .await
        .inspect_err(|e| error!(connector = connector.name(), error = %e, "Transaction retrieval failed"))?;

    if entries.is_empty() {
        info!(connector = connector.name(), "No transactions to submit");
        return Ok(SyncOutcome::NoTransactions);
    }

    let summary = ledger
        .save_transactions(&entries)
        .await
        .inspect_err(|e| error!(submitted = entries.len(), error = %e, "Ledger submission failed"))?;

    info!(
        connector = connector.name(),
        submitted = entries.len(),
        created = summary.created,
        duplicates = summary.duplicates,
        saved = summary.saved,
        "Transactions submitted to ledger"
    );
    Ok(SyncOutcome::Submitted(summary))
}
