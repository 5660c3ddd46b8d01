// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cash (current) account connector, addressed by IBAN.

use tracing::info;

use super::{iban, AccountConnector, ConnectorContext, ConnectorError};
use crate::ledger::LedgerEntry;

/// Sandbox IBAN; fails the checksum but is always accepted.
pub const SANDBOX_IBAN: &str = "DE10010000000000006136";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CashConnector;

impl AccountConnector for CashConnector {
    fn name(&self) -> &'static str {
        "cash"
    }

    fn is_valid_account_number(&self, account_number: &str) -> Result<bool, ConnectorError> {
        Ok(iban::normalize(account_number) == SANDBOX_IBAN || iban::is_valid(account_number))
    }

    async fn get_transactions<'a>(
        &'a self,
        ctx: &'a ConnectorContext,
        account_number: &'a str,
    ) -> Result<Vec<LedgerEntry>, ConnectorError> {
        let bearer = ctx.bearer().await?;
        let iban = iban::normalize(account_number);
        let transactions = ctx
            .bank
            .list_cash_transactions(&bearer, &iban, ctx.booking_date_from())
            .await?;
        info!(count = transactions.len(), "Retrieved cash transactions");
        Ok(ctx.convert(transactions).await)
    }
}
