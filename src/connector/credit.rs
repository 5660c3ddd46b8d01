// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credit card connector, addressed by the last four digits of the card.

use tracing::{debug, info};

use super::{AccountConnector, ConnectorContext, ConnectorError};
use crate::ledger::LedgerEntry;
use crate::providers::DbCreditCard;

/// Mask the bank puts in front of the visible card digits.
const PAN_MASK: &str = "************";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreditConnector;

impl CreditConnector {
    /// Technical ID of the card whose masked PAN ends in `last4`.
    pub fn find_technical_id<'c>(cards: &'c [DbCreditCard], last4: &str) -> Option<&'c str> {
        cards
            .iter()
            .find(|card| {
                card.secure_pan
                    .strip_prefix(PAN_MASK)
                    .is_some_and(|suffix| suffix == last4)
            })
            .map(|card| card.technical_id.as_str())
    }
}

impl AccountConnector for CreditConnector {
    fn name(&self) -> &'static str {
        "credit"
    }

    fn is_valid_account_number(&self, account_number: &str) -> Result<bool, ConnectorError> {
        Ok(account_number.len() == 4 && account_number.bytes().all(|b| b.is_ascii_digit()))
    }

    async fn get_transactions<'a>(
        &'a self,
        ctx: &'a ConnectorContext,
        account_number: &'a str,
    ) -> Result<Vec<LedgerEntry>, ConnectorError> {
        let bearer = ctx.bearer().await?;

        // The card directory is fetched fresh on every run.
        let cards = ctx.bank.list_credit_cards(&bearer).await?;
        let technical_id = Self::find_technical_id(&cards, account_number)
            .ok_or_else(|| ConnectorError::CardNotFound(account_number.to_string()))?;
        debug!(cards = cards.len(), "Resolved credit card technical ID");

        let transactions = ctx
            .bank
            .list_credit_card_transactions(
                &bearer,
                technical_id,
                ctx.booking_date_from(),
                ctx.today(),
            )
            .await?;
        info!(count = transactions.len(), "Retrieved credit card transactions");
        Ok(ctx.convert(transactions).await)
    }
}
