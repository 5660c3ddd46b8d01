// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Ledger Entries
//!
//! Conversion of raw bank transactions into ledger entries.
//!
//! ## Import IDs
//!
//! The ledger rejects entries whose `import_id` it has already seen, so the
//! ID must be stable across runs:
//!
//! | Source | Seed |
//! |--------|------|
//! | Cash | bank-assigned transaction `id` |
//! | Credit | `bookingDate` + amount rendered as single precision with 6 decimals |
//!
//! The import ID is the first 32 hex characters of `sha256(seed)`.
//!
//! Credit transactions carry no bank ID, so two card payments with the same
//! booking date and amount share an import ID and the second one is dropped
//! by the ledger as a duplicate.
//!
//! ## Amounts
//!
//! Ledger amounts are milliunits (1/1000 of the major unit), truncated
//! toward zero.

use chrono::NaiveDate;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::task::JoinSet;
use tracing::warn;

use crate::providers::{DbCashTransaction, DbCreditTransaction};

/// Calendar-date format of bank booking dates.
pub const BOOKING_DATE_FORMAT: &str = "%Y-%m-%d";

/// Length of an import ID in hex characters.
pub const IMPORT_ID_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearedStatus {
    Cleared,
    Uncleared,
    Reconciled,
}

/// Transaction in the shape the ledger imports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub account_id: String,
    pub date: NaiveDate,
    /// Milliunits.
    pub amount: i64,
    pub payee_name: String,
    pub memo: Option<String>,
    pub cleared: ClearedStatus,
    /// Always `false` on import.
    pub approved: bool,
    pub import_id: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("booking date {date:?} is not a YYYY-MM-DD date: {source}")]
    InvalidDate {
        date: String,
        source: chrono::ParseError,
    },

    #[error("amount {0} cannot be expressed in milliunits")]
    InvalidAmount(f64),

    #[error("conversion task failed: {0}")]
    Task(String),
}

/// Bank transaction that can become a [`LedgerEntry`].
pub trait ToLedgerEntry {
    fn to_ledger_entry(&self, account_id: &str) -> Result<LedgerEntry, ConversionError>;
}

impl ToLedgerEntry for DbCashTransaction {
    fn to_ledger_entry(&self, account_id: &str) -> Result<LedgerEntry, ConversionError> {
        Ok(LedgerEntry {
            account_id: account_id.to_string(),
            date: parse_booking_date(&self.booking_date)?,
            amount: to_milliunits(self.amount).ok_or(ConversionError::InvalidAmount(self.amount))?,
            payee_name: self.counter_party_name.clone(),
            memo: Some(self.payment_reference.clone()).filter(|m| !m.is_empty()),
            cleared: ClearedStatus::Cleared,
            approved: false,
            import_id: create_import_id(&self.id),
        })
    }
}

impl ToLedgerEntry for DbCreditTransaction {
    fn to_ledger_entry(&self, account_id: &str) -> Result<LedgerEntry, ConversionError> {
        let amount = self.amount_in_account_currency.amount;
        Ok(LedgerEntry {
            account_id: account_id.to_string(),
            date: parse_booking_date(&self.booking_date)?,
            amount: to_milliunits(amount).ok_or(ConversionError::InvalidAmount(amount))?,
            payee_name: self.reason_for_payment.clone(),
            memo: None,
            cleared: ClearedStatus::Cleared,
            approved: false,
            import_id: create_import_id(&credit_import_seed(&self.booking_date, amount)),
        })
    }
}

/// First 32 hex characters of the SHA-256 digest of `seed`.
pub fn create_import_id(seed: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(seed.as_bytes()));
    digest[..IMPORT_ID_LEN].to_string()
}

/// Seed of a credit transaction's import ID.
///
/// The amount is rendered in single precision so IDs match entries that
/// were imported before (e.g. 42.21 renders as `42.209999`).
///
/// `amount` arrives as `f64` and is narrowed here. For amounts with at most
/// two decimals this gives the same `f32` as parsing the decimal text
/// directly: such a value is never within half an `f64` ulp of an `f32`
/// rounding midpoint, so the double rounding cannot change the result.
pub fn credit_import_seed(booking_date: &str, amount: f64) -> String {
    format!("{booking_date}{:.6}", amount as f32)
}

/// Convert a decimal amount to milliunits, truncating toward zero.
///
/// Works on the shortest decimal rendering of `amount` so that values such
/// as `1234.56` are not pulled below their written value by binary
/// representation error. Returns `None` for non-finite or out-of-range
/// amounts.
pub fn to_milliunits(amount: f64) -> Option<i64> {
    if !amount.is_finite() {
        return None;
    }

    let rendered = amount.abs().to_string();
    let (whole, fraction) = rendered.split_once('.').unwrap_or((rendered.as_str(), ""));
    let whole: i64 = whole.parse().ok()?;

    let mut thousandths = 0i64;
    let mut digits = fraction.bytes();
    for _ in 0..3 {
        let digit = digits.next().map(|b| i64::from(b - b'0')).unwrap_or(0);
        thousandths = thousandths * 10 + digit;
    }

    let magnitude = whole.checked_mul(1000)?.checked_add(thousandths)?;
    Some(if amount.is_sign_negative() {
        -magnitude
    } else {
        magnitude
    })
}

fn parse_booking_date(date: &str) -> Result<NaiveDate, ConversionError> {
    NaiveDate::parse_from_str(date, BOOKING_DATE_FORMAT).map_err(|source| {
        ConversionError::InvalidDate {
            date: date.to_string(),
            source,
        }
    })
}

/// Result of converting a batch: entries in completion order plus the
/// transactions that could not be converted.
#[derive(Debug, Default)]
pub struct BatchConversion {
    pub entries: Vec<LedgerEntry>,
    pub failures: Vec<ConversionError>,
}

/// Convert every transaction concurrently, one task per transaction.
///
/// Returns after all tasks have finished. Output order is not related to
/// input order. A failing transaction is logged and reported in
/// [`BatchConversion::failures`]; the rest of the batch is unaffected.
pub async fn convert_batch<T>(account_id: &str, transactions: Vec<T>) -> BatchConversion
where
    T: ToLedgerEntry + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for transaction in transactions {
        let account_id = account_id.to_string();
        tasks.spawn(async move { transaction.to_ledger_entry(&account_id) });
    }

    let mut batch = BatchConversion::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(entry)) => batch.entries.push(entry),
            Ok(Err(e)) => {
                warn!(error = %e, "Skipping transaction that could not be converted");
                batch.failures.push(e);
            }
            Err(e) => {
                warn!(error = %e, "Conversion task did not complete");
                batch.failures.push(ConversionError::Task(e.to_string()));
            }
        }
    }
    batch
}
