// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger service client (bulk transaction import).

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::ledger::LedgerEntry;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger POST {path} returned {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("ledger POST {path} failed: {message}")]
    Transport { path: String, message: String },

    #[error("ledger response was invalid: {0}")]
    InvalidResponse(String),
}

/// Outcome of a bulk import as reported by the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveSummary {
    /// Newly created transactions.
    pub created: usize,
    /// Entries rejected because their import ID was already known.
    pub duplicates: usize,
    /// Transactions returned as saved.
    pub saved: usize,
    pub duplicate_import_ids: Vec<String>,
}

#[derive(Serialize)]
struct SaveTransactionsRequest<'a> {
    transactions: &'a [LedgerEntry],
}

#[derive(Debug, Deserialize)]
struct SaveTransactionsResponse {
    data: SaveTransactionsData,
}

#[derive(Debug, Deserialize)]
struct SaveTransactionsData {
    #[serde(default)]
    transaction_ids: Vec<String>,
    #[serde(default)]
    duplicate_import_ids: Vec<String>,
    #[serde(default)]
    transactions: Vec<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct LedgerClient {
    base_url: String,
    budget_id: String,
    secret: String,
    http: Client,
}

impl LedgerClient {
    /// `base_url` without trailing slash, e.g. `https://api.youneedabudget.com/v1`.
    pub fn new(base_url: &str, budget_id: &str, secret: &str, http: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            budget_id: budget_id.to_string(),
            secret: secret.to_string(),
            http,
        }
    }

    fn transactions_path(&self) -> String {
        format!("/budgets/{}/transactions", self.budget_id)
    }

    /// Submit `entries` in one bulk call.
    pub async fn save_transactions(
        &self,
        entries: &[LedgerEntry],
    ) -> Result<SaveSummary, LedgerError> {
        let path = self.transactions_path();
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.secret)
            .json(&SaveTransactionsRequest {
                transactions: entries,
            })
            .send()
            .await
            .map_err(|e| LedgerError::Transport {
                path: path.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Status { path, status, body });
        }

        let body: SaveTransactionsResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(format!("POST {path}: {e}")))?;

        Ok(SaveSummary {
            created: body.data.transaction_ids.len(),
            duplicates: body.data.duplicate_import_ids.len(),
            saved: body.data.transactions.len(),
            duplicate_import_ids: body.data.duplicate_import_ids,
        })
    }
}
