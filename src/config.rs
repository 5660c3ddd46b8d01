// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup. A missing
//! required variable is fatal: the process must not start half-configured.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DB_ACCOUNT` | IBAN or last 4 digits of the credit card | Required |
//! | `DB_CLIENT_ID` | Bank OAuth client ID | Required |
//! | `DB_CLIENT_SECRET` | Bank OAuth client secret | Required |
//! | `DB_API_ENDPOINT_HOSTNAME` | Bank API base URL | Required |
//! | `REDIRECT_BASE_URL` | Public base URL of this service | Required |
//! | `YNAB_SECRET` | Ledger personal access token | Required |
//! | `YNAB_BUDGET_ID` | Ledger budget ID | Required |
//! | `YNAB_ACCOUNT_ID` | Ledger account receiving the transactions | Required |
//! | `TOKEN_STORE_KEY` | Base64 AES key (16, 24 or 32 bytes) | Required |
//! | `YNAB_API_BASE_URL` | Ledger API base URL | `https://api.youneedabudget.com/v1` |
//! | `DATA_DIR` | Directory holding the sealed token database | `./data` |
//! | `SYNC_LOOKBACK_DAYS` | Booking-date window for retrieval | `10` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `3000` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::fmt;
use std::path::PathBuf;

use base64ct::{Base64, Encoding};

use crate::storage::paths::DATA_ROOT;

pub const ACCOUNT_ENV: &str = "DB_ACCOUNT";
pub const CLIENT_ID_ENV: &str = "DB_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "DB_CLIENT_SECRET";
pub const BANK_API_BASE_URL_ENV: &str = "DB_API_ENDPOINT_HOSTNAME";
pub const REDIRECT_BASE_URL_ENV: &str = "REDIRECT_BASE_URL";
pub const LEDGER_SECRET_ENV: &str = "YNAB_SECRET";
pub const LEDGER_BUDGET_ID_ENV: &str = "YNAB_BUDGET_ID";
pub const LEDGER_ACCOUNT_ID_ENV: &str = "YNAB_ACCOUNT_ID";
pub const TOKEN_STORE_KEY_ENV: &str = "TOKEN_STORE_KEY";
pub const LEDGER_API_BASE_URL_ENV: &str = "YNAB_API_BASE_URL";
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const LOOKBACK_DAYS_ENV: &str = "SYNC_LOOKBACK_DAYS";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_LEDGER_API_BASE_URL: &str = "https://api.youneedabudget.com/v1";
pub const DEFAULT_LOOKBACK_DAYS: i64 = 10;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;

/// Path segment of the OAuth callback, appended to `REDIRECT_BASE_URL`.
pub const CALLBACK_PATH: &str = "authorized";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing/empty connector parameter: cannot proceed without a value for {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Fully resolved runtime configuration.
#[derive(Clone)]
pub struct Config {
    pub account_number: String,
    pub client_id: String,
    pub client_secret: String,
    /// Always ends with `/`.
    pub bank_api_base_url: String,
    /// `REDIRECT_BASE_URL` joined with [`CALLBACK_PATH`].
    pub redirect_url: String,
    pub ledger_secret: String,
    pub ledger_budget_id: String,
    pub ledger_account_id: String,
    pub ledger_api_base_url: String,
    pub token_store_key: Vec<u8>,
    pub data_dir: PathBuf,
    pub lookback_days: i64,
    pub host: String,
    pub port: u16,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("account_number", &self.account_number)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("bank_api_base_url", &self.bank_api_base_url)
            .field("redirect_url", &self.redirect_url)
            .field("ledger_secret", &"<redacted>")
            .field("ledger_budget_id", &self.ledger_budget_id)
            .field("ledger_account_id", &self.ledger_account_id)
            .field("ledger_api_base_url", &self.ledger_api_base_url)
            .field("token_store_key", &"<redacted>")
            .field("data_dir", &self.data_dir)
            .field("lookback_days", &self.lookback_days)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing(name));

        let account_number = required(ACCOUNT_ENV)?;
        let client_id = required(CLIENT_ID_ENV)?;
        let client_secret = required(CLIENT_SECRET_ENV)?;
        let bank_api_base_url = with_trailing_slash(required(BANK_API_BASE_URL_ENV)?);
        let redirect_url = format!(
            "{}{CALLBACK_PATH}",
            with_trailing_slash(required(REDIRECT_BASE_URL_ENV)?)
        );
        let ledger_secret = required(LEDGER_SECRET_ENV)?;
        let ledger_budget_id = required(LEDGER_BUDGET_ID_ENV)?;
        let ledger_account_id = required(LEDGER_ACCOUNT_ID_ENV)?;
        let token_store_key = decode_store_key(&required(TOKEN_STORE_KEY_ENV)?)?;

        let ledger_api_base_url = optional(LEDGER_API_BASE_URL_ENV)
            .unwrap_or_else(|| DEFAULT_LEDGER_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let data_dir = PathBuf::from(optional(DATA_DIR_ENV).unwrap_or_else(|| DATA_ROOT.to_string()));
        let lookback_days = match optional(LOOKBACK_DAYS_ENV) {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|days| *days > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    name: LOOKBACK_DAYS_ENV,
                    reason: format!("expected a positive number of days, got {raw:?}"),
                })?,
            None => DEFAULT_LOOKBACK_DAYS,
        };
        let host = optional(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = optional(PORT_ENV)
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Ok(Self {
            account_number,
            client_id,
            client_secret,
            bank_api_base_url,
            redirect_url,
            ledger_secret,
            ledger_budget_id,
            ledger_account_id,
            ledger_api_base_url,
            token_store_key,
            data_dir,
            lookback_days,
            host,
            port,
        })
    }

    /// Verify every connector parameter is present.
    ///
    /// `from_env` already enforces this; the check matters for configs
    /// built by hand.
    pub fn check_params(&self) -> Result<(), ConfigError> {
        let params = [
            (ACCOUNT_ENV, &self.account_number),
            (CLIENT_ID_ENV, &self.client_id),
            (CLIENT_SECRET_ENV, &self.client_secret),
            (BANK_API_BASE_URL_ENV, &self.bank_api_base_url),
            (REDIRECT_BASE_URL_ENV, &self.redirect_url),
            (LEDGER_SECRET_ENV, &self.ledger_secret),
            (LEDGER_BUDGET_ID_ENV, &self.ledger_budget_id),
            (LEDGER_ACCOUNT_ID_ENV, &self.ledger_account_id),
        ];
        for (name, value) in params {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(name));
            }
        }
        Ok(())
    }
}

fn with_trailing_slash(url: String) -> String {
    if url.ends_with('/') {
        url
    } else {
        format!("{url}/")
    }
}

fn decode_store_key(raw: &str) -> Result<Vec<u8>, ConfigError> {
    let key = Base64::decode_vec(raw).map_err(|e| ConfigError::Invalid {
        name: TOKEN_STORE_KEY_ENV,
        reason: format!("not valid base64: {e}"),
    })?;
    if !matches!(key.len(), 16 | 24 | 32) {
        return Err(ConfigError::Invalid {
            name: TOKEN_STORE_KEY_ENV,
            reason: format!("decoded key is {} bytes, expected 16, 24 or 32", key.len()),
        });
    }
    Ok(key)
}
