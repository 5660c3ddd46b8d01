// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encrypted key-value store for OAuth2 tokens.
//!
//! The database is a JSON object mapping an account identifier to a
//! [`TokenRecord`], sealed through an [`EncryptedChannel`]:
//!
//! ```json
//! {
//!   "DE49500105178844289951": {
//!     "access_token": "...",
//!     "token_type": "Bearer",
//!     "refresh_token": "...",
//!     "expiry": "2026-11-03T09:41:12Z"
//!   }
//! }
//! ```
//!
//! There is no cache. Every operation round-trips through
//! decrypt+deserialize or serialize+encrypt. [`TokenStore::upsert_token`] is
//! a plain read-modify-write, so two overlapping writers can lose an update
//! (last write wins). That is acceptable for one account and one runner.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Cursor, Read, Seek};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::cipher::CipherError;
use super::encrypted_channel::{cipher_error, ByteStore, EncryptedChannel, FileStore};
use super::StoragePaths;

/// Fixed textual format of [`TokenRecord::expiry`] (UTC, second precision).
pub const EXPIRY_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Persisted form of a token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: String,
    pub expiry: String,
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("token_type", &self.token_type)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

/// Account identifier to token record.
pub type TokenDatabase = BTreeMap<String, TokenRecord>;

/// OAuth2 token as used by the authorization flow.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    /// Empty when the provider did not grant offline access.
    pub refresh_token: String,
    pub expiry: DateTime<Utc>,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("token_type", &self.token_type)
            .field("has_refresh_token", &self.has_refresh_token())
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

impl Token {
    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// Whether the access token itself can no longer be used at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }

    /// Convert to the persisted form. Sub-second precision is dropped.
    pub fn dehydrate(&self) -> TokenRecord {
        TokenRecord {
            access_token: self.access_token.clone(),
            token_type: self.token_type.clone(),
            refresh_token: self.refresh_token.clone(),
            expiry: self.expiry.format(EXPIRY_FORMAT).to_string(),
        }
    }

    /// Rebuild a token from its persisted form.
    pub fn rehydrate(record: &TokenRecord) -> Result<Self, chrono::ParseError> {
        let expiry = NaiveDateTime::parse_from_str(&record.expiry, EXPIRY_FORMAT)?.and_utc();
        Ok(Self {
            access_token: record.access_token.clone(),
            token_type: record.token_type.clone(),
            refresh_token: record.refresh_token.clone(),
            expiry,
        })
    }
}

/// Errors raised by token store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no token stored for account {0}")]
    NotFound(String),

    #[error("token database is not valid JSON: {0}")]
    Deserialization(#[source] serde_json::Error),

    #[error("stored expiry for account {id} is malformed: {source}")]
    DateParse {
        id: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("token database could not be decrypted: {0}")]
    Cipher(#[from] CipherError),

    #[error("token database I/O failed: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        match cipher_error(&e) {
            Some(cipher) => StoreError::Cipher(cipher.clone()),
            None => StoreError::Io(e),
        }
    }
}

/// Result type for token store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Token store over an encrypted byte store.
pub struct TokenStore<S = FileStore> {
    channel: Mutex<EncryptedChannel<S>>,
}

impl TokenStore<FileStore> {
    /// Open the file-backed store under the data directory.
    pub fn open(paths: &StoragePaths, key: &[u8]) -> Result<Self, CipherError> {
        Self::new(FileStore::new(paths.token_database()), key)
    }
}

impl TokenStore<Cursor<Vec<u8>>> {
    /// Volatile store, used by tests.
    pub fn in_memory(key: &[u8]) -> Result<Self, CipherError> {
        Self::new(Cursor::new(Vec::new()), key)
    }
}

impl<S: ByteStore> TokenStore<S> {
    pub fn new(store: S, key: &[u8]) -> Result<Self, CipherError> {
        Ok(Self {
            channel: Mutex::new(EncryptedChannel::new(store, key)?),
        })
    }

    fn channel(&self) -> StoreResult<MutexGuard<'_, EncryptedChannel<S>>> {
        self.channel
            .lock()
            .map_err(|_| StoreError::Io(io::Error::other("token store lock poisoned")))
    }

    /// Load and deserialize the whole database.
    ///
    /// An empty backing store is an empty database.
    pub fn get_database(&self) -> StoreResult<TokenDatabase> {
        let mut channel = self.channel()?;
        channel.rewind()?;
        let mut plain = Vec::new();
        channel.read_to_end(&mut plain)?;

        if plain.is_empty() {
            return Ok(TokenDatabase::new());
        }
        serde_json::from_slice(&plain).map_err(StoreError::Deserialization)
    }

    /// Serialize and replace the whole database.
    pub fn set_database(&self, db: &TokenDatabase) -> StoreResult<()> {
        let plain = match serde_json::to_vec(db) {
            Ok(plain) => plain,
            Err(e) => {
                // A string-keyed map of string records always serializes.
                error!(error = %e, "Token database serialization failed; nothing written");
                return Ok(());
            }
        };

        self.channel()?.overwrite(&plain)?;
        Ok(())
    }

    /// Look up the raw record for an account.
    pub fn get_record(&self, id: &str) -> StoreResult<TokenRecord> {
        self.get_database()?
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Look up and rehydrate the token for an account.
    pub fn get_token(&self, id: &str) -> StoreResult<Token> {
        let record = self.get_record(id)?;
        Token::rehydrate(&record).map_err(|source| StoreError::DateParse {
            id: id.to_string(),
            source,
        })
    }

    /// Insert or replace the token for an account.
    pub fn upsert_token(&self, id: &str, token: &Token) -> StoreResult<()> {
        let mut db = self.get_database()?;
        db.insert(id.to_string(), token.dehydrate());
        self.set_database(&db)?;
        debug!(account = %id, records = db.len(), "Token persisted");
        Ok(())
    }

    /// Remove the token for an account. An absent account is not an error.
    pub fn remove_token(&self, id: &str) -> StoreResult<()> {
        let mut db = self.get_database()?;
        if db.remove(id).is_some() {
            self.set_database(&db)?;
            debug!(account = %id, records = db.len(), "Token removed");
        }
        Ok(())
    }
}
