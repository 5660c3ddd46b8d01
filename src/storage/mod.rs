// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Encrypted Storage Module
//!
//! Persistent state is a single AES-GCM sealed blob holding the OAuth2
//! token database. Nothing else is written to disk.
//!
//! ## Layers
//!
//! - [`cipher`] seals and opens blobs (`nonce || ciphertext || tag`)
//! - [`encrypted_channel`] exposes the decrypted blob as `Read + Write + Seek`
//! - [`token_store`] keeps the JSON token database on top of the channel
//!
//! ## Storage Layout
//!
//! ```text
//! $DATA_DIR/
//!   tokens.enc      # sealed {account_id: token_record} map
//! ```
//!
//! ## Important Notes
//!
//! - Every access decrypts or re-encrypts the whole blob
//! - There is no cross-process locking; concurrent writers are last-write-wins

pub mod cipher;
pub mod encrypted_channel;
pub mod paths;
pub mod token_store;

pub use cipher::CipherError;
pub use encrypted_channel::{ByteStore, EncryptedChannel, FileStore};
pub use paths::StoragePaths;
pub use token_store::{
    StoreError, StoreResult, Token, TokenDatabase, TokenRecord, TokenStore, EXPIRY_FORMAT,
};
