// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bank Ledger Sync - bank transactions into a budgeting ledger
//!
//! This crate pulls cash-account and credit-card transactions from the
//! bank's OAuth2-protected API, converts them into ledger entries and
//! bulk-imports them into the budgeting ledger. Repeated imports are
//! deduplicated by a stable import ID.
//!
//! ## Modules
//!
//! - `api` - HTTP routes (Axum): sync trigger, OAuth callback, health probes
//! - `auth` - OAuth2 authorization flow and session
//! - `connector` - Cash/credit connectors and connector election
//! - `ledger` - Ledger entries, milliunits, import IDs
//! - `providers` - Bank and ledger API clients
//! - `storage` - AES-GCM encrypted token store
//! - `sync` - One synchronization run

pub mod api;
pub mod auth;
pub mod config;
pub mod connector;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod providers;
pub mod state;
pub mod storage;
pub mod sync;
