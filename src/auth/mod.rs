// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authorization Module
//!
//! OAuth2 authorization-code flow against the bank API.
//!
//! ## Auth Flow
//!
//! 1. A sync run asks [`OAuthFlow::authorize`] whether the session is ready
//! 2. If not, the user is redirected to the bank's consent page
//! 3. The bank redirects back to `/authorized?code=...&state=...`; the
//!    `state` must be the one issued with the consent URL
//! 4. The code is exchanged for a token, which replaces the session token
//!    and is persisted in the encrypted token store
//!
//! ## Security
//!
//! - Tokens are sealed at rest with AES-GCM
//! - Token values never appear in logs or `Debug` output
//! - The session is an explicit value, not process-global state

pub mod error;
pub mod flow;
pub mod session;

pub use error::AuthError;
pub use flow::{needs_refresh, OAuthFlow, SCOPES, TOKEN_REFRESH_WINDOW_DAYS};
pub use session::Session;
