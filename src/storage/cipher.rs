// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! AES-GCM sealing for the token store blob.
//!
//! ## Wire Layout
//!
//! ```text
//! nonce (12 bytes) || ciphertext || tag (16 bytes)
//! ```
//!
//! The key length selects the cipher: 16 bytes for AES-128, 24 for AES-192
//! and 32 for AES-256. A fresh random nonce is drawn for every call to
//! [`encrypt`], so sealing the same plaintext twice yields different blobs.

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, Nonce, OsRng};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};

/// GCM standard nonce length in bytes.
pub const NONCE_LEN: usize = 12;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// Errors raised while sealing or opening a blob.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    #[error("invalid AES key length {0} (expected 16, 24 or 32 bytes)")]
    InvalidKeyLength(usize),

    #[error("ciphertext is shorter than the {NONCE_LEN}-byte nonce")]
    Truncated,

    #[error("ciphertext failed authentication (tampered data or wrong key)")]
    AuthenticationFailed,
}

/// Encrypt `plaintext` under `key`, returning `nonce || ciphertext || tag`.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError> {
    match key.len() {
        16 => seal::<Aes128Gcm>(plaintext, key),
        24 => seal::<Aes192Gcm>(plaintext, key),
        32 => seal::<Aes256Gcm>(plaintext, key),
        other => Err(CipherError::InvalidKeyLength(other)),
    }
}

/// Decrypt a blob produced by [`encrypt`].
pub fn decrypt(ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError> {
    match key.len() {
        16 => open::<Aes128Gcm>(ciphertext, key),
        24 => open::<Aes192Gcm>(ciphertext, key),
        32 => open::<Aes256Gcm>(ciphertext, key),
        other => Err(CipherError::InvalidKeyLength(other)),
    }
}

fn seal<C>(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError>
where
    C: Aead + AeadCore + KeyInit,
{
    let cipher = C::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength(key.len()))?;
    let nonce = C::generate_nonce(&mut OsRng);
    let sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CipherError::AuthenticationFailed)?;

    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(nonce.as_slice());
    out.extend_from_slice(&sealed);
    Ok(out)
}

fn open<C>(ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError>
where
    C: Aead + AeadCore + KeyInit,
{
    let cipher = C::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength(key.len()))?;
    if ciphertext.len() < NONCE_LEN {
        return Err(CipherError::Truncated);
    }
    let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::<C>::from_slice(nonce), sealed)
        .map_err(|_| CipherError::AuthenticationFailed)
}
