// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Seekable read/write view over an encrypted byte store.
//!
//! [`EncryptedChannel`] exposes the *decrypted* contents of a [`ByteStore`]
//! through `std::io::{Read, Write, Seek}`. Every access is a complete
//! transcode:
//!
//! - each read decrypts the whole blob and serves bytes at the logical offset
//! - each write decrypts, splices, re-encrypts and replaces the whole blob
//! - seeking from the end decrypts once to learn the plaintext length
//!
//! There is no streaming or chunking. This is fine for the token database
//! (a handful of records) and would need a chunked AEAD construction before
//! being used for anything large.

use std::fs;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::cipher::{self, CipherError};

/// Raw storage for the sealed blob.
pub trait ByteStore {
    /// Load the full sealed blob. A store that was never written yields an empty vector.
    fn load(&mut self) -> io::Result<Vec<u8>>;

    /// Replace the full sealed blob.
    fn replace(&mut self, bytes: &[u8]) -> io::Result<()>;
}

impl ByteStore for Cursor<Vec<u8>> {
    fn load(&mut self) -> io::Result<Vec<u8>> {
        Ok(self.get_ref().clone())
    }

    fn replace(&mut self, bytes: &[u8]) -> io::Result<()> {
        *self.get_mut() = bytes.to_vec();
        self.set_position(0);
        Ok(())
    }
}

/// File-backed blob; replacement is atomic via write-to-temp then rename.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ByteStore for FileStore {
    fn load(&mut self) -> io::Result<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn replace(&mut self, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)
    }
}

/// Decrypted, seekable view over a [`ByteStore`].
pub struct EncryptedChannel<S> {
    key: Vec<u8>,
    store: S,
    pos: u64,
}

impl<S: ByteStore> EncryptedChannel<S> {
    /// Wrap `store`, sealing with `key` (16, 24 or 32 bytes).
    pub fn new(store: S, key: &[u8]) -> Result<Self, CipherError> {
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(CipherError::InvalidKeyLength(key.len()));
        }
        Ok(Self {
            key: key.to_vec(),
            store,
            pos: 0,
        })
    }

    pub fn get_ref(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Current logical position in the plaintext.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Decrypt the whole blob. An empty store is an empty plaintext.
    pub fn plaintext(&mut self) -> io::Result<Vec<u8>> {
        let sealed = self.store.load()?;
        if sealed.is_empty() {
            return Ok(Vec::new());
        }
        cipher::decrypt(&sealed, &self.key).map_err(cipher_to_io)
    }

    /// Replace the whole plaintext with `plain` in a single store
    /// replacement and move to its end.
    ///
    /// The current blob is never opened, so this also works on a blob sealed
    /// under another key. If sealing or the replacement fails, the previous
    /// blob is left as it was.
    pub fn overwrite(&mut self, plain: &[u8]) -> io::Result<()> {
        self.seal(plain)?;
        self.pos = plain.len() as u64;
        Ok(())
    }

    fn seal(&mut self, plain: &[u8]) -> io::Result<()> {
        let sealed = cipher::encrypt(plain, &self.key).map_err(cipher_to_io)?;
        self.store.replace(&sealed)
    }
}

impl<S: ByteStore> Read for EncryptedChannel<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let plain = self.plaintext()?;
        let start = to_usize(self.pos)?;
        if start >= plain.len() {
            return Ok(0);
        }
        let n = buf.len().min(plain.len() - start);
        buf[..n].copy_from_slice(&plain[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn read_to_end(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        let plain = self.plaintext()?;
        let start = to_usize(self.pos)?.min(plain.len());
        let n = plain.len() - start;
        buf.extend_from_slice(&plain[start..]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl<S: ByteStore> Write for EncryptedChannel<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut plain = self.plaintext()?;
        let start = to_usize(self.pos)?;
        let end = start + buf.len();
        if plain.len() < end {
            plain.resize(end, 0);
        }
        plain[start..end].copy_from_slice(buf);
        self.seal(&plain)?;
        self.pos = end as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: ByteStore> Seek for EncryptedChannel<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(offset) => self.pos.checked_add_signed(offset),
            SeekFrom::End(offset) => {
                let len = self.plaintext()?.len() as u64;
                len.checked_add_signed(offset)
            }
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative position")
        })?;
        self.pos = target;
        Ok(target)
    }
}

fn cipher_to_io(e: CipherError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

fn to_usize(value: u64) -> io::Result<usize> {
    usize::try_from(value)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset exceeds address space"))
}

/// Recover a [`CipherError`] carried inside an I/O error from this channel.
pub fn cipher_error(e: &io::Error) -> Option<&CipherError> {
    e.get_ref().and_then(|inner| inner.downcast_ref::<CipherError>())
}
