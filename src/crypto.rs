// Copyright 2022 The Engula Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use aes::{Aes128, Aes256};
use cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use ctr::Ctr128BE;

use crate::{kms::EncryptionKey, proto::CipherSuiteProto, Error, Result};

type Aes128Ctr = Ctr128BE<Aes128>;
type Aes256Ctr = Ctr128BE<Aes256>;

enum Keystream {
    Aes128(Box<Aes128Ctr>),
    Aes256(Box<Aes256Ctr>),
}

impl Keystream {
    fn apply(&mut self, buf: &mut [u8]) {
        match self {
            Keystream::Aes128(cipher) => cipher.apply_keystream(buf),
            Keystream::Aes256(cipher) => cipher.apply_keystream(buf),
        }
    }
}

/// Transparent-encryption state for one open file: the persistent
/// `(key, iv)` pair plus an ephemeral CTR keystream positioned at a byte
/// offset.
///
/// The keystream is built lazily and advances with every encrypted byte.
/// When the downstream writer accepts fewer bytes than were encrypted, the
/// keystream's counter is ahead of the delivered position and must be
/// dropped via [`invalidate`]; the next `encrypt_at` rebuilds it at the
/// caller's offset.
///
/// [`invalidate`]: TransparentEncryption::invalidate
pub(crate) struct TransparentEncryption {
    key: EncryptionKey,
    keystream: Option<Keystream>,
    scratch: Vec<u8>,
}

impl TransparentEncryption {
    pub fn new(key: EncryptionKey) -> Result<Self> {
        if key.suite != CipherSuiteProto::AesCtrNopadding {
            return Err(Error::transport(format!(
                "unsupported cipher suite {:?}",
                key.suite
            )));
        }
        if !matches!(key.key.len(), 16 | 32) {
            return Err(Error::transport(format!(
                "unsupported AES key length {}",
                key.key.len()
            )));
        }
        if key.iv.len() != 16 {
            return Err(Error::transport(format!(
                "unsupported AES-CTR iv length {}",
                key.iv.len()
            )));
        }
        Ok(TransparentEncryption {
            key,
            keystream: None,
            scratch: Vec::new(),
        })
    }

    /// Encrypts `src` and returns the ciphertext. `pos` is consulted only
    /// when no keystream is live; an existing keystream continues from
    /// wherever it previously stopped, which by construction equals `pos`.
    pub fn encrypt_at(&mut self, pos: u64, src: &[u8]) -> Result<&[u8]> {
        if self.keystream.is_none() {
            self.keystream = Some(Self::build_keystream(&self.key, pos)?);
        }
        self.scratch.clear();
        self.scratch.extend_from_slice(src);
        if let Some(keystream) = self.keystream.as_mut() {
            keystream.apply(&mut self.scratch);
        }
        Ok(&self.scratch)
    }

    /// Drops the keystream. Must be called whenever fewer bytes than were
    /// encrypted reached the downstream writer, so the counter cannot drift
    /// from the file position.
    pub fn invalidate(&mut self) {
        self.keystream = None;
    }

    fn build_keystream(key: &EncryptionKey, pos: u64) -> Result<Keystream> {
        let mut keystream = match key.key.len() {
            16 => Keystream::Aes128(Box::new(
                Aes128Ctr::new_from_slices(&key.key, &key.iv).map_err(Error::transport)?,
            )),
            _ => Keystream::Aes256(Box::new(
                Aes256Ctr::new_from_slices(&key.key, &key.iv).map_err(Error::transport)?,
            )),
        };
        match &mut keystream {
            Keystream::Aes128(cipher) => cipher.try_seek(pos).map_err(Error::transport)?,
            Keystream::Aes256(cipher) => cipher.try_seek(pos).map_err(Error::transport)?,
        }
        Ok(keystream)
    }
}
