// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Envelope encryption of user secrets under a process-held master key.
//!
//! ## Format
//!
//! Every [`EncryptedBlob`] is AES-256-GCM with a fresh random 16-byte IV and a
//! detached 16-byte authentication tag. All three fields are standard base64
//! so blobs can be stored as JSON by any persistence backend.
//!
//! ## Key Ownership
//!
//! The master key lives inside exactly one [`KeyVault`]. It is never exposed
//! through the API, is redacted from `Debug` output and is overwritten with
//! zeros when the vault is dropped. Share a vault with `Arc<KeyVault>`; do not
//! copy the key around.

use std::fmt;
use std::num::NonZeroU32;

use aes_gcm::{
    aead::{consts::U16, generic_array::GenericArray, AeadInPlace, KeyInit},
    aes::Aes256,
    AesGcm,
};
use base64ct::{Base64, Encoding};
use ring::pbkdf2;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::fill_random;

/// Master key length in bytes.
pub const MASTER_KEY_LEN: usize = 32;

/// IV length in bytes.
pub const IV_LEN: usize = 16;

/// Authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// PBKDF2 salt length generated when the caller supplies none.
pub const SALT_LEN: usize = 32;

/// PBKDF2-HMAC-SHA512 iteration count.
pub const PBKDF2_ITERATIONS: NonZeroU32 = match NonZeroU32::new(100_000) {
    Some(n) => n,
    None => panic!("iteration count must be non-zero"),
};

/// AES-256-GCM with a 128-bit nonce.
type VaultCipher = AesGcm<Aes256, U16>;

/// Key vault errors.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// The supplied master key is malformed or not 32 bytes.
    #[error("invalid master key: {0}")]
    Config(String),

    /// Authentication failed (wrong key, tampered or malformed blob).
    #[error("integrity check failed: {0}")]
    Integrity(&'static str),

    /// The cipher refused to encrypt the plaintext.
    #[error("encryption failed: {0}")]
    Encryption(&'static str),

    /// The OS random source failed.
    #[error(transparent)]
    Random(#[from] super::RandomSourceError),
}

/// Ciphertext, IV and tag, each base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedBlob {
    pub ciphertext: String,
    pub iv: String,
    pub auth_tag: String,
}

/// A 32-byte AES-256 key that zeroizes itself on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; MASTER_KEY_LEN]);

impl MasterKey {
    /// Parse a master key literal.
    ///
    /// Accepts 64 hex characters (optionally `0x`-prefixed) or 44 characters of
    /// standard base64. Anything that does not decode to exactly 32 bytes is
    /// rejected.
    pub fn parse(literal: &str) -> Result<Self, VaultError> {
        let trimmed = literal.trim();
        let unprefixed = trimmed.strip_prefix("0x").unwrap_or(trimmed);

        let decoded = if unprefixed.len() == MASTER_KEY_LEN * 2
            && unprefixed.chars().all(|c| c.is_ascii_hexdigit())
        {
            Zeroizing::new(
                alloy::hex::decode(unprefixed)
                    .map_err(|e| VaultError::Config(format!("invalid hex: {e}")))?,
            )
        } else {
            Zeroizing::new(
                Base64::decode_vec(trimmed)
                    .map_err(|_| VaultError::Config("expected 64 hex or 44 base64 characters".into()))?,
            )
        };

        Self::from_slice(&decoded)
    }

    /// Build a key from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, VaultError> {
        if bytes.len() != MASTER_KEY_LEN {
            return Err(VaultError::Config(format!(
                "master key must be {MASTER_KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut key = [0u8; MASTER_KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    fn as_bytes(&self) -> &[u8; MASTER_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

/// Output of [`KeyVault::derive_key_from_password`].
pub struct DerivedKey {
    /// 32-byte PBKDF2 output.
    pub key: MasterKey,
    /// Salt used for the derivation (store it next to whatever the key protects).
    pub salt: Vec<u8>,
}

/// Authenticated symmetric encryption under a single master key.
pub struct KeyVault {
    key: MasterKey,
}

impl fmt::Debug for KeyVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyVault").field("key", &self.key).finish()
    }
}

impl KeyVault {
    /// Create a vault from a hex or base64 master key literal.
    pub fn new(master_key: &str) -> Result<Self, VaultError> {
        let key = MasterKey::parse(master_key)?;
        tracing::debug!("key vault initialised");
        Ok(Self { key })
    }

    /// Create a vault that owns an already-parsed key.
    pub fn from_key(key: MasterKey) -> Self {
        Self { key }
    }

    /// Encrypt `plaintext` under a fresh random IV.
    ///
    /// Two calls with the same plaintext never produce the same output.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedBlob, VaultError> {
        let mut iv = [0u8; IV_LEN];
        fill_random(&mut iv)?;

        let cipher = self.cipher();
        let mut buffer = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", &mut buffer)
            .map_err(|_| VaultError::Encryption("plaintext too long"))?;

        Ok(EncryptedBlob {
            ciphertext: Base64::encode_string(&buffer),
            iv: Base64::encode_string(&iv),
            auth_tag: Base64::encode_string(tag.as_slice()),
        })
    }

    /// Encrypt a UTF-8 secret.
    pub fn encrypt_str(&self, plaintext: &str) -> Result<EncryptedBlob, VaultError> {
        self.encrypt(plaintext.as_bytes())
    }

    /// Decrypt and authenticate a blob.
    ///
    /// Fails closed: any decoding problem, length mismatch or tag mismatch
    /// yields [`VaultError::Integrity`] and no plaintext.
    pub fn decrypt(&self, blob: &EncryptedBlob) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        let iv = Base64::decode_vec(&blob.iv).map_err(|_| VaultError::Integrity("malformed iv"))?;
        let tag = Base64::decode_vec(&blob.auth_tag)
            .map_err(|_| VaultError::Integrity("malformed auth tag"))?;
        let ciphertext = Base64::decode_vec(&blob.ciphertext)
            .map_err(|_| VaultError::Integrity("malformed ciphertext"))?;

        if iv.len() != IV_LEN {
            return Err(VaultError::Integrity("iv must be 16 bytes"));
        }
        if tag.len() != TAG_LEN {
            return Err(VaultError::Integrity("auth tag must be 16 bytes"));
        }

        let cipher = self.cipher();
        let mut buffer = Zeroizing::new(ciphertext);
        cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(&iv),
                b"",
                buffer.as_mut_slice(),
                GenericArray::from_slice(&tag),
            )
            .map_err(|_| VaultError::Integrity("authentication tag mismatch"))?;

        Ok(buffer)
    }

    /// Decrypt a blob that was produced by [`KeyVault::encrypt_str`].
    pub fn decrypt_string(&self, blob: &EncryptedBlob) -> Result<Zeroizing<String>, VaultError> {
        let bytes = self.decrypt(blob)?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| VaultError::Integrity("plaintext is not UTF-8"))?;
        Ok(Zeroizing::new(text.to_owned()))
    }

    /// Generate a new random master key, hex-encoded.
    pub fn generate_master_key() -> Result<Zeroizing<String>, VaultError> {
        let mut key = Zeroizing::new([0u8; MASTER_KEY_LEN]);
        fill_random(key.as_mut_slice())?;
        Ok(Zeroizing::new(alloy::hex::encode(key.as_slice())))
    }

    /// Derive a 32-byte key from a password with PBKDF2-HMAC-SHA512.
    ///
    /// A random 32-byte salt is generated when `salt` is `None`.
    pub fn derive_key_from_password(
        password: &str,
        salt: Option<&[u8]>,
    ) -> Result<DerivedKey, VaultError> {
        let salt = match salt {
            Some(salt) => salt.to_vec(),
            None => {
                let mut salt = vec![0u8; SALT_LEN];
                fill_random(&mut salt)?;
                salt
            }
        };

        let mut out = Zeroizing::new([0u8; MASTER_KEY_LEN]);
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA512,
            PBKDF2_ITERATIONS,
            &salt,
            password.as_bytes(),
            out.as_mut_slice(),
        );

        Ok(DerivedKey {
            key: MasterKey::from_slice(out.as_slice())?,
            salt,
        })
    }

    fn cipher(&self) -> VaultCipher {
        VaultCipher::new(GenericArray::from_slice(self.key.as_bytes()))
    }
}
