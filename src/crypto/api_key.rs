// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! API key issuance.
//!
//! A raw key looks like `qnt_<32 url-safe base64 chars>` and exists only in
//! the response to the issuing request. Storage keeps the SHA-256 hex digest
//! (for lookup) and the first 12 characters (for display).

use base64ct::{Base64UrlUnpadded, Encoding};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::{fill_random, RandomSourceError};

/// Default prefix for issued keys.
pub const DEFAULT_PREFIX: &str = "qnt";

/// Random bytes in the key body.
pub const KEY_ENTROPY_BYTES: usize = 24;

/// Random bytes in an HMAC signing secret.
pub const SECRET_ENTROPY_BYTES: usize = 32;

/// Length of the displayable key prefix.
pub const DISPLAY_PREFIX_LEN: usize = 12;

/// A freshly issued key. `key` must be handed to the caller once and dropped.
pub struct GeneratedApiKey {
    pub key: Zeroizing<String>,
    pub key_prefix: String,
    pub key_hash: String,
}

impl std::fmt::Debug for GeneratedApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedApiKey")
            .field("key_prefix", &self.key_prefix)
            .field("key_hash", &self.key_hash)
            .finish_non_exhaustive()
    }
}

/// Generate a new API key with the given prefix.
pub fn generate_api_key(prefix: &str) -> Result<GeneratedApiKey, RandomSourceError> {
    let mut entropy = Zeroizing::new([0u8; KEY_ENTROPY_BYTES]);
    fill_random(entropy.as_mut_slice())?;

    let key = Zeroizing::new(format!(
        "{prefix}_{}",
        Base64UrlUnpadded::encode_string(entropy.as_slice())
    ));
    let key_prefix = key.chars().take(DISPLAY_PREFIX_LEN).collect();
    let key_hash = hash_api_key(&key);

    Ok(GeneratedApiKey {
        key,
        key_prefix,
        key_hash,
    })
}

/// Generate a random HMAC signing secret (URL-safe base64, 43 chars).
pub fn generate_api_secret() -> Result<Zeroizing<String>, RandomSourceError> {
    let mut entropy = Zeroizing::new([0u8; SECRET_ENTROPY_BYTES]);
    fill_random(entropy.as_mut_slice())?;
    Ok(Zeroizing::new(Base64UrlUnpadded::encode_string(
        entropy.as_slice(),
    )))
}

/// SHA-256 hex digest of a raw key, used for lookup equality.
pub fn hash_api_key(key: &str) -> String {
    alloy::hex::encode(Sha256::digest(key.as_bytes()))
}
