// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Cryptography Module
//!
//! Leaf components consumed by the authentication boundary and by wallet
//! bootstrapping:
//!
//! - [`KeyVault`] - AES-256-GCM envelope encryption under a 32-byte master key
//! - [`request_signing`] - HMAC-SHA256 request signatures with a replay window
//! - [`api_key`] - API key issuance, hashing and display prefixes
//!
//! Everything here is synchronous, CPU-bound and free of shared mutable state.
//! Every random value is drawn from the operating system CSPRNG.

pub mod api_key;
pub mod request_signing;
pub mod vault;

use ring::rand::{SecureRandom, SystemRandom};

pub use api_key::{generate_api_key, hash_api_key, GeneratedApiKey};
pub use request_signing::{sign, verify, SignatureError, SignedRequestEnvelope};
pub use vault::{DerivedKey, EncryptedBlob, KeyVault, MasterKey, VaultError};

/// The OS random source failed.
#[derive(Debug, thiserror::Error)]
#[error("system random source unavailable")]
pub struct RandomSourceError;

/// Fill `buf` from the system CSPRNG.
pub(crate) fn fill_random(buf: &mut [u8]) -> Result<(), RandomSourceError> {
    SystemRandom::new().fill(buf).map_err(|_| RandomSourceError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_random_produces_distinct_buffers() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        fill_random(&mut a).unwrap();
        fill_random(&mut b).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, [0u8; 32]);
    }
}
