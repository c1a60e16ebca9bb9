// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Owner key bootstrap.
//!
//! Every user gets a fresh secp256k1 key that owns their Safe. The key is
//! stored only as a key-vault blob of its hex encoding and is rebuilt into a
//! [`PrivateKeySigner`] for the duration of a signing operation.

use alloy::{primitives::Address, signers::local::PrivateKeySigner};
use zeroize::Zeroizing;

use crate::crypto::{fill_random, EncryptedBlob, KeyVault, VaultError};

/// Attempts before giving up on drawing a valid secp256k1 scalar.
const KEYGEN_ATTEMPTS: usize = 4;

/// Owner key errors.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error(transparent)]
    Vault(#[from] VaultError),
}

/// A newly generated owner key, already encrypted.
#[derive(Debug, Clone)]
pub struct OwnerKey {
    pub address: Address,
    pub encrypted_private_key: EncryptedBlob,
}

/// Generate an owner key and encrypt it under `vault`.
pub fn generate_owner_key(vault: &KeyVault) -> Result<OwnerKey, SigningError> {
    for _ in 0..KEYGEN_ATTEMPTS {
        let mut secret = Zeroizing::new([0u8; 32]);
        fill_random(secret.as_mut_slice()).map_err(VaultError::from)?;

        // Zero or >= curve order: draw again
        let Ok(signer) = PrivateKeySigner::from_slice(secret.as_slice()) else {
            continue;
        };

        let hex_key = Zeroizing::new(alloy::hex::encode(secret.as_slice()));
        let encrypted_private_key = vault.encrypt_str(&hex_key)?;
        tracing::info!(owner = %signer.address(), "generated owner key");

        return Ok(OwnerKey {
            address: signer.address(),
            encrypted_private_key,
        });
    }

    Err(SigningError::InvalidPrivateKey(
        "random source produced no valid scalar".to_string(),
    ))
}

/// Create a signer from a hex private key (with or without `0x`).
pub fn create_signer(private_key_hex: &str) -> Result<PrivateKeySigner, SigningError> {
    let key_bytes = Zeroizing::new(
        alloy::hex::decode(private_key_hex.trim())
            .map_err(|e| SigningError::InvalidPrivateKey(e.to_string()))?,
    );

    PrivateKeySigner::from_slice(&key_bytes)
        .map_err(|e| SigningError::InvalidPrivateKey(e.to_string()))
}

/// Decrypt an owner key blob and build its signer.
pub fn signer_from_blob(
    vault: &KeyVault,
    blob: &EncryptedBlob,
) -> Result<PrivateKeySigner, SigningError> {
    let hex_key = vault.decrypt_string(blob)?;
    create_signer(&hex_key)
}
