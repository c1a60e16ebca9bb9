// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted record shapes.
//!
//! All records are flat values owned by whichever persistence backend holds
//! them. Raw API keys and plaintext private keys never appear here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{EncryptedBlob, GeneratedApiKey};

/// Wallet setup progress, in transition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SetupStage {
    /// Owner key exists, nothing derived yet
    #[default]
    Uninitialized,
    /// Safe address computed and stored
    SafePredicted,
    /// Safe has bytecode on chain
    SafeDeployed,
    /// API key issued
    CredentialsReady,
    /// Token approvals relayed
    FullySetUp,
}

/// A user as seen by the custody core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Internal identifier (UUID)
    pub id: String,
    /// Identifier in the embedding application
    pub external_id: String,
    /// Owner EOA address (checksummed hex)
    pub eoa_address: String,
    /// Owner private key, encrypted by the key vault
    pub encrypted_private_key: EncryptedBlob,
    /// Predicted Safe address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_address: Option<String>,
    /// Current setup stage
    #[serde(default)]
    pub setup_stage: SetupStage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// Create a record for a freshly bootstrapped owner key.
    pub fn new(
        external_id: impl Into<String>,
        eoa_address: impl Into<String>,
        encrypted_private_key: EncryptedBlob,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            external_id: external_id.into(),
            eoa_address: eoa_address.into(),
            encrypted_private_key,
            safe_address: None,
            setup_stage: SetupStage::Uninitialized,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `stage` if it is ahead of the current one.
    pub fn advance(&mut self, stage: SetupStage) {
        if stage > self.setup_stage {
            self.setup_stage = stage;
            self.updated_at = Utc::now();
        }
    }
}

/// Persisted form of an issued API key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub id: String,
    pub user_id: String,
    /// SHA-256 hex of the raw key
    pub key_hash: String,
    /// First 12 characters of the raw key
    pub key_prefix: String,
    /// HMAC signing secret, encrypted by the key vault
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_secret: Option<EncryptedBlob>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ApiKeyRecord {
    /// Build the storable record for a freshly generated key.
    pub fn issue(
        user_id: impl Into<String>,
        generated: &GeneratedApiKey,
        encrypted_secret: Option<EncryptedBlob>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            key_hash: generated.key_hash.clone(),
            key_prefix: generated.key_prefix.clone(),
            display_secret: encrypted_secret,
            created_at: Utc::now(),
            revoked_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }

    /// Mark the key revoked. Revoking twice keeps the first timestamp.
    pub fn revoke(&mut self, at: DateTime<Utc>) {
        if self.revoked_at.is_none() {
            self.revoked_at = Some(at);
        }
    }
}
