// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! API callers authenticate every request with an API key and an HMAC
//! signature made with the secret issued alongside that key.
//!
//! ## Auth Flow
//!
//! 1. The caller sends three headers:
//!    - `X-Quantish-Key`: the raw API key
//!    - `X-Quantish-Timestamp`: milliseconds since the Unix epoch
//!    - `X-Quantish-Signature`: base64 HMAC-SHA256 over the canonical message
//! 2. The server:
//!    - Hashes the key and looks up the stored record
//!    - Rejects unknown and revoked keys
//!    - Decrypts the key's signing secret with the key vault
//!    - Verifies timestamp window and signature
//!
//! ## Security
//!
//! - Raw keys are never stored, only their SHA-256 hash
//! - Signing secrets are stored encrypted and returned once at issuance
//! - Signature comparison is constant-time
//! - A valid request can be replayed inside the window (no nonce cache)

pub mod error;
pub mod extractor;

use std::time::Duration;

use axum::http::HeaderMap;
use chrono::Utc;
use serde_json::Value;
use zeroize::Zeroizing;

use crate::crypto::{
    api_key::generate_api_secret, generate_api_key, hash_api_key,
    request_signing::verify_at, KeyVault, SignedRequestEnvelope,
};
use crate::error::CoreError;
use crate::models::ApiKeyRecord;
use crate::storage::{CustodyStore, StorageError};

pub use error::AuthError;
pub use extractor::SignedRequest;

/// Header carrying the raw API key.
pub const API_KEY_HEADER: &str = "x-quantish-key";
/// Header carrying the request timestamp in milliseconds.
pub const TIMESTAMP_HEADER: &str = "x-quantish-timestamp";
/// Header carrying the base64 HMAC signature.
pub const SIGNATURE_HEADER: &str = "x-quantish-signature";

/// Identity resolved from a verified request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedKey {
    pub user_id: String,
    pub key_id: String,
}

/// A newly issued key and secret. Both are shown to the caller exactly once.
pub struct IssuedCredentials {
    pub record: ApiKeyRecord,
    pub api_key: Zeroizing<String>,
    pub api_secret: Zeroizing<String>,
}

impl std::fmt::Debug for IssuedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedCredentials")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

/// Issue a key and signing secret for `user_id` and persist the record.
pub fn issue_api_key(
    store: &dyn CustodyStore,
    vault: &KeyVault,
    user_id: &str,
    prefix: &str,
) -> Result<IssuedCredentials, CoreError> {
    let generated = generate_api_key(prefix)?;
    let api_secret = generate_api_secret()?;
    let encrypted_secret = vault.encrypt_str(&api_secret)?;

    let record = ApiKeyRecord::issue(user_id, &generated, Some(encrypted_secret));
    store.create_api_key(&record)?;
    tracing::info!(user_id, key_prefix = %record.key_prefix, "issued API key");

    Ok(IssuedCredentials {
        record,
        api_key: generated.key,
        api_secret,
    })
}

/// Revoke the key with the given hash. Revoking twice is a no-op.
pub fn revoke_api_key(store: &dyn CustodyStore, key_hash: &str) -> Result<ApiKeyRecord, CoreError> {
    let mut record = store.get_api_key_by_hash(key_hash)?;
    if record.is_active() {
        record.revoke(Utc::now());
        store.update_api_key(&record)?;
        tracing::info!(user_id = %record.user_id, key_prefix = %record.key_prefix, "revoked API key");
    }
    Ok(record)
}

/// Authenticate a signed request against the current clock.
pub fn authenticate(
    store: &dyn CustodyStore,
    vault: &KeyVault,
    headers: &HeaderMap,
    method: &str,
    path: &str,
    body: Option<&Value>,
    window: Duration,
) -> Result<AuthenticatedKey, AuthError> {
    authenticate_at(
        store,
        vault,
        headers,
        method,
        path,
        body,
        window,
        Utc::now().timestamp_millis(),
    )
}

/// Authenticate a signed request against an explicit `now_ms`.
#[allow(clippy::too_many_arguments)]
pub fn authenticate_at(
    store: &dyn CustodyStore,
    vault: &KeyVault,
    headers: &HeaderMap,
    method: &str,
    path: &str,
    body: Option<&Value>,
    window: Duration,
    now_ms: i64,
) -> Result<AuthenticatedKey, AuthError> {
    let api_key = header_str(headers, API_KEY_HEADER)?;
    let timestamp_ms = header_str(headers, TIMESTAMP_HEADER)?
        .parse::<i64>()
        .map_err(|_| AuthError::InvalidHeader(TIMESTAMP_HEADER))?;
    let signature = header_str(headers, SIGNATURE_HEADER)?;

    let record = match store.get_api_key_by_hash(&hash_api_key(api_key)) {
        Ok(record) => record,
        Err(StorageError::NotFound(_)) => return Err(AuthError::UnknownKey),
        Err(e) => return Err(AuthError::InternalError(e.to_string())),
    };
    if !record.is_active() {
        return Err(AuthError::RevokedKey);
    }

    let secret_blob = record
        .display_secret
        .as_ref()
        .ok_or_else(|| AuthError::InternalError("API key has no signing secret".to_string()))?;
    let secret = vault
        .decrypt(secret_blob)
        .map_err(|e| AuthError::InternalError(e.to_string()))?;

    let envelope = SignedRequestEnvelope {
        method: method.to_string(),
        path: path.to_string(),
        body: body.cloned(),
        timestamp_ms,
        signature: signature.to_string(),
    };

    if let Err(e) = verify_at(&envelope, &secret, window, now_ms) {
        tracing::warn!(key_prefix = %record.key_prefix, error = %e, "rejected signed request");
        return Err(e.into());
    }

    Ok(AuthenticatedKey {
        user_id: record.user_id,
        key_id: record.id,
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, AuthError> {
    headers
        .get(name)
        .ok_or(AuthError::MissingHeader(name))?
        .to_str()
        .map(str::trim)
        .map_err(|_| AuthError::InvalidHeader(name))
}
