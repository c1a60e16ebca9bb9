// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Crate-level error taxonomy.
//!
//! Each component keeps its own error enum; [`CoreError`] folds them into the
//! categories callers branch on and renders them as JSON for an HTTP layer.
//! Relay outcomes are not errors and never appear here.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::blockchain::{BuildError, ChainQueryError, SigningError};
use crate::config::ConfigError;
use crate::crypto::{RandomSourceError, SignatureError, VaultError};
use crate::relayer::RelayerError;
use crate::setup::SetupError;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Malformed or missing configuration (including the master key)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Decryption auth-tag mismatch or corrupted blob
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("Signature expired")]
    ExpiredSignature,

    #[error("Invalid signature")]
    InvalidSignature,

    /// Unknown key or user
    #[error("Not found: {0}")]
    NotFound(String),

    /// Relay submission failed (network, timeout or non-2xx)
    #[error("Relay failed: {0}")]
    Relay(String),

    /// Deployment check failed
    #[error("Chain query failed: {0}")]
    ChainQuery(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: String,
}

impl CoreError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::Config(_) => "config_error",
            CoreError::Integrity(_) => "integrity_error",
            CoreError::ExpiredSignature => "expired_signature",
            CoreError::InvalidSignature => "invalid_signature",
            CoreError::NotFound(_) => "not_found",
            CoreError::Relay(_) => "relay_error",
            CoreError::ChainQuery(_) => "chain_query_error",
            CoreError::Storage(_) => "storage_error",
            CoreError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            CoreError::ExpiredSignature | CoreError::InvalidSignature => StatusCode::UNAUTHORIZED,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Relay(_) | CoreError::ChainQuery(_) => StatusCode::BAD_GATEWAY,
            CoreError::Config(_)
            | CoreError::Integrity(_)
            | CoreError::Storage(_)
            | CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

// ========== Conversions ==========

impl From<ConfigError> for CoreError {
    fn from(err: ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}

impl From<VaultError> for CoreError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::Config(msg) => CoreError::Config(msg),
            VaultError::Integrity(reason) => CoreError::Integrity(reason.to_string()),
            VaultError::Encryption(reason) => CoreError::Internal(reason.to_string()),
            VaultError::Random(e) => CoreError::Internal(e.to_string()),
        }
    }
}

impl From<RandomSourceError> for CoreError {
    fn from(err: RandomSourceError) -> Self {
        CoreError::Internal(err.to_string())
    }
}

impl From<SignatureError> for CoreError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::Expired => CoreError::ExpiredSignature,
            SignatureError::Mismatch | SignatureError::Malformed => CoreError::InvalidSignature,
        }
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(entity) => CoreError::NotFound(entity),
            other => CoreError::Storage(other.to_string()),
        }
    }
}

impl From<ChainQueryError> for CoreError {
    fn from(err: ChainQueryError) -> Self {
        CoreError::ChainQuery(err.to_string())
    }
}

impl From<SigningError> for CoreError {
    fn from(err: SigningError) -> Self {
        match err {
            SigningError::Vault(e) => e.into(),
            SigningError::InvalidPrivateKey(msg) => CoreError::Integrity(msg),
        }
    }
}

impl From<BuildError> for CoreError {
    fn from(err: BuildError) -> Self {
        CoreError::Internal(err.to_string())
    }
}

impl From<RelayerError> for CoreError {
    fn from(err: RelayerError) -> Self {
        CoreError::Config(err.to_string())
    }
}

impl From<SetupError> for CoreError {
    fn from(err: SetupError) -> Self {
        match err {
            SetupError::Core(e) => e,
            SetupError::Storage(e) => e.into(),
            SetupError::Vault(e) => e.into(),
            SetupError::Signing(e) => e.into(),
            SetupError::ChainQuery(e) => e.into(),
            SetupError::Build(e) => e.into(),
            SetupError::Relay(msg) => CoreError::Relay(msg),
            SetupError::NotDeployed(safe) => {
                CoreError::ChainQuery(format!("Safe {safe} not deployed"))
            }
            other @ (SetupError::OutOfOrder { .. } | SetupError::InvalidAddress(_)) => {
                CoreError::Internal(other.to_string())
            }
        }
    }
}
