// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gasless relay client.
//!
//! Signed [`RelayRequest`]s are POSTed as JSON to `{endpoint}/relay`. Every
//! outcome is folded into a [`RelayResult`]: the call either yields a
//! transaction hash or a definite failure message, and never returns an error.
//! There are no retries; callers own retry and backoff.

use std::time::Duration;

use alloy::{primitives::Address, signers::Signer};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::blockchain::{BuildError, RelayRequest, SafeTransactionBuilder};

/// Default per-request timeout.
pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Terminal outcome of a relay call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RelayResult {
    pub fn submitted(tx_hash: impl Into<String>) -> Self {
        Self {
            success: true,
            tx_hash: Some(tx_hash.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            tx_hash: None,
            error: Some(error.into()),
        }
    }
}

/// Relay client errors. Only construction can fail.
#[derive(Debug, thiserror::Error)]
pub enum RelayerError {
    #[error("Relayer configuration invalid: {0}")]
    Config(String),
}

/// HTTP client for one relay endpoint.
#[derive(Debug, Clone)]
pub struct RelayerClient {
    endpoint: String,
    timeout: Duration,
    http: Client,
}

impl RelayerClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, RelayerError> {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        url::Url::parse(&endpoint).map_err(|e| RelayerError::Config(e.to_string()))?;

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayerError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint,
            timeout,
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Submit a signed request.
    pub async fn relay(&self, request: &RelayRequest) -> RelayResult {
        let url = format!("{}/relay", self.endpoint);
        tracing::info!(
            from = %request.from,
            to = %request.to,
            proxy_wallet = %request.proxy_wallet,
            "submitting relay request"
        );

        let response = match self.http.post(&url).json(request).send().await {
            Ok(response) => response,
            Err(e) => {
                let reason = if e.is_timeout() {
                    format!("relay request timed out after {} ms", self.timeout.as_millis())
                } else {
                    format!("relay request failed: {e}")
                };
                tracing::warn!(proxy_wallet = %request.proxy_wallet, error = %reason, "relay failed");
                return RelayResult::failed(reason);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                proxy_wallet = %request.proxy_wallet,
                status = status.as_u16(),
                "relay rejected"
            );
            return RelayResult::failed(format!("{} - {}", status.as_u16(), body));
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => return RelayResult::failed(format!("relay response was invalid: {e}")),
        };

        let tx_hash = body
            .get("txHash")
            .and_then(Value::as_str)
            .or_else(|| body.get("transactionHash").and_then(Value::as_str));
        match tx_hash {
            Some(tx_hash) => {
                tracing::info!(proxy_wallet = %request.proxy_wallet, tx_hash, "relay accepted");
                RelayResult::submitted(tx_hash)
            }
            None => RelayResult::failed("relay response missing transaction hash"),
        }
    }

    /// Build, sign and relay the Safe deployment for `signer`.
    pub async fn deploy_safe<S>(
        &self,
        builder: &SafeTransactionBuilder,
        signer: &S,
    ) -> Result<RelayResult, BuildError>
    where
        S: Signer + Sync,
    {
        let request = builder.build_deployment(signer).await?;
        Ok(self.relay(&request).await)
    }

    /// Build, sign and relay a call from `safe`.
    pub async fn execute_transaction<S>(
        &self,
        builder: &SafeTransactionBuilder,
        signer: &S,
        safe: Address,
        to: Address,
        data: &[u8],
    ) -> Result<RelayResult, BuildError>
    where
        S: Signer + Sync,
    {
        let request = builder.build_transaction(signer, safe, to, data).await?;
        Ok(self.relay(&request).await)
    }
}
