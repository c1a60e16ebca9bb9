// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Polygon RPC client for deployment checks.

use std::future::Future;

use alloy::{
    network::Ethereum,
    primitives::{Address, Bytes},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
};

use super::types::NetworkConfig;

/// HTTP provider type (with the default fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Chain query errors.
#[derive(Debug, thiserror::Error)]
pub enum ChainQueryError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("RPC error: {0}")]
    Rpc(String),
}

/// Read-only chain access needed by wallet setup.
pub trait ChainQuery: Send + Sync {
    /// Bytecode currently deployed at `address` (empty for an EOA or nothing).
    fn get_code(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<Bytes, ChainQueryError>> + Send;

    /// Whether a contract exists at `address`.
    fn is_deployed(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<bool, ChainQueryError>> + Send {
        async move { Ok(!self.get_code(address).await?.is_empty()) }
    }
}

/// JSON-RPC backed [`ChainQuery`].
pub struct ChainClient {
    rpc_url: String,
    provider: HttpProvider,
}

impl ChainClient {
    /// Create a client for an RPC endpoint.
    pub fn new(rpc_url: &str) -> Result<Self, ChainQueryError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainQueryError::InvalidRpcUrl(e.to_string()))?;

        let provider = ProviderBuilder::new().connect_http(url);

        Ok(Self {
            rpc_url: rpc_url.to_string(),
            provider,
        })
    }

    /// Create a client for a built-in network.
    pub fn for_network(network: &NetworkConfig) -> Result<Self, ChainQueryError> {
        Self::new(network.rpc_url)
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }
}

impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("rpc_url", &self.rpc_url)
            .finish_non_exhaustive()
    }
}

impl ChainQuery for ChainClient {
    fn get_code(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<Bytes, ChainQueryError>> + Send {
        async move {
            self.provider
                .get_code_at(address)
                .await
                .map_err(|e| ChainQueryError::Rpc(e.to_string()))
        }
    }
}
