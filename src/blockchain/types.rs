// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain types and constants.

use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};

/// Network configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: &'static str,
    /// Chain ID
    pub chain_id: u64,
    /// RPC endpoint URL
    pub rpc_url: &'static str,
    /// Block explorer URL
    pub explorer_url: &'static str,
}

/// Polygon PoS mainnet configuration.
pub const POLYGON: NetworkConfig = NetworkConfig {
    name: "Polygon",
    chain_id: 137,
    rpc_url: "https://polygon-rpc.com",
    explorer_url: "https://polygonscan.com",
};

/// Safe v1.3.0 `GnosisSafeProxyFactory` on Polygon.
pub const POLYGON_SAFE_PROXY_FACTORY: Address =
    address!("a6B71E26C5e0845f74c812102Ca7114b6a896AB2");

/// Safe v1.3.0 `GnosisSafeL2` singleton on Polygon. This is the singleton the
/// official Safe tooling deploys on L2 chains and the one address prediction
/// uses by default.
pub const POLYGON_SAFE_SINGLETON: Address = address!("3E5c63644E683549055b9Be8653de26E0B4CD36E");

/// Safe v1.3.0 `GnosisSafe` (L1 flavour) singleton, same address on every chain.
pub const SAFE_L1_SINGLETON: Address = address!("d9Db270c1B5E3Bd161E8c8503c55cEABeE709552");

/// Bridged USDC (USDC.e) on Polygon.
pub const POLYGON_USDC: Address = address!("2791Bca1f2de4661ED88A30C99A7a9449Aa84174");

/// Conditional Tokens Framework (ERC-1155 outcome tokens) on Polygon.
pub const POLYGON_CONDITIONAL_TOKENS: Address =
    address!("4D97DCd97eC945f40cF65F87097ACe5EA0476045");

/// CTF exchange on Polygon.
pub const POLYGON_CTF_EXCHANGE: Address = address!("4bFb41d5B3570DeFd03C39a9A4D8dE6Bd8B8982E");

/// Neg-risk CTF exchange on Polygon.
pub const POLYGON_NEG_RISK_EXCHANGE: Address =
    address!("C5d563A36AE78145C45a50134d48A1215220f80a");

/// Neg-risk adapter on Polygon.
pub const POLYGON_NEG_RISK_ADAPTER: Address =
    address!("d91E80cF2E7be2e162c6513ceD06f1dD0dA35296");

/// Factory and singleton pair that determines predicted Safe addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeContracts {
    pub proxy_factory: Address,
    pub singleton: Address,
}

impl SafeContracts {
    /// Safe v1.3.0 deployment on Polygon.
    pub const fn polygon() -> Self {
        Self {
            proxy_factory: POLYGON_SAFE_PROXY_FACTORY,
            singleton: POLYGON_SAFE_SINGLETON,
        }
    }
}

impl Default for SafeContracts {
    fn default() -> Self {
        Self::polygon()
    }
}

/// How a Safe grants a spender access to a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalKind {
    /// ERC-20 `approve(spender, MAX_UINT256)`
    Erc20Approve,
    /// ERC-1155 `setApprovalForAll(spender, true)`
    Erc1155ApproveAll,
}

/// A single allowance the Safe needs before it can trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalTarget {
    /// Stable name, used as the key of the returned signature map
    pub name: String,
    /// Token contract the call is sent to
    pub token: Address,
    /// Contract receiving the allowance
    pub spender: Address,
    pub kind: ApprovalKind,
}

impl ApprovalTarget {
    pub fn erc20(name: impl Into<String>, token: Address, spender: Address) -> Self {
        Self {
            name: name.into(),
            token,
            spender,
            kind: ApprovalKind::Erc20Approve,
        }
    }

    pub fn erc1155(name: impl Into<String>, token: Address, spender: Address) -> Self {
        Self {
            name: name.into(),
            token,
            spender,
            kind: ApprovalKind::Erc1155ApproveAll,
        }
    }
}

/// Allowances a Polygon trading Safe needs: collateral and outcome tokens
/// for the CTF exchange, the neg-risk exchange and the neg-risk adapter.
pub fn polygon_trading_approvals() -> Vec<ApprovalTarget> {
    vec![
        ApprovalTarget::erc20("usdc_ctf_exchange", POLYGON_USDC, POLYGON_CTF_EXCHANGE),
        ApprovalTarget::erc20("usdc_neg_risk_exchange", POLYGON_USDC, POLYGON_NEG_RISK_EXCHANGE),
        ApprovalTarget::erc20("usdc_neg_risk_adapter", POLYGON_USDC, POLYGON_NEG_RISK_ADAPTER),
        ApprovalTarget::erc1155(
            "ctf_ctf_exchange",
            POLYGON_CONDITIONAL_TOKENS,
            POLYGON_CTF_EXCHANGE,
        ),
        ApprovalTarget::erc1155(
            "ctf_neg_risk_exchange",
            POLYGON_CONDITIONAL_TOKENS,
            POLYGON_NEG_RISK_EXCHANGE,
        ),
        ApprovalTarget::erc1155(
            "ctf_neg_risk_adapter",
            POLYGON_CONDITIONAL_TOKENS,
            POLYGON_NEG_RISK_ADAPTER,
        ),
    ]
}
