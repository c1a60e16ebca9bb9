// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Meta-transaction building and signing for Safe wallets.
//!
//! Two payloads are signed by the Safe owner and handed to the relayer:
//!
//! ```text
//! deployment:  keccak256("SAFE-CREATE" ++ signer ++ proxyFactory ++ proxyWallet)
//! transaction: keccak256("SAFE-TX" ++ safe ++ to ++ data)
//! ```
//!
//! Addresses contribute their raw 20 bytes and `data` its raw calldata bytes.
//! The 32-byte digest is signed as an EIP-191 personal message, so the
//! signature is the usual 65-byte `r ++ s ++ v` with `v` in {27, 28}.
//!
//! The builder never sees key material. It only talks to an
//! [`alloy::signers::Signer`], which can be a local key, a KMS or a hardware
//! wallet.

use std::collections::BTreeMap;

use alloy::{
    primitives::{keccak256, Address, B256},
    signers::Signer,
};
use serde::{Deserialize, Serialize};

use super::contracts::{approval_calldata, create_proxy_calldata};
use super::safe::SafeAddressDeriver;
use super::types::{ApprovalTarget, SafeContracts};

const SAFE_CREATE_TAG: &[u8] = b"SAFE-CREATE";
const SAFE_TX_TAG: &[u8] = b"SAFE-TX";

/// Transaction building errors.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Payload accepted by the relay endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    /// Owner (signer) address
    pub from: String,
    /// Call target
    pub to: String,
    /// Safe the call is executed through
    pub proxy_wallet: String,
    /// 0x-prefixed calldata
    pub data: String,
    /// 0x-prefixed 65-byte signature
    pub signature: String,
}

/// Digest signed to authorize a Safe deployment.
pub fn deployment_digest(signer: Address, proxy_factory: Address, proxy_wallet: Address) -> B256 {
    let mut preimage = Vec::with_capacity(SAFE_CREATE_TAG.len() + 60);
    preimage.extend_from_slice(SAFE_CREATE_TAG);
    preimage.extend_from_slice(signer.as_slice());
    preimage.extend_from_slice(proxy_factory.as_slice());
    preimage.extend_from_slice(proxy_wallet.as_slice());
    keccak256(&preimage)
}

/// Digest signed to authorize a call from a Safe.
pub fn transaction_digest(safe: Address, to: Address, data: &[u8]) -> B256 {
    let mut preimage = Vec::with_capacity(SAFE_TX_TAG.len() + 40 + data.len());
    preimage.extend_from_slice(SAFE_TX_TAG);
    preimage.extend_from_slice(safe.as_slice());
    preimage.extend_from_slice(to.as_slice());
    preimage.extend_from_slice(data);
    keccak256(&preimage)
}

/// Builds signed relay payloads for one Safe deployment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafeTransactionBuilder {
    contracts: SafeContracts,
}

impl SafeTransactionBuilder {
    pub fn new(contracts: SafeContracts) -> Self {
        Self { contracts }
    }

    pub fn contracts(&self) -> &SafeContracts {
        &self.contracts
    }

    /// Sign the deployment authorization for `proxy_wallet`.
    pub async fn create_deployment_signature<S>(
        &self,
        signer: &S,
        proxy_factory: Address,
        proxy_wallet: Address,
    ) -> Result<String, BuildError>
    where
        S: Signer + Sync,
    {
        let digest = deployment_digest(signer.address(), proxy_factory, proxy_wallet);
        sign_digest(signer, digest).await
    }

    /// Sign an arbitrary call from `safe`.
    pub async fn build_transaction<S>(
        &self,
        signer: &S,
        safe: Address,
        to: Address,
        data: &[u8],
    ) -> Result<RelayRequest, BuildError>
    where
        S: Signer + Sync,
    {
        let signature = sign_digest(signer, transaction_digest(safe, to, data)).await?;

        Ok(RelayRequest {
            from: signer.address().to_string(),
            to: to.to_string(),
            proxy_wallet: safe.to_string(),
            data: format!("0x{}", alloy::hex::encode(data)),
            signature,
        })
    }

    /// Deployment payload: `createProxyWithNonce` sent to the factory,
    /// authorized with the SAFE-CREATE signature over the predicted address.
    pub async fn build_deployment<S>(&self, signer: &S) -> Result<RelayRequest, BuildError>
    where
        S: Signer + Sync,
    {
        let owner = signer.address();
        let safe = SafeAddressDeriver::new(self.contracts).predict(owner);
        let signature = self
            .create_deployment_signature(signer, self.contracts.proxy_factory, safe)
            .await?;
        let data = create_proxy_calldata(owner, self.contracts.singleton);

        Ok(RelayRequest {
            from: owner.to_string(),
            to: self.contracts.proxy_factory.to_string(),
            proxy_wallet: safe.to_string(),
            data: format!("0x{}", alloy::hex::encode(data)),
            signature,
        })
    }

    /// One signed relay payload per approval, keyed by target name.
    pub async fn build_approval_requests<S>(
        &self,
        signer: &S,
        safe: Address,
        approvals: &[ApprovalTarget],
    ) -> Result<BTreeMap<String, RelayRequest>, BuildError>
    where
        S: Signer + Sync,
    {
        let mut requests = BTreeMap::new();
        for target in approvals {
            let data = approval_calldata(target);
            let request = self.build_transaction(signer, safe, target.token, &data).await?;
            requests.insert(target.name.clone(), request);
        }
        Ok(requests)
    }

    /// SAFE-TX signatures for every approval, keyed by target name.
    pub async fn create_approval_signatures<S>(
        &self,
        signer: &S,
        safe: Address,
        approvals: &[ApprovalTarget],
    ) -> Result<BTreeMap<String, String>, BuildError>
    where
        S: Signer + Sync,
    {
        Ok(self
            .build_approval_requests(signer, safe, approvals)
            .await?
            .into_iter()
            .map(|(name, request)| (name, request.signature))
            .collect())
    }
}

async fn sign_digest<S>(signer: &S, digest: B256) -> Result<String, BuildError>
where
    S: Signer + Sync,
{
    let signature = signer
        .sign_message(digest.as_slice())
        .await
        .map_err(|e| BuildError::Signing(e.to_string()))?;
    Ok(format!("0x{}", alloy::hex::encode(signature.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::signing::create_signer;
    use crate::blockchain::types::{
        polygon_trading_approvals, POLYGON_CTF_EXCHANGE, POLYGON_SAFE_PROXY_FACTORY, POLYGON_USDC,
    };
    use alloy::primitives::{address, b256, Signature};
    use alloy::signers::local::PrivateKeySigner;

    const OWNER: Address = address!("7E5F4552091A69125d5DfCb7b8C2659029395Bdf");
    const SAFE: Address = address!("F431F8629D5d0c771F17369C1cc64Ee16e5147EB");

    fn owner_signer() -> PrivateKeySigner {
        create_signer("0000000000000000000000000000000000000000000000000000000000000001").unwrap()
    }

    fn recover(signature: &str, digest: B256) -> Address {
        let raw = alloy::hex::decode(signature).unwrap();
        assert_eq!(raw.len(), 65);
        assert!(raw[64] == 27 || raw[64] == 28);
        Signature::from_raw(&raw)
            .unwrap()
            .recover_address_from_msg(digest.as_slice())
            .unwrap()
    }

    #[test]
    fn deployment_digest_is_pinned() {
        assert_eq!(
            deployment_digest(OWNER, POLYGON_SAFE_PROXY_FACTORY, SAFE),
            b256!("8838df5f61d51bfaf51392d21d6215c71b7daaa16c8cc6d939c76a31cbb6eba7")
        );
    }

    #[test]
    fn transaction_digest_is_pinned() {
        let target = ApprovalTarget::erc20("usdc", POLYGON_USDC, POLYGON_CTF_EXCHANGE);
        let data = approval_calldata(&target);
        assert_eq!(
            transaction_digest(SAFE, POLYGON_USDC, &data),
            b256!("dbe9a818c35fad064760e341329a3a0219efb994bcf98e0ce6bf9a85055f3a98")
        );
    }

    #[tokio::test]
    async fn deployment_signature_recovers_to_owner() {
        let builder = SafeTransactionBuilder::default();
        let signer = owner_signer();
        let signature = builder
            .create_deployment_signature(&signer, POLYGON_SAFE_PROXY_FACTORY, SAFE)
            .await
            .unwrap();

        let digest = deployment_digest(OWNER, POLYGON_SAFE_PROXY_FACTORY, SAFE);
        assert_eq!(recover(&signature, digest), OWNER);
    }

    #[tokio::test]
    async fn signatures_are_deterministic() {
        let builder = SafeTransactionBuilder::default();
        let signer = owner_signer();
        let first = builder
            .create_deployment_signature(&signer, POLYGON_SAFE_PROXY_FACTORY, SAFE)
            .await
            .unwrap();
        let second = builder
            .create_deployment_signature(&signer, POLYGON_SAFE_PROXY_FACTORY, SAFE)
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn build_transaction_fills_relay_request() {
        let builder = SafeTransactionBuilder::default();
        let signer = owner_signer();
        let data = [0xde, 0xad, 0xbe, 0xef];
        let request = builder
            .build_transaction(&signer, SAFE, POLYGON_USDC, &data)
            .await
            .unwrap();

        assert_eq!(request.from, OWNER.to_string());
        assert_eq!(request.to, POLYGON_USDC.to_string());
        assert_eq!(request.proxy_wallet, SAFE.to_string());
        assert_eq!(request.data, "0xdeadbeef");
        assert_eq!(
            recover(&request.signature, transaction_digest(SAFE, POLYGON_USDC, &data)),
            OWNER
        );
    }

    #[tokio::test]
    async fn relay_request_serializes_camel_case() {
        let builder = SafeTransactionBuilder::default();
        let request = builder
            .build_transaction(&owner_signer(), SAFE, POLYGON_USDC, &[])
            .await
            .unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("proxyWallet").is_some());
        assert_eq!(json["data"], "0x");
    }

    #[tokio::test]
    async fn deployment_targets_factory_for_predicted_safe() {
        let builder = SafeTransactionBuilder::default();
        let request = builder.build_deployment(&owner_signer()).await.unwrap();

        assert_eq!(request.to, POLYGON_SAFE_PROXY_FACTORY.to_string());
        assert_eq!(request.proxy_wallet, SAFE.to_string());
        assert!(request.data.starts_with("0x1688f0b9"));
        let digest = deployment_digest(OWNER, POLYGON_SAFE_PROXY_FACTORY, SAFE);
        assert_eq!(recover(&request.signature, digest), OWNER);
    }

    #[tokio::test]
    async fn approval_signatures_cover_every_target() {
        let builder = SafeTransactionBuilder::default();
        let approvals = polygon_trading_approvals();
        let signatures = builder
            .create_approval_signatures(&owner_signer(), SAFE, &approvals)
            .await
            .unwrap();

        assert_eq!(signatures.len(), approvals.len());
        for target in &approvals {
            let digest = transaction_digest(SAFE, target.token, &approval_calldata(target));
            assert_eq!(recover(&signatures[&target.name], digest), OWNER);
        }
    }

    #[tokio::test]
    async fn other_signer_does_not_recover_to_owner() {
        let builder = SafeTransactionBuilder::default();
        let other = PrivateKeySigner::random();
        let signature = builder
            .create_deployment_signature(&other, POLYGON_SAFE_PROXY_FACTORY, SAFE)
            .await
            .unwrap();
        let digest = deployment_digest(OWNER, POLYGON_SAFE_PROXY_FACTORY, SAFE);
        assert_ne!(recover(&signature, digest), OWNER);
    }
}
