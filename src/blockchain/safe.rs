// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Counterfactual Safe address prediction.
//!
//! Reproduces `GnosisSafeProxyFactory.createProxyWithNonce` (Safe v1.3.0):
//!
//! ```text
//! initializer = setup([owner], 1, 0x0, "", 0x0, 0x0, 0, 0x0)
//! salt        = keccak256(keccak256(initializer) ++ uint256(saltNonce = 0))
//! initCode    = proxyCreationCode ++ uint256(uint160(singleton))
//! address     = keccak256(0xff ++ factory ++ salt ++ keccak256(initCode))[12..]
//! ```
//!
//! The proxy creation code below is the exact `type(GnosisSafeProxy).creationCode`
//! of the v1.3.0 factory. A wrong byte here predicts an address nobody can
//! ever deploy to, so the pinned vectors in the tests must not be regenerated
//! from this implementation.

use alloy::primitives::{hex, keccak256, Address, B256};

use super::contracts::single_owner_setup_calldata;
use super::types::SafeContracts;

/// `GnosisSafeProxy` creation bytecode (Safe v1.3.0, solc 0.7.6).
pub const SAFE_PROXY_CREATION_CODE: &[u8] = &hex!(
    "608060405234801561001057600080fd5b506040516101e63803806101e68339818101604052602081101561003357600080fd5b8101908080519060200190929190505050600073ffffffffffffffffffffffffffffffffffffffff168173ffffffffffffffffffffffffffffffffffffffff1614156100ca576040517f08c379a00000000000000000000000000000000000000000000000000000000081526004018080602001828103825260228152602001806101c46022913960400191505060405180910390fd5b806000806101000a81548173ffffffffffffffffffffffffffffffffffffffff021916908373ffffffffffffffffffffffffffffffffffffffff1602179055505060ab806101196000396000f3fe608060405273ffffffffffffffffffffffffffffffffffffffff600054167fa619486e0000000000000000000000000000000000000000000000000000000060003514156050578060005260206000f35b3660008037600080366000845af43d6000803e60008114156070573d6000fd5b3d6000f3fea2646970667358221220d1429297349653a4918076d650332de1a1068c5f3e07c5c82360c277770b955264736f6c63430007060033496e76616c69642073696e676c65746f6e20616464726573732070726f7669646564"
);

/// Salt nonce used for every deployment.
pub const SALT_NONCE: u64 = 0;

/// Predict the address `proxy_factory` will deploy the owner's Safe at.
///
/// Pure and deterministic: no I/O, no clock, no randomness.
pub fn predict_address(owner: Address, proxy_factory: Address, singleton: Address) -> Address {
    let initializer = single_owner_setup_calldata(owner);

    let mut salt_preimage = [0u8; 64];
    salt_preimage[..32].copy_from_slice(keccak256(&initializer).as_slice());
    salt_preimage[56..].copy_from_slice(&SALT_NONCE.to_be_bytes());
    let salt = keccak256(salt_preimage);

    proxy_factory.create2(salt, init_code_hash(singleton))
}

/// keccak256 of the proxy init code for `singleton`.
pub fn init_code_hash(singleton: Address) -> B256 {
    let mut init_code = Vec::with_capacity(SAFE_PROXY_CREATION_CODE.len() + 32);
    init_code.extend_from_slice(SAFE_PROXY_CREATION_CODE);
    init_code.extend_from_slice(singleton.into_word().as_slice());
    keccak256(&init_code)
}

/// Address predictor bound to one factory/singleton pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafeAddressDeriver {
    contracts: SafeContracts,
}

impl SafeAddressDeriver {
    pub fn new(contracts: SafeContracts) -> Self {
        Self { contracts }
    }

    pub fn contracts(&self) -> &SafeContracts {
        &self.contracts
    }

    /// Predicted Safe address for `owner`.
    pub fn predict(&self, owner: Address) -> Address {
        predict_address(owner, self.contracts.proxy_factory, self.contracts.singleton)
    }
}
