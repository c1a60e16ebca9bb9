// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Solidity interfaces used to build Safe calldata.

use alloy::{
    primitives::{Address, Bytes, U256},
    sol,
    sol_types::SolCall,
};

use super::types::{ApprovalKind, ApprovalTarget};

sol! {
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
    }

    interface IERC1155 {
        function setApprovalForAll(address operator, bool approved) external;
    }

    interface IGnosisSafe {
        function setup(
            address[] _owners,
            uint256 _threshold,
            address to,
            bytes data,
            address fallbackHandler,
            address paymentToken,
            uint256 payment,
            address paymentReceiver
        ) external;
    }

    interface IGnosisSafeProxyFactory {
        function createProxyWithNonce(
            address _singleton,
            bytes initializer,
            uint256 saltNonce
        ) external returns (address proxy);
    }
}

/// `setup` calldata for a single-owner, threshold-1 Safe with every optional
/// parameter zeroed.
pub fn single_owner_setup_calldata(owner: Address) -> Vec<u8> {
    IGnosisSafe::setupCall {
        _owners: vec![owner],
        _threshold: U256::from(1),
        to: Address::ZERO,
        data: Bytes::new(),
        fallbackHandler: Address::ZERO,
        paymentToken: Address::ZERO,
        payment: U256::ZERO,
        paymentReceiver: Address::ZERO,
    }
    .abi_encode()
}

/// Factory calldata deploying the single-owner Safe with salt nonce 0.
pub fn create_proxy_calldata(owner: Address, singleton: Address) -> Vec<u8> {
    IGnosisSafeProxyFactory::createProxyWithNonceCall {
        _singleton: singleton,
        initializer: single_owner_setup_calldata(owner).into(),
        saltNonce: U256::ZERO,
    }
    .abi_encode()
}

/// Calldata granting `target.spender` an unlimited allowance on `target.token`.
pub fn approval_calldata(target: &ApprovalTarget) -> Vec<u8> {
    match target.kind {
        ApprovalKind::Erc20Approve => IERC20::approveCall {
            spender: target.spender,
            amount: U256::MAX,
        }
        .abi_encode(),
        ApprovalKind::Erc1155ApproveAll => IERC1155::setApprovalForAllCall {
            operator: target.spender,
            approved: true,
        }
        .abi_encode(),
    }
}
