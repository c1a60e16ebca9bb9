// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain integration module for Safe wallets on Polygon.
//!
//! This module provides functionality for:
//! - Predicting counterfactual Safe addresses (CREATE2)
//! - Generating and unlocking owner keys
//! - Building and signing relay payloads (deployment, approvals, calls)
//! - Checking whether a Safe has been deployed

pub mod client;
pub mod contracts;
pub mod safe;
pub mod signing;
pub mod transactions;
pub mod types;

pub use client::{ChainClient, ChainQuery, ChainQueryError};
pub use safe::{predict_address, SafeAddressDeriver};
pub use signing::{generate_owner_key, signer_from_blob, OwnerKey, SigningError};
pub use transactions::{BuildError, RelayRequest, SafeTransactionBuilder};
pub use types::*;
