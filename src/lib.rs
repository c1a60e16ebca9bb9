// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Quantish Core - Key Custody, Request Authentication and Safe Wallets
//!
//! This crate holds the cryptographic core of a self-hosted, non-custodial
//! trading backend: user secrets are encrypted at rest under a single master
//! key, API callers authenticate with HMAC-signed requests, and every user
//! owns a Safe smart-contract wallet whose address is predicted with CREATE2
//! and deployed through a gasless relayer.
//!
//! ## Modules
//!
//! - `crypto` - Key vault, HMAC request signing, API key issuance
//! - `auth` - Authentication boundary helpers (header verification)
//! - `blockchain` - Safe address derivation, meta-transactions, chain queries
//! - `relayer` - Gasless relay HTTP client
//! - `setup` - Wallet setup state machine
//! - `storage` - Typed persistence port and backends

pub mod auth;
pub mod blockchain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod models;
pub mod relayer;
pub mod setup;
pub mod state;
pub mod storage;
pub mod telemetry;

pub use error::CoreError;
