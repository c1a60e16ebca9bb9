// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the crate. Configuration is loaded from the environment once
//! at startup by the embedding service.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `QUANTISH_MASTER_KEY` | 32-byte master key (64 hex chars or 44 base64 chars) | Required |
//! | `SIGNATURE_WINDOW_SECS` | HMAC request validity window | `30` |
//! | `RELAYER_URL` | Base URL of the gasless relayer | Required for relaying |
//! | `RELAYER_TIMEOUT_MS` | Relay request timeout | `30000` |
//! | `CHAIN_RPC_URL` | JSON-RPC endpoint used for deployment checks | Polygon public RPC |
//! | `SAFE_PROXY_FACTORY` | Safe proxy factory address | Polygon Safe v1.3.0 |
//! | `SAFE_SINGLETON` | Safe singleton address | Polygon `GnosisSafeL2` v1.3.0 |
//! | `API_KEY_PREFIX` | Prefix for issued API keys | `qnt` |
//! | `DATA_DIR` | Root directory for the JSON file store | `./data` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::Address;
use zeroize::Zeroizing;

use crate::blockchain::types::{SafeContracts, POLYGON};
use crate::telemetry::LogFormat;

/// Environment variable holding the master key literal.
///
/// The value is consumed once to build a [`crate::crypto::KeyVault`] and is
/// never kept in [`CoreConfig`].
pub const MASTER_KEY_ENV: &str = "QUANTISH_MASTER_KEY";

pub const SIGNATURE_WINDOW_ENV: &str = "SIGNATURE_WINDOW_SECS";
pub const RELAYER_URL_ENV: &str = "RELAYER_URL";
pub const RELAYER_TIMEOUT_ENV: &str = "RELAYER_TIMEOUT_MS";
pub const CHAIN_RPC_URL_ENV: &str = "CHAIN_RPC_URL";
pub const SAFE_PROXY_FACTORY_ENV: &str = "SAFE_PROXY_FACTORY";
pub const SAFE_SINGLETON_ENV: &str = "SAFE_SINGLETON";
pub const API_KEY_PREFIX_ENV: &str = "API_KEY_PREFIX";
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Default HMAC validity window in seconds.
pub const DEFAULT_SIGNATURE_WINDOW_SECS: u64 = 30;

/// Default relay request timeout in milliseconds.
pub const DEFAULT_RELAYER_TIMEOUT_MS: u64 = 30_000;

/// Default API key prefix.
pub const DEFAULT_API_KEY_PREFIX: &str = "qnt";

/// Default data directory for the JSON file store.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Settings for the custody core.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// HMAC validity window.
    pub signature_window: Duration,
    /// Relayer base URL (`{relayer_url}/relay` receives submissions).
    pub relayer_url: Option<String>,
    /// Relay request timeout.
    pub relayer_timeout: Duration,
    /// JSON-RPC endpoint for `eth_getCode`.
    pub rpc_url: String,
    /// Factory and singleton used for address prediction.
    pub contracts: SafeContracts,
    /// Prefix for issued API keys.
    pub api_key_prefix: String,
    /// JSON file store root.
    pub data_dir: PathBuf,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            signature_window: Duration::from_secs(DEFAULT_SIGNATURE_WINDOW_SECS),
            relayer_url: None,
            relayer_timeout: Duration::from_millis(DEFAULT_RELAYER_TIMEOUT_MS),
            rpc_url: POLYGON.rpc_url.to_string(),
            contracts: SafeContracts::polygon(),
            api_key_prefix: DEFAULT_API_KEY_PREFIX.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            log_format: LogFormat::Pretty,
        }
    }
}

impl CoreConfig {
    /// Load configuration and the master key literal from the process environment.
    pub fn from_env() -> Result<(Self, Zeroizing<String>), ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an injected variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<(Self, Zeroizing<String>), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let master_key = lookup(MASTER_KEY_ENV)
            .map(Zeroizing::new)
            .ok_or(ConfigError::Missing(MASTER_KEY_ENV))?;

        let defaults = Self::default();

        let signature_window = match lookup(SIGNATURE_WINDOW_ENV) {
            Some(raw) => Duration::from_secs(parse_number(SIGNATURE_WINDOW_ENV, &raw)?),
            None => defaults.signature_window,
        };

        let relayer_timeout = match lookup(RELAYER_TIMEOUT_ENV) {
            Some(raw) => Duration::from_millis(parse_number(RELAYER_TIMEOUT_ENV, &raw)?),
            None => defaults.relayer_timeout,
        };

        let relayer_url = lookup(RELAYER_URL_ENV)
            .map(|raw| {
                url::Url::parse(&raw).map_err(|e| ConfigError::Invalid {
                    name: RELAYER_URL_ENV,
                    reason: e.to_string(),
                })?;
                Ok(raw.trim_end_matches('/').to_string())
            })
            .transpose()?;

        let mut contracts = defaults.contracts;
        if let Some(raw) = lookup(SAFE_PROXY_FACTORY_ENV) {
            contracts.proxy_factory = parse_address(SAFE_PROXY_FACTORY_ENV, &raw)?;
        }
        if let Some(raw) = lookup(SAFE_SINGLETON_ENV) {
            contracts.singleton = parse_address(SAFE_SINGLETON_ENV, &raw)?;
        }

        let log_format = match lookup(LOG_FORMAT_ENV) {
            Some(raw) => raw.parse::<LogFormat>().map_err(|reason| ConfigError::Invalid {
                name: LOG_FORMAT_ENV,
                reason,
            })?,
            None => defaults.log_format,
        };

        let config = Self {
            signature_window,
            relayer_url,
            relayer_timeout,
            rpc_url: lookup(CHAIN_RPC_URL_ENV).unwrap_or(defaults.rpc_url),
            contracts,
            api_key_prefix: lookup(API_KEY_PREFIX_ENV).unwrap_or(defaults.api_key_prefix),
            data_dir: lookup(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            log_format,
        };

        Ok((config, master_key))
    }
}

fn parse_number(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn parse_address(name: &'static str, raw: &str) -> Result<Address, ConfigError> {
    raw.trim().parse::<Address>().map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn master_key_is_required() {
        let result = CoreConfig::from_lookup(lookup_from(&[]));
        assert!(matches!(result, Err(ConfigError::Missing(MASTER_KEY_ENV))));
    }

    #[test]
    fn defaults_apply_when_unset() {
        let (config, key) =
            CoreConfig::from_lookup(lookup_from(&[(MASTER_KEY_ENV, "abc")])).unwrap();
        assert_eq!(key.as_str(), "abc");
        assert_eq!(config.signature_window, Duration::from_secs(30));
        assert_eq!(config.relayer_timeout, Duration::from_millis(30_000));
        assert_eq!(config.api_key_prefix, "qnt");
        assert_eq!(config.contracts, SafeContracts::polygon());
        assert!(config.relayer_url.is_none());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn overrides_are_parsed() {
        let (config, _) = CoreConfig::from_lookup(lookup_from(&[
            (MASTER_KEY_ENV, "abc"),
            (SIGNATURE_WINDOW_ENV, "60"),
            (RELAYER_URL_ENV, "https://relayer.example.com/"),
            (RELAYER_TIMEOUT_ENV, "5000"),
            (SAFE_SINGLETON_ENV, "0xd9Db270c1B5E3Bd161E8c8503c55cEABeE709552"),
            (LOG_FORMAT_ENV, "json"),
        ]))
        .unwrap();

        assert_eq!(config.signature_window, Duration::from_secs(60));
        assert_eq!(
            config.relayer_url.as_deref(),
            Some("https://relayer.example.com")
        );
        assert_eq!(config.relayer_timeout, Duration::from_millis(5000));
        assert_eq!(
            config.contracts.singleton,
            "0xd9Db270c1B5E3Bd161E8c8503c55cEABeE709552"
                .parse::<Address>()
                .unwrap()
        );
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let result = CoreConfig::from_lookup(lookup_from(&[
            (MASTER_KEY_ENV, "abc"),
            (RELAYER_TIMEOUT_ENV, "soon"),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { name: RELAYER_TIMEOUT_ENV, .. })
        ));

        let result = CoreConfig::from_lookup(lookup_from(&[
            (MASTER_KEY_ENV, "abc"),
            (SAFE_PROXY_FACTORY_ENV, "0x1234"),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { name: SAFE_PROXY_FACTORY_ENV, .. })
        ));
    }
}
