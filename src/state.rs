// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use zeroize::Zeroizing;

use crate::config::CoreConfig;
use crate::crypto::{request_signing::DEFAULT_WINDOW, KeyVault};
use crate::error::CoreError;
use crate::storage::{CustodyStore, InMemoryStore, JsonFileStore, StoragePaths};

/// Shared state for the authentication boundary.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CustodyStore>,
    pub vault: Arc<KeyVault>,
    /// HMAC signature validity window
    pub signature_window: Duration,
}

impl AppState {
    pub fn new(store: Arc<dyn CustodyStore>, vault: Arc<KeyVault>) -> Self {
        Self {
            store,
            vault,
            signature_window: DEFAULT_WINDOW,
        }
    }

    pub fn with_signature_window(mut self, window: Duration) -> Self {
        self.signature_window = window;
        self
    }

    /// Build the vault and file store described by `config`.
    ///
    /// The master key literal is dropped (and zeroized) before returning.
    pub fn from_config(config: &CoreConfig, master_key: Zeroizing<String>) -> Result<Self, CoreError> {
        let vault = KeyVault::new(&master_key)?;
        drop(master_key);

        let mut store = JsonFileStore::new(StoragePaths::new(&config.data_dir));
        store.initialize()?;

        Ok(Self::new(Arc::new(store), Arc::new(vault))
            .with_signature_window(config.signature_window))
    }

    /// In-memory state around an existing vault.
    pub fn in_memory(vault: KeyVault) -> Self {
        Self::new(Arc::new(InMemoryStore::new()), Arc::new(vault))
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("signature_window", &self.signature_window)
            .finish_non_exhaustive()
    }
}
