// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON file persistence backend.
//!
//! One pretty-printed JSON document per record, written atomically through a
//! temp file and rename. Secrets inside records are already vault-encrypted;
//! this module performs no cryptography of its own.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use super::{CustodyStore, StorageError, StoragePaths, StorageResult};
use crate::models::{ApiKeyRecord, UserRecord};

/// File-backed store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    paths: StoragePaths,
    initialized: bool,
}

impl JsonFileStore {
    /// Create a new store. Call `initialize()` before use.
    pub fn new(paths: StoragePaths) -> Self {
        Self {
            paths,
            initialized: false,
        }
    }

    /// Get the storage paths.
    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Create the directory structure. Safe to call multiple times.
    pub fn initialize(&mut self) -> StorageResult<()> {
        for dir in [self.paths.users_dir(), self.paths.api_keys_dir()] {
            fs::create_dir_all(&dir)?;
        }
        self.initialized = true;
        tracing::info!(root = %self.paths.root().display(), "file store initialized");
        Ok(())
    }

    /// Write-read-delete probe of the data directory.
    pub fn health_check(&self) -> StorageResult<()> {
        self.ensure_initialized()?;

        let probe = self.paths.root().join(".health_check");
        let data = b"health_check_data";
        fs::write(&probe, data)?;
        let read_back = fs::read(&probe)?;
        fs::remove_file(&probe)?;

        if read_back != data {
            return Err(StorageError::Io(std::io::Error::other(
                "health check data mismatch",
            )));
        }
        Ok(())
    }

    // ========== Generic JSON Operations ==========

    fn ensure_initialized(&self) -> StorageResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(StorageError::NotInitialized)
        }
    }

    fn read_json<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> StorageResult<T> {
        self.ensure_initialized()?;
        let file = File::open(path.as_ref())?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    fn write_json<T: Serialize>(&self, path: impl AsRef<Path>, value: &T) -> StorageResult<()> {
        self.ensure_initialized()?;
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;
        }

        fs::rename(&temp_path, path)?;
        Ok(())
    }

    fn exists(&self, path: impl AsRef<Path>) -> bool {
        File::open(path.as_ref()).is_ok()
    }

    /// Deserialize every `.json` document in `dir`.
    fn read_all<T: DeserializeOwned>(&self, dir: impl AsRef<Path>) -> StorageResult<Vec<T>> {
        self.ensure_initialized()?;
        let dir = dir.as_ref();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut values = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                values.push(self.read_json(&path)?);
            }
        }
        Ok(values)
    }
}

impl CustodyStore for JsonFileStore {
    fn create_user(&self, user: &UserRecord) -> StorageResult<()> {
        let path = self.paths.user(&user.id);
        if self.exists(&path) {
            return Err(StorageError::AlreadyExists(format!("User {}", user.id)));
        }
        match self.get_user_by_external_id(&user.external_id) {
            Ok(_) => {
                return Err(StorageError::AlreadyExists(format!(
                    "User with external id {}",
                    user.external_id
                )))
            }
            Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        self.write_json(path, user)
    }

    fn get_user(&self, id: &str) -> StorageResult<UserRecord> {
        let path = self.paths.user(id);
        if !self.exists(&path) {
            return Err(StorageError::NotFound(format!("User {id}")));
        }
        self.read_json(path)
    }

    fn get_user_by_external_id(&self, external_id: &str) -> StorageResult<UserRecord> {
        self.read_all::<UserRecord>(self.paths.users_dir())?
            .into_iter()
            .find(|u| u.external_id == external_id)
            .ok_or_else(|| StorageError::NotFound(format!("User with external id {external_id}")))
    }

    fn update_user(&self, user: &UserRecord) -> StorageResult<()> {
        let path = self.paths.user(&user.id);
        if !self.exists(&path) {
            return Err(StorageError::NotFound(format!("User {}", user.id)));
        }
        self.write_json(path, user)
    }

    fn create_api_key(&self, record: &ApiKeyRecord) -> StorageResult<()> {
        let path = self.paths.api_key(&record.key_hash);
        if self.exists(&path) {
            return Err(StorageError::AlreadyExists(format!("API key {}", record.key_prefix)));
        }
        self.write_json(path, record)
    }

    fn get_api_key_by_hash(&self, key_hash: &str) -> StorageResult<ApiKeyRecord> {
        let path = self.paths.api_key(key_hash);
        if !self.exists(&path) {
            return Err(StorageError::NotFound("API key".to_string()));
        }
        self.read_json(path)
    }

    fn list_api_keys_for_user(&self, user_id: &str) -> StorageResult<Vec<ApiKeyRecord>> {
        Ok(self
            .read_all::<ApiKeyRecord>(self.paths.api_keys_dir())?
            .into_iter()
            .filter(|k| k.user_id == user_id)
            .collect())
    }

    fn update_api_key(&self, record: &ApiKeyRecord) -> StorageResult<()> {
        let path = self.paths.api_key(&record.key_hash);
        if !self.exists(&path) {
            return Err(StorageError::NotFound("API key".to_string()));
        }
        self.write_json(path, record)
    }
}
