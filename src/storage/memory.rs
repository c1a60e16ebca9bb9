// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory persistence backend.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{CustodyStore, StorageError, StorageResult};
use crate::models::{ApiKeyRecord, UserRecord};

#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<String, UserRecord>>,
    api_keys: RwLock<HashMap<String, ApiKeyRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CustodyStore for InMemoryStore {
    fn create_user(&self, user: &UserRecord) -> StorageResult<()> {
        let mut users = self.users.write().map_err(|_| StorageError::Poisoned)?;
        if users.contains_key(&user.id)
            || users.values().any(|u| u.external_id == user.external_id)
        {
            return Err(StorageError::AlreadyExists(format!("User {}", user.id)));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    fn get_user(&self, id: &str) -> StorageResult<UserRecord> {
        self.users
            .read()
            .map_err(|_| StorageError::Poisoned)?
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("User {id}")))
    }

    fn get_user_by_external_id(&self, external_id: &str) -> StorageResult<UserRecord> {
        self.users
            .read()
            .map_err(|_| StorageError::Poisoned)?
            .values()
            .find(|u| u.external_id == external_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("User with external id {external_id}")))
    }

    fn update_user(&self, user: &UserRecord) -> StorageResult<()> {
        let mut users = self.users.write().map_err(|_| StorageError::Poisoned)?;
        match users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound(format!("User {}", user.id))),
        }
    }

    fn create_api_key(&self, record: &ApiKeyRecord) -> StorageResult<()> {
        let mut keys = self.api_keys.write().map_err(|_| StorageError::Poisoned)?;
        if keys.contains_key(&record.key_hash) {
            return Err(StorageError::AlreadyExists(format!("API key {}", record.key_prefix)));
        }
        keys.insert(record.key_hash.clone(), record.clone());
        Ok(())
    }

    fn get_api_key_by_hash(&self, key_hash: &str) -> StorageResult<ApiKeyRecord> {
        self.api_keys
            .read()
            .map_err(|_| StorageError::Poisoned)?
            .get(key_hash)
            .cloned()
            .ok_or_else(|| StorageError::NotFound("API key".to_string()))
    }

    fn list_api_keys_for_user(&self, user_id: &str) -> StorageResult<Vec<ApiKeyRecord>> {
        Ok(self
            .api_keys
            .read()
            .map_err(|_| StorageError::Poisoned)?
            .values()
            .filter(|k| k.user_id == user_id)
            .cloned()
            .collect())
    }

    fn update_api_key(&self, record: &ApiKeyRecord) -> StorageResult<()> {
        let mut keys = self.api_keys.write().map_err(|_| StorageError::Poisoned)?;
        match keys.get_mut(&record.key_hash) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound("API key".to_string())),
        }
    }
}
