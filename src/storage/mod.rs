// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Persistence Port
//!
//! The custody core only ever talks to storage through [`CustodyStore`].
//! Backends implement the trait independently; none of them share state.
//!
//! - [`InMemoryStore`] - process-local maps (tests, embedding)
//! - [`JsonFileStore`] - one JSON document per record on disk
//!
//! ## Stored Layout (file backend)
//!
//! ```text
//! {data_dir}/
//!   users/{user_id}.json        # UserRecord (private key encrypted)
//!   api_keys/{key_hash}.json    # ApiKeyRecord (hash + prefix only)
//! ```

pub mod file_store;
pub mod memory;
pub mod paths;

use std::io;

pub use file_store::JsonFileStore;
pub use memory::InMemoryStore;
pub use paths::StoragePaths;

use crate::models::{ApiKeyRecord, UserRecord};

/// Error type for storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations
    Io(io::Error),
    /// JSON serialization/deserialization error
    Json(serde_json::Error),
    /// Entity not found
    NotFound(String),
    /// Entity already exists
    AlreadyExists(String),
    /// Storage not initialized
    NotInitialized,
    /// A lock was poisoned by a panicking writer
    Poisoned,
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            StorageError::Json(e) => write!(f, "JSON error: {e}"),
            StorageError::NotFound(entity) => write!(f, "Not found: {entity}"),
            StorageError::AlreadyExists(entity) => write!(f, "Already exists: {entity}"),
            StorageError::NotInitialized => write!(f, "Storage not initialized"),
            StorageError::Poisoned => write!(f, "Storage lock poisoned"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            StorageError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(e.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Json(e)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Typed CRUD port for users and API keys.
pub trait CustodyStore: Send + Sync {
    /// Insert a new user. Fails with `AlreadyExists` on id or external id collision.
    fn create_user(&self, user: &UserRecord) -> StorageResult<()>;

    fn get_user(&self, id: &str) -> StorageResult<UserRecord>;

    fn get_user_by_external_id(&self, external_id: &str) -> StorageResult<UserRecord>;

    /// Replace an existing user. Fails with `NotFound` if absent.
    fn update_user(&self, user: &UserRecord) -> StorageResult<()>;

    /// Insert a new API key record, keyed by its hash.
    fn create_api_key(&self, record: &ApiKeyRecord) -> StorageResult<()>;

    fn get_api_key_by_hash(&self, key_hash: &str) -> StorageResult<ApiKeyRecord>;

    fn list_api_keys_for_user(&self, user_id: &str) -> StorageResult<Vec<ApiKeyRecord>>;

    /// Replace an existing API key record (e.g. after revocation).
    fn update_api_key(&self, record: &ApiKeyRecord) -> StorageResult<()>;
}

#[cfg(test)]
pub(crate) mod contract_tests {
    //! Behaviour every backend must share.

    use super::*;
    use crate::crypto::{generate_api_key, EncryptedBlob};
    use chrono::Utc;

    pub fn sample_user(external_id: &str) -> UserRecord {
        UserRecord::new(
            external_id,
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf",
            EncryptedBlob {
                ciphertext: "Y3Q=".into(),
                iv: "aXY=".into(),
                auth_tag: "dGFn".into(),
            },
        )
    }

    pub fn user_round_trip(store: &dyn CustodyStore) {
        let mut user = sample_user("ext-1");
        store.create_user(&user).unwrap();

        assert_eq!(store.get_user(&user.id).unwrap(), user);
        assert_eq!(store.get_user_by_external_id("ext-1").unwrap(), user);

        user.safe_address = Some("0xF431F8629D5d0c771F17369C1cc64Ee16e5147EB".into());
        store.update_user(&user).unwrap();
        assert_eq!(store.get_user(&user.id).unwrap().safe_address, user.safe_address);

        assert!(matches!(
            store.create_user(&user),
            Err(StorageError::AlreadyExists(_))
        ));
        assert!(matches!(store.get_user("missing"), Err(StorageError::NotFound(_))));
        assert!(matches!(
            store.get_user_by_external_id("missing"),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            store.update_user(&sample_user("ext-2")),
            Err(StorageError::NotFound(_))
        ));
    }

    pub fn api_key_round_trip(store: &dyn CustodyStore) {
        let generated = generate_api_key("qnt").unwrap();
        let mut record = ApiKeyRecord::issue("user-1", &generated, None);
        store.create_api_key(&record).unwrap();

        assert_eq!(store.get_api_key_by_hash(&generated.key_hash).unwrap(), record);
        assert!(matches!(
            store.create_api_key(&record),
            Err(StorageError::AlreadyExists(_))
        ));

        let other = ApiKeyRecord::issue("user-1", &generate_api_key("qnt").unwrap(), None);
        store.create_api_key(&other).unwrap();
        let unrelated = ApiKeyRecord::issue("user-2", &generate_api_key("qnt").unwrap(), None);
        store.create_api_key(&unrelated).unwrap();
        assert_eq!(store.list_api_keys_for_user("user-1").unwrap().len(), 2);

        record.revoke(Utc::now());
        store.update_api_key(&record).unwrap();
        assert!(!store.get_api_key_by_hash(&record.key_hash).unwrap().is_active());

        assert!(matches!(
            store.get_api_key_by_hash("0000"),
            Err(StorageError::NotFound(_))
        ));
    }
}
