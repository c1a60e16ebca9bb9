// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path utilities for the JSON file store layout.

use std::path::{Path, PathBuf};

/// Storage path utilities.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    /// Create paths rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all records.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== User Paths ==========

    /// Directory containing all users.
    pub fn users_dir(&self) -> PathBuf {
        self.root.join("users")
    }

    /// Path to a specific user record.
    pub fn user(&self, user_id: &str) -> PathBuf {
        self.users_dir().join(format!("{}.json", sanitize(user_id)))
    }

    // ========== API Key Paths ==========

    /// Directory containing all API key records.
    pub fn api_keys_dir(&self) -> PathBuf {
        self.root.join("api_keys")
    }

    /// Path to an API key record, addressed by key hash.
    pub fn api_key(&self, key_hash: &str) -> PathBuf {
        self.api_keys_dir().join(format!("{}.json", sanitize(key_hash)))
    }
}

/// Keep identifiers from escaping their directory.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
