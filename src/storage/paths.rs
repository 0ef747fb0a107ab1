// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path layout for on-device storage.
//!
//! ```text
//! <root>/
//!   secure/   # credential store (authToken, userData)
//!   cache/    # list snapshots (step_mobile_cache_<key>)
//! ```

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory backing the credential store.
    pub fn secure_dir(&self) -> PathBuf {
        self.root.join("secure")
    }

    /// Directory backing the local list cache.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }
}
