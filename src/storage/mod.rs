// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # On-device Storage
//!
//! Two stores share the [`KeyValueStore`] interface:
//!
//! - the **credential store** (`<root>/secure/`), holding exactly `authToken`
//!   and `userData`;
//! - the **local cache** (`<root>/cache/`), one `step_mobile_cache_<key>`
//!   entry per list screen.
//!
//! Storage errors never reach the UI. Callers log them and carry on.

pub mod local_cache;
pub mod paths;
pub mod secure_store;

pub use local_cache::{CachedValue, LocalCache, CACHE_PREFIX};
pub use paths::StoragePaths;
pub use secure_store::{FileStore, KeyValueStore, MemoryStore, StorageError, StorageResult};
