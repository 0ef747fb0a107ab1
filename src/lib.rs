// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! STEP Mobile Core - offline-first client runtime
//!
//! The runtime mechanisms shared by every screen of the STEP school app.
//! Screens are thin presentation glue over these modules.
//!
//! ## Modules
//!
//! - `api` - Network gateway (bearer auth, 401 handling, typed endpoints)
//! - `session` - Credential lifecycle (restore, login, logout, invalidation)
//! - `storage` - Credential store and timestamped local cache
//! - `connectivity` - Online/offline gate
//! - `resources` - Stale-while-revalidate list loading
//! - `payment` - KHQR code generation and settlement polling
//! - `state` - Explicit wiring of all of the above

pub mod api;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod logging;
pub mod models;
pub mod payment;
pub mod resources;
pub mod session;
pub mod state;
pub mod storage;

pub use api::ApiClient;
pub use config::{ClientConfig, PaymentSettings};
pub use error::{ApiError, LoginError};
pub use state::AppState;
