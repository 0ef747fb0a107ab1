// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Lifecycle
//!
//! The session is a token plus the signed-in [`User`], persisted together in
//! the credential store and mirrored in memory by [`SessionManager`].
//!
//! ## State Machine
//!
//! ```text
//! LoggedOut --login()--> LoggingIn --ok--> LoggedIn
//!                            |                 |
//!                            +--error--> LoggedOut <--logout() / force_invalidate()
//! ```
//!
//! ## Invariants
//!
//! - `authToken` and `userData` are written and cleared as a pair; a store
//!   holding only one of them is repaired to empty on [`SessionManager::restore`].
//! - Commits (`login`, `logout`, `force_invalidate`) are serialized.
//! - A failed login leaves any previous session untouched.
//! - Only [`SessionManager`] mutates the session. The gateway reads the
//!   token and requests invalidation through the same API.

mod manager;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::LoginResponse;
pub use crate::models::User;

pub use manager::{SessionManager, TOKEN_KEY, USER_KEY};

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    LoggedOut,
    LoggingIn,
    LoggedIn,
}

/// The authentication endpoint, abstracted so the session layer can be
/// exercised without HTTP.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn authenticate(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError>;
}
