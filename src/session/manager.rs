// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio::sync::{watch, Mutex, RwLock};
use tracing::{info, warn};

use super::{AuthBackend, Session, SessionStatus};
use crate::error::LoginError;
use crate::models::User;
use crate::storage::KeyValueStore;

/// Credential store key for the bearer token.
pub const TOKEN_KEY: &str = "authToken";

/// Credential store key for the serialized user.
pub const USER_KEY: &str = "userData";

pub struct SessionManager {
    store: Arc<dyn KeyValueStore>,
    current: RwLock<Option<Session>>,
    commit: Mutex<()>,
    status: watch::Sender<SessionStatus>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let (status, _) = watch::channel(SessionStatus::LoggedOut);
        Self {
            store,
            current: RwLock::new(None),
            commit: Mutex::new(()),
            status,
        }
    }

    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    pub async fn token(&self) -> Option<String> {
        self.current.read().await.as_ref().map(|s| s.token.clone())
    }

    pub async fn user(&self) -> Option<User> {
        self.current.read().await.as_ref().map(|s| s.user.clone())
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Status updates, including invalidations triggered by the gateway.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Load a persisted session without touching the network.
    pub async fn restore(&self) -> Option<Session> {
        let _guard = self.commit.lock().await;

        let token = self.store.get(TOKEN_KEY).await;
        let user = self.store.get(USER_KEY).await;

        let restored = match (token, user) {
            (Ok(token), Ok(user)) => {
                let token = token.filter(|t| !t.trim().is_empty());
                match (token, user) {
                    (Some(token), Some(raw_user)) => match serde_json::from_str::<User>(&raw_user) {
                        Ok(user) => Some(Session { token, user }),
                        Err(e) => {
                            warn!(error = %e, "Persisted user is unreadable, clearing credentials");
                            self.clear_persisted().await;
                            None
                        }
                    },
                    (None, None) => None,
                    _ => {
                        warn!("Found half-persisted session, clearing credentials");
                        self.clear_persisted().await;
                        None
                    }
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Error checking auth status");
                None
            }
        };

        *self.current.write().await = restored.clone();
        self.publish(restored.is_some());
        if let Some(session) = &restored {
            info!(user_id = %session.user.id, "Restored persisted session");
        }
        restored
    }

    /// Authenticate and, on success, persist and adopt the new session.
    ///
    /// Any failure leaves the previous session (if any) in place.
    pub async fn login<B>(&self, backend: &B, email: &str, password: &str) -> Result<Session, LoginError>
    where
        B: AuthBackend + ?Sized,
    {
        if self.current.read().await.is_none() {
            self.status.send_replace(SessionStatus::LoggingIn);
        }

        let response = match backend.authenticate(email, password).await {
            Ok(response) => response,
            Err(e) => {
                warn!(http_status = ?e.http_status, error = %e, "Login request failed");
                self.settle().await;
                return Err(e.into());
            }
        };

        let token = response.token.filter(|t| !t.trim().is_empty());
        let (Some(token), Some(user)) = (token, response.user) else {
            warn!("Login response missing token or user");
            self.settle().await;
            return Err(LoginError::invalid_response());
        };

        let session = Session { token, user };

        let _guard = self.commit.lock().await;
        self.persist(&session).await;
        *self.current.write().await = Some(session.clone());
        self.publish(true);

        info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    /// User-initiated sign out.
    pub async fn logout(&self) {
        self.clear("logout").await;
    }

    /// Server rejected the credential (HTTP 401). Requests already in flight
    /// are left to fail on their own.
    pub async fn force_invalidate(&self) {
        self.clear("unauthorized").await;
    }

    /// Invalidate only if the session still carries `token`. Returns `false`
    /// when a newer login already replaced it.
    pub async fn invalidate_if(&self, token: &str) -> bool {
        let _guard = self.commit.lock().await;
        let matches = self
            .current
            .read()
            .await
            .as_ref()
            .is_some_and(|s| s.token == token);
        if !matches {
            info!("Ignoring 401 for a superseded credential");
            return false;
        }
        self.clear_locked("unauthorized").await;
        true
    }

    async fn clear(&self, reason: &'static str) {
        let _guard = self.commit.lock().await;
        self.clear_locked(reason).await;
    }

    /// Caller holds the commit lock.
    async fn clear_locked(&self, reason: &'static str) {
        let previous = self.current.write().await.take();
        self.publish(false);
        self.clear_persisted().await;

        if let Some(session) = previous {
            info!(user_id = %session.user.id, reason, "Session cleared");
        }
    }

    /// Write token then user. If the user cannot be written the token is
    /// removed again so the store never holds half a session.
    async fn persist(&self, session: &Session) {
        let raw_user = match serde_json::to_string(&session.user) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Failed to serialize user, session kept in memory only");
                return;
            }
        };

        if let Err(e) = self.store.set(TOKEN_KEY, &session.token).await {
            warn!(error = %e, "Failed to persist auth token, session kept in memory only");
            return;
        }

        if let Err(e) = self.store.set(USER_KEY, &raw_user).await {
            warn!(error = %e, "Failed to persist user, rolling back auth token");
            if let Err(e) = self.store.delete(TOKEN_KEY).await {
                warn!(error = %e, "Failed to roll back auth token");
            }
        }
    }

    async fn clear_persisted(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.store.delete(key).await {
                warn!(key, error = %e, "Failed to delete credential");
            }
        }
    }

    async fn settle(&self) {
        let logged_in = self.current.read().await.is_some();
        self.publish(logged_in);
    }

    fn publish(&self, logged_in: bool) {
        let status = if logged_in {
            SessionStatus::LoggedIn
        } else {
            SessionStatus::LoggedOut
        };
        self.status.send_replace(status);
    }
}
