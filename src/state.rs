// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::connectivity::{ConnectivityOracle, ReachabilityProbe};
use crate::error::{ApiError, LoginError};
use crate::models::Invoice;
use crate::payment::PaymentEngine;
use crate::resources::{Revalidator, StudentPortal};
use crate::session::{Session, SessionManager};
use crate::storage::{FileStore, KeyValueStore, LocalCache, StoragePaths};

/// Wiring for the whole client core. Cheap to clone; screens receive it
/// explicitly instead of reaching for globals.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ClientConfig>,
    pub session: Arc<SessionManager>,
    pub api: ApiClient,
    pub cache: Arc<LocalCache>,
    pub connectivity: Arc<dyn ConnectivityOracle>,
}

impl AppState {
    /// File-backed stores under `config.data_dir` and a reachability probe
    /// against the backend.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let paths = StoragePaths::new(&config.data_dir);
        let credentials = Arc::new(FileStore::new(paths.secure_dir()));
        let cache = Arc::new(FileStore::new(paths.cache_dir()));
        let probe = ReachabilityProbe::new(config.api_base_url.clone())
            .map_err(|e| ApiError::transport(format!("failed to build reachability probe: {e}")))?;
        Self::with_parts(config, credentials, cache, Arc::new(probe))
    }

    pub fn with_parts(
        config: ClientConfig,
        credential_store: Arc<dyn KeyValueStore>,
        cache_store: Arc<dyn KeyValueStore>,
        connectivity: Arc<dyn ConnectivityOracle>,
    ) -> Result<Self, ApiError> {
        let session = Arc::new(SessionManager::new(credential_store));
        let api = ApiClient::new(
            config.api_base_url.clone(),
            config.request_timeout,
            session.clone(),
        )?;
        let cache = Arc::new(LocalCache::with_freshness(cache_store, config.cache_freshness));

        Ok(Self {
            config: Arc::new(config),
            session,
            api,
            cache,
            connectivity,
        })
    }

    /// Process start: adopt a persisted session without network access.
    pub async fn restore(&self) -> Option<Session> {
        self.session.restore().await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, LoginError> {
        self.session.login(&self.api, email, password).await
    }

    pub async fn logout(&self) {
        self.session.logout().await;
    }

    pub fn portal(&self) -> StudentPortal {
        StudentPortal::new(
            self.api.clone(),
            Revalidator::new(self.cache.clone(), self.connectivity.clone()),
        )
    }

    /// A fresh engine for one payment sheet.
    pub fn payment_engine(&self, invoice: &Invoice) -> PaymentEngine {
        PaymentEngine::new(Arc::new(self.api.clone()), invoice, self.config.payment)
    }
}
