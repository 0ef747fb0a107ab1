// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Online/offline gate consulted before every network refresh.
//!
//! The answer is never cached: reachability can change between two calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait ConnectivityOracle: Send + Sync {
    async fn is_offline(&self) -> bool;
}

/// Reachability fed by the host platform's network callbacks.
#[derive(Debug, Default)]
pub struct ManualConnectivity {
    offline: AtomicBool,
}

impl ManualConnectivity {
    pub fn new(offline: bool) -> Self {
        Self {
            offline: AtomicBool::new(offline),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityOracle for ManualConnectivity {
    async fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }
}

/// Probes the backend with a short `HEAD`. Any HTTP status, even an error
/// status, proves the network path works.
#[derive(Debug, Clone)]
pub struct ReachabilityProbe {
    target: Url,
    http: Client,
}

impl ReachabilityProbe {
    pub fn new(target: Url) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(PROBE_TIMEOUT).build()?;
        Ok(Self { target, http })
    }
}

#[async_trait]
impl ConnectivityOracle for ReachabilityProbe {
    async fn is_offline(&self) -> bool {
        match self.http.head(self.target.clone()).send().await {
            Ok(_) => false,
            Err(e) => {
                debug!(target_url = %self.target, error = %e, "Reachability probe failed");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manual_connectivity_reflects_latest_value() {
        let oracle = ManualConnectivity::new(false);
        assert!(!oracle.is_offline().await);
        oracle.set_offline(true);
        assert!(oracle.is_offline().await);
        oracle.set_offline(false);
        assert!(!oracle.is_offline().await);
    }

    #[tokio::test]
    async fn probe_reports_offline_when_nothing_listens() {
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();
        let probe = ReachabilityProbe::new(url).unwrap();
        assert!(probe.is_offline().await);
    }
}
