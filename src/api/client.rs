// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::ApiError;
use crate::session::SessionManager;

/// What a 401 means for a given request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnUnauthorized {
    /// The session token was rejected: clear it.
    Invalidate,
    /// The request itself carried credentials (login); leave the session alone.
    Propagate,
}

/// Outbound HTTP client for the school-management backend.
#[derive(Clone)]
pub struct ApiClient {
    base_url: Url,
    http: Client,
    session: Arc<SessionManager>,
}

impl ApiClient {
    pub fn new(base_url: Url, timeout: Duration, session: Arc<SessionManager>) -> Result<Self, ApiError> {
        if base_url.cannot_be_a_base() {
            return Err(ApiError::transport(format!(
                "API base URL cannot carry paths: {base_url}"
            )));
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            http,
            session,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = self.url(segments)?;
        let request = self.http.request(Method::GET, url).query(query);
        self.send(request, Method::GET, segments, OnUnauthorized::Invalidate)
            .await
    }

    pub(crate) async fn post_json<B, T>(
        &self,
        segments: &[&str],
        body: &B,
        on_unauthorized: OnUnauthorized,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(segments)?;
        let request = self.http.request(Method::POST, url).json(body);
        self.send(request, Method::POST, segments, on_unauthorized)
            .await
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::transport(format!("invalid API base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        method: Method,
        segments: &[&str],
        on_unauthorized: OnUnauthorized,
    ) -> Result<T, ApiError> {
        let path = format!("/{}", segments.join("/"));

        let mut request = request.header(header::ACCEPT, "application/json");
        let sent_token = self.session.token().await;
        if let Some(token) = &sent_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            warn!(method = %method, path = %path, error = %e, "Request failed before a response");
            if e.is_timeout() {
                ApiError::transport("Request timed out")
            } else {
                ApiError::transport("Network Error")
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::http(status.as_u16(), &body);
            warn!(
                method = %method,
                path = %path,
                status = status.as_u16(),
                error = %err,
                "Backend returned an error"
            );
            if err.is_unauthorized() && on_unauthorized == OnUnauthorized::Invalidate {
                if let Some(token) = &sent_token {
                    self.session.invalidate_if(token).await;
                }
            }
            return Err(err);
        }

        let bytes = response.bytes().await.map_err(|e| {
            warn!(method = %method, path = %path, error = %e, "Failed to read response body");
            ApiError::transport("Network Error")
        })?;

        debug!(method = %method, path = %path, status = status.as_u16(), "Request succeeded");

        serde_json::from_slice(&bytes).map_err(|e| {
            warn!(method = %method, path = %path, error = %e, "Response did not match schema");
            ApiError::invalid_response(format!("Unexpected response from {path}"))
        })
    }
}
