// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Stale-while-revalidate List Loading
//!
//! Every list screen follows the same sequence:
//!
//! 1. render whatever the [`LocalCache`] holds ([`Revalidator::cached`]);
//! 2. if the device is online, fetch through the gateway;
//! 3. on success, write the fresh list back and render it;
//! 4. on failure, keep showing the cached list and hand the error over so
//!    a 401 can still route the user to sign-in.
//!
//! Offline, the gateway is never touched.

use std::future::Future;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::connectivity::ConnectivityOracle;
use crate::error::ApiError;
use crate::models::{Announcement, Assignment, Course, CourseDetail, Invoice};
use crate::storage::{CachedValue, LocalCache};

pub const COURSES_KEY: &str = "courses";
pub const ASSIGNMENTS_KEY: &str = "assignments";
pub const INVOICES_KEY: &str = "invoices";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Network,
    Cache,
    /// Nothing cached and nothing fetched.
    Empty,
}

/// Result of one load. `data` is `None` only when the origin is `Empty`.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub data: Option<T>,
    pub origin: Origin,
    pub is_stale: bool,
    pub offline: bool,
    pub refresh_error: Option<ApiError>,
}

impl<T> Snapshot<T> {
    fn from_cache(cached: Option<CachedValue<T>>, offline: bool, refresh_error: Option<ApiError>) -> Self {
        match cached {
            Some(entry) => Self {
                data: Some(entry.value),
                origin: Origin::Cache,
                is_stale: entry.is_stale,
                offline,
                refresh_error,
            },
            None => Self {
                data: None,
                origin: Origin::Empty,
                is_stale: false,
                offline,
                refresh_error,
            },
        }
    }
}

#[derive(Clone)]
pub struct Revalidator {
    cache: Arc<LocalCache>,
    connectivity: Arc<dyn ConnectivityOracle>,
}

impl Revalidator {
    pub fn new(cache: Arc<LocalCache>, connectivity: Arc<dyn ConnectivityOracle>) -> Self {
        Self {
            cache,
            connectivity,
        }
    }

    /// Immediate read for the first render.
    pub async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<CachedValue<T>> {
        self.cache.read_entry(key).await
    }

    /// Cached data, refreshed from `fetch` when online.
    pub async fn load<T, F, Fut>(&self, key: &str, fetch: F) -> Snapshot<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let cached = self.cache.read_entry::<T>(key).await;

        if self.connectivity.is_offline().await {
            debug!(key = %key, "Offline, serving cached data");
            return Snapshot::from_cache(cached, true, None);
        }

        match fetch().await {
            Ok(fresh) => {
                self.cache.write(key, &fresh).await;
                Snapshot {
                    data: Some(fresh),
                    origin: Origin::Network,
                    is_stale: false,
                    offline: false,
                    refresh_error: None,
                }
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Refresh failed, keeping cached data");
                Snapshot::from_cache(cached, false, Some(e))
            }
        }
    }
}

/// The student-facing data screens.
#[derive(Clone)]
pub struct StudentPortal {
    api: ApiClient,
    revalidator: Revalidator,
}

impl StudentPortal {
    pub fn new(api: ApiClient, revalidator: Revalidator) -> Self {
        Self { api, revalidator }
    }

    pub fn revalidator(&self) -> &Revalidator {
        &self.revalidator
    }

    pub async fn courses(&self) -> Snapshot<Vec<Course>> {
        let student_id = self.student_id().await;
        self.revalidator
            .load(COURSES_KEY, || self.api.my_courses(student_id.as_deref()))
            .await
    }

    pub async fn assignments(&self) -> Snapshot<Vec<Assignment>> {
        let student_id = self.student_id().await;
        self.revalidator
            .load(ASSIGNMENTS_KEY, || self.api.my_assignments(student_id.as_deref()))
            .await
    }

    pub async fn invoices(&self) -> Snapshot<Vec<Invoice>> {
        self.revalidator
            .load(INVOICES_KEY, || self.api.invoices())
            .await
    }

    /// Detail views are not list screens and always hit the network.
    pub async fn course_detail(&self, course_id: &str) -> Result<CourseDetail, ApiError> {
        self.api.course(course_id).await
    }

    pub async fn announcements(&self, course_id: &str) -> Result<Vec<Announcement>, ApiError> {
        self.api.announcements(course_id).await
    }

    async fn student_id(&self) -> Option<String> {
        self.api.session().user().await.map(|u| u.id)
    }
}
