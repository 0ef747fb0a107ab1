// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Network Gateway
//!
//! Every backend call goes through [`ApiClient`]:
//!
//! - the current session token is attached as `Authorization: Bearer ...`;
//! - requests time out after the configured duration (60 s by default);
//! - an HTTP 401 invalidates the session that sent the rejected token (a
//!   newer login is left alone) and is still returned to the caller, which
//!   decides where to navigate;
//! - responses are parsed into explicit schemas, and every failure becomes an
//!   [`ApiError`](crate::error::ApiError).
//!
//! ## Endpoints
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | POST | `/auth/login` | Email/password sign in |
//! | GET | `/students/my-courses` | Enrolled courses |
//! | GET | `/students/my-assignments` | Assignments |
//! | GET | `/financial/invoices` | Invoices |
//! | GET | `/courses/{id}` | Course detail |
//! | GET | `/announcements` | Course announcements |
//! | POST | `/financial/bakong-qr` | Generate KHQR payment code |
//! | GET | `/financial/bakong-status/{invoiceId}` | Settlement status |

mod client;
mod endpoints;

pub use client::ApiClient;
