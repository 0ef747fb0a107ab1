// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Backend Data Models
//!
//! Response and request shapes for the school-management REST API. The
//! backend owns these contracts; every type ignores fields it does not know
//! so additive server changes never break parsing.
//!
//! ## Model Categories
//!
//! - **Auth**: login request/response and the signed-in [`User`]
//! - **Courses**: enrolled courses, course detail, announcements
//! - **Assignments**: coursework with submissions
//! - **Invoices**: billing with recorded payments
//! - **Payments**: KHQR code generation and settlement status

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::payment::Currency;

// =============================================================================
// Auth Models
// =============================================================================

/// The signed-in user as returned by `/auth/login` and persisted as `userData`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: String,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// First eight characters of the id, uppercased, as printed on the profile card.
    pub fn short_id(&self) -> String {
        short_upper(&self.id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Both fields are optional on the wire; the session layer rejects a
/// response missing either one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

// =============================================================================
// Course Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersonRef {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_by: Option<PersonRef>,
}

/// Course detail keeps unrecognized fields so screens can render whatever
/// the backend adds without a client release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetail {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_by: Option<PersonRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

// =============================================================================
// Assignment Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupRef>,
    #[serde(default)]
    pub submissions: Vec<Value>,
}

// =============================================================================
// Invoice Models
// =============================================================================

/// Invoice lifecycle as reported by the backend. Statuses this client does
/// not know are kept verbatim so they survive a cache round trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum InvoiceStatus {
    Paid,
    Sent,
    Overdue,
    Draft,
    Other(String),
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &str {
        match self {
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Sent => "SENT",
            InvoiceStatus::Overdue => "OVERDUE",
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for InvoiceStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "PAID" => InvoiceStatus::Paid,
            "SENT" => InvoiceStatus::Sent,
            "OVERDUE" => InvoiceStatus::Overdue,
            "DRAFT" => InvoiceStatus::Draft,
            _ => InvoiceStatus::Other(raw),
        }
    }
}

impl From<InvoiceStatus> for String {
    fn from(status: InvoiceStatus) -> Self {
        match status {
            InvoiceStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoicePayment {
    #[serde(deserialize_with = "decimal_amount")]
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    #[serde(deserialize_with = "decimal_amount")]
    pub total_amount: f64,
    pub status: InvoiceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub payments: Vec<InvoicePayment>,
}

impl Invoice {
    pub fn total_paid(&self) -> f64 {
        self.payments.iter().map(|p| p.amount).sum()
    }

    pub fn balance(&self) -> f64 {
        self.total_amount - self.total_paid()
    }

    /// Merchant-facing reference, e.g. `INV-3F4D6542`.
    pub fn reference(&self) -> String {
        format!("INV-{}", short_upper(&self.id))
    }
}

// =============================================================================
// Payment Models
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCodeRequest<'a> {
    pub amount: f64,
    pub currency: Currency,
    pub invoice_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCodeResponse {
    #[serde(default)]
    pub qr_string: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    #[serde(default)]
    pub is_paid: bool,
}

// =============================================================================
// Helpers
// =============================================================================

fn short_upper(id: &str) -> String {
    id.chars().take(8).collect::<String>().to_uppercase()
}

/// Decimal columns arrive either as JSON numbers or as strings like `"100.00"`.
fn decimal_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid decimal amount {s:?}"))),
    }
}
