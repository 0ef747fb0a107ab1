// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # KHQR Payment Confirmation
//!
//! A payment code is generated for one invoice in one currency, shown as a
//! scannable payload, and the settlement rail is polled until the invoice
//! reads as paid.
//!
//! ## Flow
//!
//! ```text
//! Idle -> Generating -> Ready -> Polling --paid--> Confirmed (auto-close after grace)
//!             |                    ^  \__ transient error: retry next tick
//!             +--error--> Failed --+ retry() / currency change
//! ```
//!
//! `Confirmed` and `Failed` are terminal for the running flow: nothing is
//! generated or polled again unless the user retries or switches currency
//! from `Failed`.

pub mod amount;
mod engine;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub use engine::{PaymentEngine, PaymentSnapshot, PaymentState, GENERATION_FAILED_MESSAGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Khr,
}

impl Currency {
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Khr => "\u{17DB}",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Currency::Usd => write!(f, "USD"),
            Currency::Khr => write!(f, "KHR"),
        }
    }
}

/// Input to code generation. `amount` is the invoice total in USD; the
/// backend applies the currency.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub invoice_id: String,
    pub amount: f64,
    pub currency: Currency,
}

/// Payment-code and settlement endpoints.
#[async_trait]
pub trait PaymentBackend: Send + Sync {
    async fn generate_code(&self, request: &PaymentRequest) -> Result<String, ApiError>;
    async fn is_paid(&self, invoice_id: &str) -> Result<bool, ApiError>;
}
