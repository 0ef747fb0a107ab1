// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup and passed
//! down explicitly; nothing below reads the environment again.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `STEP_API_URL` | Backend base URL | `http://localhost:5001/api` |
//! | `STEP_DATA_DIR` | Root for credential and cache storage | `./step-data` |
//! | `STEP_REQUEST_TIMEOUT_SECS` | Gateway request timeout | `60` |
//! | `STEP_KHR_PER_USD` | Fixed USD to KHR conversion rate | `4100` |
//! | `STEP_PAYMENT_POLL_SECS` | Settlement status poll interval | `3` |
//! | `STEP_PAYMENT_AUTO_CLOSE_SECS` | Delay before a confirmed payment closes | `3` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::logging::LogFormat;

pub const API_URL_ENV: &str = "STEP_API_URL";
pub const DATA_DIR_ENV: &str = "STEP_DATA_DIR";
pub const REQUEST_TIMEOUT_ENV: &str = "STEP_REQUEST_TIMEOUT_SECS";
pub const KHR_RATE_ENV: &str = "STEP_KHR_PER_USD";
pub const POLL_INTERVAL_ENV: &str = "STEP_PAYMENT_POLL_SECS";
pub const AUTO_CLOSE_ENV: &str = "STEP_PAYMENT_AUTO_CLOSE_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_API_URL: &str = "http://localhost:5001/api";
const DEFAULT_DATA_DIR: &str = "./step-data";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Cached list data older than this is flagged stale (but still served).
pub const DEFAULT_CACHE_FRESHNESS: Duration = Duration::from_secs(24 * 60 * 60);

/// Fixed KHR per USD rate. This drifts from the market rate; deployments
/// should override it through `STEP_KHR_PER_USD`.
pub const DEFAULT_KHR_PER_USD: f64 = 4100.0;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const DEFAULT_AUTO_CLOSE_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is not a valid URL: {reason}")]
    InvalidUrl { name: &'static str, reason: String },

    #[error("{name} must be a positive number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} has unsupported value {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Knobs for the payment confirmation flow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaymentSettings {
    pub poll_interval: Duration,
    pub auto_close_delay: Duration,
    pub khr_per_usd: f64,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            auto_close_delay: DEFAULT_AUTO_CLOSE_DELAY,
            khr_per_usd: DEFAULT_KHR_PER_USD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: Url,
    pub data_dir: PathBuf,
    pub request_timeout: Duration,
    pub cache_freshness: Duration,
    pub payment: PaymentSettings,
    pub log_format: LogFormat,
}

impl ClientConfig {
    /// Configuration with every default and the given backend URL.
    pub fn new(api_base_url: Url) -> Self {
        Self {
            api_base_url,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cache_freshness: DEFAULT_CACHE_FRESHNESS,
            payment: PaymentSettings::default(),
            log_format: LogFormat::Pretty,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let raw_url = get(API_URL_ENV).unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_base_url = Url::parse(&raw_url).map_err(|e| ConfigError::InvalidUrl {
            name: API_URL_ENV,
            reason: e.to_string(),
        })?;

        let mut config = Self::new(api_base_url);

        if let Some(dir) = get(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = get(REQUEST_TIMEOUT_ENV) {
            config.request_timeout = parse_secs(REQUEST_TIMEOUT_ENV, &raw)?;
        }
        if let Some(raw) = get(KHR_RATE_ENV) {
            config.payment.khr_per_usd = parse_positive(KHR_RATE_ENV, &raw)?;
        }
        if let Some(raw) = get(POLL_INTERVAL_ENV) {
            config.payment.poll_interval = parse_secs(POLL_INTERVAL_ENV, &raw)?;
        }
        if let Some(raw) = get(AUTO_CLOSE_ENV) {
            config.payment.auto_close_delay = parse_secs(AUTO_CLOSE_ENV, &raw)?;
        }
        if let Some(raw) = get(LOG_FORMAT_ENV) {
            config.log_format = match raw.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: LOG_FORMAT_ENV,
                        value: raw,
                    })
                }
            };
        }

        Ok(config)
    }
}

fn parse_positive(name: &'static str, raw: &str) -> Result<f64, ConfigError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or_else(|| ConfigError::InvalidNumber {
            name,
            value: raw.to_string(),
        })
}

fn parse_secs(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let secs = parse_positive(name, raw)?;
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidNumber {
        name,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_base_url.as_str(), "http://localhost:5001/api");
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.cache_freshness, Duration::from_secs(86_400));
        assert_eq!(config.payment, PaymentSettings::default());
        assert_eq!(config.payment.khr_per_usd, 4100.0);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn overrides_are_applied() {
        let config = ClientConfig::from_lookup(lookup(&[
            (API_URL_ENV, "https://api.step.example/api"),
            (DATA_DIR_ENV, "/var/step"),
            (KHR_RATE_ENV, " 4050 "),
            (POLL_INTERVAL_ENV, "5"),
            (LOG_FORMAT_ENV, "JSON"),
        ]))
        .unwrap();
        assert_eq!(config.api_base_url.host_str(), Some("api.step.example"));
        assert_eq!(config.data_dir, PathBuf::from("/var/step"));
        assert_eq!(config.payment.khr_per_usd, 4050.0);
        assert_eq!(config.payment.poll_interval, Duration::from_secs(5));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[(KHR_RATE_ENV, "   ")])).unwrap();
        assert_eq!(config.payment.khr_per_usd, DEFAULT_KHR_PER_USD);
    }

    #[test]
    fn rejects_non_positive_rate() {
        let err = ClientConfig::from_lookup(lookup(&[(KHR_RATE_ENV, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { name: KHR_RATE_ENV, .. }));
    }

    #[test]
    fn rejects_durations_out_of_range() {
        let err = ClientConfig::from_lookup(lookup(&[(POLL_INTERVAL_ENV, "1e30")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { name: POLL_INTERVAL_ENV, .. }));

        let err = ClientConfig::from_lookup(lookup(&[(REQUEST_TIMEOUT_ENV, "inf")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { name: REQUEST_TIMEOUT_ENV, .. }));
    }

    #[test]
    fn rejects_malformed_url() {
        let err = ClientConfig::from_lookup(lookup(&[(API_URL_ENV, "not a url")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn rejects_unknown_log_format() {
        let err = ClientConfig::from_lookup(lookup(&[(LOG_FORMAT_ENV, "xml")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
