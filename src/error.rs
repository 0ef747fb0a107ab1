// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Normalized error types shared by the gateway, session and payment layers.

use serde_json::Value;

/// Message shown when the login response lacks a token or user.
pub const INVALID_RESPONSE_MESSAGE: &str = "Invalid response from server";

/// Fallback when a login failure carries no usable message.
pub const LOGIN_FAILED_MESSAGE: &str = "Login failed";

/// Every gateway failure, reduced to something a screen can display.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    pub http_status: Option<u16>,
    /// The body's `error` field, when the backend sent one.
    pub server_error: Option<String>,
}

impl ApiError {
    pub fn new(message: impl Into<String>, http_status: Option<u16>) -> Self {
        Self {
            message: message.into(),
            http_status,
            server_error: None,
        }
    }

    /// The request never produced an HTTP response (DNS, TLS, timeout, offline).
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(message, None)
    }

    /// A non-2xx response. The message is the body's `error` field when
    /// present, otherwise a generic status line.
    pub fn http(status: u16, body: &str) -> Self {
        let server_error = serde_json::from_str::<Value>(body)
            .ok()
            .as_ref()
            .and_then(body_error);
        let message = server_error
            .clone()
            .unwrap_or_else(|| format!("Request failed with status code {status}"));
        Self {
            message,
            http_status: Some(status),
            server_error,
        }
    }

    /// A 2xx response whose body did not match the endpoint schema.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(message, None)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.http_status == Some(401)
    }
}

fn body_error(body: &Value) -> Option<String> {
    body.get("error")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|msg| !msg.is_empty())
        .map(str::to_string)
}

/// Login failure as presented to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct LoginError {
    pub message: String,
}

impl LoginError {
    pub fn invalid_response() -> Self {
        Self {
            message: INVALID_RESPONSE_MESSAGE.to_string(),
        }
    }
}

impl From<ApiError> for LoginError {
    fn from(e: ApiError) -> Self {
        let message = if e.message.trim().is_empty() {
            LOGIN_FAILED_MESSAGE.to_string()
        } else {
            e.message
        };
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_prefers_error_field() {
        let err = ApiError::http(401, r#"{"error":"Bad credentials"}"#);
        assert_eq!(err.message, "Bad credentials");
        assert_eq!(err.server_error.as_deref(), Some("Bad credentials"));
        assert_eq!(err.http_status, Some(401));
        assert!(err.is_unauthorized());
    }

    #[test]
    fn http_error_ignores_message_field() {
        let err = ApiError::http(422, r#"{"message":"amount required"}"#);
        assert_eq!(err.message, "Request failed with status code 422");
        assert!(err.server_error.is_none());
    }

    #[test]
    fn http_error_without_body_uses_status() {
        let err = ApiError::http(500, "<html>oops</html>");
        assert_eq!(err.message, "Request failed with status code 500");
        assert!(err.server_error.is_none());
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn login_error_keeps_server_message() {
        let err: LoginError = ApiError::http(401, r#"{"error":"Bad credentials"}"#).into();
        assert_eq!(err.to_string(), "Bad credentials");
    }

    #[test]
    fn login_error_blank_message_uses_fallback() {
        let err: LoginError = ApiError::transport("  ").into();
        assert_eq!(err.message, LOGIN_FAILED_MESSAGE);
    }
}
