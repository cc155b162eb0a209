//! Error types for the task API client.
//!
//! # Design
//! `ApiError` is the internal, transport-level failure: it keeps the status
//! code and the server's `message` field (when the body has one) so the
//! layer that catches it can apply the extract-or-default rule. Callers of
//! `Session` and `TaskService` only ever see `AuthError` or `ResourceError`,
//! each carrying a single human-readable message.

use serde::Deserialize;
use thiserror::Error;

use crate::http::HttpResponse;

/// Message surfaced when a refresh fails without a server-supplied reason.
pub const SESSION_EXPIRED: &str = "Session expired";

/// Failures below the session/resource layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Http { status: u16, message: Option<String> },

    /// The request was rejected with 401 and the token refresh failed.
    #[error("session expired: {}", .0.as_deref().unwrap_or(SESSION_EXPIRED))]
    SessionExpired(Option<String>),

    /// The request never produced a response.
    #[error("transport failed: {0}")]
    Transport(String),

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The persisted token could not be read or written.
    #[error("token storage failed: {0}")]
    Storage(String),
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ApiError {
    /// Build an `Http` error from a non-2xx response, keeping the body's
    /// `message` field when it is JSON and has one.
    pub fn from_response(response: &HttpResponse) -> Self {
        let message = serde_json::from_str::<ErrorBody>(&response.body)
            .ok()
            .and_then(|body| body.message)
            .filter(|message| !message.is_empty());
        ApiError::Http {
            status: response.status,
            message,
        }
    }

    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Http { message, .. } => message.as_deref(),
            ApiError::SessionExpired(message) => message.as_deref(),
            _ => None,
        }
    }

    /// The server-supplied message, or `default` when there is none. An
    /// expired session without a reason surfaces as [`SESSION_EXPIRED`].
    pub fn message_or(&self, default: &str) -> String {
        match self {
            ApiError::SessionExpired(None) => SESSION_EXPIRED.to_string(),
            other => other.server_message().unwrap_or(default).to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Http { status: 401, .. })
    }
}

/// Fail unless the response carries a 2xx status.
pub(crate) fn check_success(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::from_response(response))
}

/// Login, registration, refresh or logout failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct AuthError(String);

impl AuthError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// A task operation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ResourceError(String);

impl ResourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Invalid client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name} must be a whole number of seconds, got {value:?}")]
    InvalidTimeout { name: &'static str, value: String },
}
