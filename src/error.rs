//! Error types.
//!
//! Two layers: [`DomainError`] is the taxonomy the lifecycle service and
//! handlers speak (`InvalidArgument`, `NotFound`, `AlreadyExists`,
//! `Upstream`), and [`AppError`] bridges it to HTTP responses via Axum's
//! `IntoResponse`. Upstream failures are reported synchronously to the
//! caller; nothing is retried or queued.

use crate::payments::GatewayError;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Domain failure taxonomy.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A missing or malformed identity or required field.
    #[error("{0}")]
    InvalidArgument(String),

    /// A referenced record is absent.
    #[error("{resource} with id {id} not found")]
    NotFound {
        /// What kind of record was looked up.
        resource: &'static str,
        /// The identity that missed.
        id: String,
    },

    /// A uniqueness constraint was violated.
    #[error("{0}")]
    AlreadyExists(String),

    /// The store or gateway failed; the caller sees a synchronous error.
    #[error("upstream failure")]
    Upstream(#[source] anyhow::Error),
}

impl DomainError {
    /// Shorthand for an `InvalidArgument` failure.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Shorthand for a `NotFound` failure.
    #[must_use]
    pub fn not_found(resource: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound { resource, id: id.to_string() }
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        Self::Upstream(err.into())
    }
}

impl From<GatewayError> for DomainError {
    fn from(err: GatewayError) -> Self {
        Self::Upstream(err.into())
    }
}

/// Application error type for HTTP handlers.
///
/// Wraps domain errors with an HTTP status, a stable machine-readable code,
/// and a user-facing message. Internal sources are logged, never exposed.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: String,
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self { status, message, code, source: None }
    }

    /// Attach an internal source error (for logging).
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into(), "BAD_REQUEST".to_string())
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} with id {id} not found"),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 409 Conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message.into(), "CONFLICT".to_string())
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// The HTTP status this error maps to.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                );
            }
        }

        let body = ErrorResponse { code: self.code, message: self.message };
        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidArgument(message) => Self::bad_request(message),
            DomainError::NotFound { resource, id } => Self::not_found(resource, id),
            DomainError::AlreadyExists(message) => Self::conflict(message),
            DomainError::Upstream(source) => {
                Self::internal("An internal error occurred").with_source(source)
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::from(DomainError::from(err))
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        Self::from(DomainError::from(err))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_code_and_message() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn not_found_formats_resource_and_id() {
        let err = AppError::not_found("Application", "123");
        assert_eq!(err.to_string(), "[NOT_FOUND] Application with id 123 not found");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn domain_errors_map_to_expected_statuses() {
        let invalid: AppError = DomainError::invalid("email is required").into();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let missing: AppError = DomainError::not_found("Policy", "abc").into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let dup: AppError = DomainError::AlreadyExists("subscribed".into()).into();
        assert_eq!(dup.status(), StatusCode::CONFLICT);

        let upstream: AppError =
            DomainError::Upstream(anyhow::anyhow!("connection refused")).into();
        assert_eq!(upstream.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
