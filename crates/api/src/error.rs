//! API error types
//!
//! Provides structured error responses for the JSON endpoints. Redirecting
//! endpoints (gate, callback) never produce these.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use porter_auth::AuthError;
use serde::Serialize;
use thiserror::Error;

/// API errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// No valid session
    #[error("authentication required")]
    Unauthenticated,

    /// Unknown or unavailable role name
    #[error("invalid role: {0}")]
    InvalidRole(String),

    /// Role exists but was never granted to the caller
    #[error("role not granted: {0}")]
    RoleNotGranted(String),

    /// Malformed request body
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Well-formed request with invalid values
    #[error("validation error: {0}")]
    Validation(String),

    /// Route does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Store or identity provider failure; safe to retry
    #[error("server error: {0}")]
    Server(String),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::InvalidRole(_) => StatusCode::BAD_REQUEST,
            Self::RoleNotGranted(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::InvalidRole(_) => "INVALID_ROLE",
            Self::RoleNotGranted(_) => "ROLE_NOT_GRANTED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Server(_) => "SERVER_ERROR",
        }
    }

    /// Whether the client may retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Server(_))
    }

    /// Role selection reports malformed role names as `INVALID_ROLE`
    pub fn from_role_selection(err: AuthError) -> Self {
        match err {
            AuthError::InvalidInput(message) => Self::InvalidRole(message),
            other => other.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated
            | AuthError::InvalidTokenFormat
            | AuthError::InvalidSignature
            | AuthError::TokenExpired
            | AuthError::InvalidClaims(_)
            | AuthError::CredentialRejected(_) => Self::Unauthenticated,
            AuthError::InvalidInput(message) => Self::Validation(message),
            AuthError::InvalidRole(role) => {
                Self::InvalidRole(format!("role '{}' is not available", role))
            }
            AuthError::RoleNotGranted(role) => Self::RoleNotGranted(role),
            AuthError::CodeExchangeFailed(message) => Self::BadRequest(message),
            AuthError::UpstreamUnavailable(message) | AuthError::DatabaseError(message) => {
                Self::Server(message)
            }
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code (machine-readable)
    pub error: &'static str,
    /// Error message (human-readable)
    pub message: String,
    /// Present and true when the request may be retried
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Store internals stay in the log
        let message = match &self {
            Self::Server(_) => "Something went wrong, please try again".to_string(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(
                error_code = self.code(),
                error_message = %self,
                status = %status,
                "API error"
            );
        } else {
            tracing::warn!(
                error_code = self.code(),
                error_message = %self,
                status = %status,
                "API error"
            );
        }

        let body = ErrorResponse {
            error: self.code(),
            message,
            retryable: self.is_retryable(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
