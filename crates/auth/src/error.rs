//! Authentication error types

use thiserror::Error;

/// Result type for auth operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur during authentication and role operations
#[derive(Debug, Error)]
pub enum AuthError {
    /// No valid session for the caller
    #[error("not authenticated")]
    Unauthenticated,

    /// Malformed caller input (e.g. a role name outside the known set)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Role name is well-formed but missing from the role catalog
    #[error("role '{0}' is not in the role catalog")]
    InvalidRole(String),

    /// Operation requires a role the identity has not been granted
    #[error("role '{0}' has not been granted")]
    RoleNotGranted(String),

    // Token errors
    /// Token format is invalid
    #[error("invalid token format")]
    InvalidTokenFormat,

    /// JWT signature verification failed
    #[error("invalid token signature")]
    InvalidSignature,

    /// Token has expired
    #[error("token expired")]
    TokenExpired,

    /// Token claims are invalid
    #[error("invalid token claims: {0}")]
    InvalidClaims(String),

    /// Identity provider rejected the credential (revoked, unknown, ...)
    #[error("credential rejected: {0}")]
    CredentialRejected(String),

    /// Authorization code could not be exchanged for a session
    #[error("code exchange failed: {0}")]
    CodeExchangeFailed(String),

    /// Identity provider could not be reached or failed internally
    #[error("identity provider unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Database operation failed
    #[error("database error: {0}")]
    DatabaseError(String),
}

impl AuthError {
    /// Create an InvalidInput error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an UpstreamUnavailable error
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(message.into())
    }

    /// Create a DatabaseError
    pub fn database(message: impl Into<String>) -> Self {
        Self::DatabaseError(message.into())
    }

    /// The backing service could not answer; the caller may retry later
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable(_) | Self::DatabaseError(_))
    }

    /// The identity provider could not be reached
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable(_))
    }

    /// The credential itself is bad and should be discarded by the client
    pub fn is_credential_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidTokenFormat
                | Self::InvalidSignature
                | Self::TokenExpired
                | Self::InvalidClaims(_)
                | Self::CredentialRejected(_)
        )
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        Self::DatabaseError(err.to_string())
    }
}
