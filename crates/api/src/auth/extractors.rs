//! Identity extractors
//!
//! The gate attaches the resolved [`Identity`] to the request; handlers pick it
//! up here instead of resolving cookies a second time.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use porter_auth::Identity;

use crate::error::ApiError;

/// Optional identity extractor
///
/// `None` when the request is anonymous (or the gate did not run).
///
/// # Example
///
/// ```ignore
/// async fn handler(OptionalIdentity(identity): OptionalIdentity) -> impl IntoResponse {
///     match identity {
///         Some(i) => format!("Hello, {}!", i.full_name()),
///         None => "Hello, anonymous!".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct OptionalIdentity(pub Option<Identity>);

impl OptionalIdentity {
    /// Borrow the identity, if any
    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for OptionalIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalIdentity(parts.extensions.get::<Identity>().cloned()))
    }
}

/// Authenticated identity extractor
///
/// Rejects with `401 UNAUTHENTICATED` when the gate attached no identity.
#[derive(Debug, Clone)]
pub struct AuthIdentity(pub Identity);

impl std::ops::Deref for AuthIdentity {
    type Target = Identity;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for AuthIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(AuthIdentity)
            .ok_or(ApiError::Unauthenticated)
    }
}
