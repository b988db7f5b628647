//! Porter API
//!
//! HTTP surface for Porter: the access gate, the sign-in callback and the
//! role endpoints, built on Axum over the services in `porter-auth`.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use porter_api::{AppState, build_router};
//! use porter_auth::{HttpIdentityProvider, SqliteProfileStore};
//!
//! let provider = Arc::new(HttpIdentityProvider::new(base_url, api_key, timeout)?);
//! let store = Arc::new(SqliteProfileStore::open("porter.db").await?);
//! let app = build_router(AppState::new(provider, store));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! ```
//!
//! # Endpoints
//!
//! ## Ungated
//! - `GET /health` - Liveness
//!
//! ## Sign-in (always `303`)
//! - `GET /auth/callback` - Identity provider redirect; exchanges the code and
//!   bootstraps the identity
//! - `POST /auth/sign-out` - Clears the session cookies
//!
//! ## Roles (JSON)
//! - `POST /api/v1/roles/select` - Select `customer` or `worker`
//! - `POST /api/v1/roles/worker-profile` - Create the worker profile
//! - `GET /api/v1/profile` - Profile summary
//!
//! ## Pages
//! Everything else falls through to the optional static pages directory, behind
//! the gate. Gate redirects are `307` without the original query string.

pub mod audit;
pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

// Re-exports
pub use audit::{AuditAction, audit_layer};
pub use auth::{AuthIdentity, CookieSettings, OptionalIdentity, gate};
pub use error::{ApiError, Result};
pub use routes::{RouterOptions, build_router, build_router_with_options};
pub use state::{AppState, StateOptions};
