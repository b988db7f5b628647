//! API routes
//!
//! Everything except `/health` sits behind the gate, including the page
//! fallback, so an allowed request reaching a page has already been checked.

pub mod auth;
pub mod ops;
pub mod roles;

use std::path::PathBuf;

use axum::{Router, middleware};
use tower_http::services::ServeDir;

use crate::audit::audit_layer;
use crate::auth::gate;
use crate::error::ApiError;
use crate::state::AppState;

/// Options for building the router
#[derive(Debug, Clone, Default)]
pub struct RouterOptions {
    /// Enable audit logging middleware
    pub audit_logging: bool,
    /// Serve static pages from this directory behind the gate
    pub pages_dir: Option<PathBuf>,
}

/// Build the complete router
pub fn build_router(state: AppState) -> Router {
    build_router_with_options(state, RouterOptions::default())
}

/// Build the complete router with options
pub fn build_router_with_options(state: AppState, options: RouterOptions) -> Router {
    let gated = Router::new()
        // Sign-in callback and sign-out
        .nest("/auth", auth::routes())
        // Role selection, worker profile, profile summary
        .nest("/api/v1", roles::routes());

    let gated = match &options.pages_dir {
        Some(dir) => gated.fallback_service(ServeDir::new(dir)),
        None => gated.fallback(not_found),
    };

    let router = gated
        .layer(middleware::from_fn_with_state(state.clone(), gate))
        // Health (merged after the gate layer, so never gated)
        .merge(ops::routes());

    // Conditionally add audit logging middleware
    let router = if options.audit_logging {
        router.layer(middleware::from_fn(audit_layer))
    } else {
        router
    };

    router.with_state(state)
}

async fn not_found(uri: axum::http::Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
