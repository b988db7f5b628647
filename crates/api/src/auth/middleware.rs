//! Gate middleware
//!
//! Runs on every gated request:
//!
//! 1. Resolve the session cookies (refreshing when near expiry)
//! 2. Look up the selected role when the decision depends on it
//! 3. Allow, attaching the [`Identity`] to the request, or answer `307`
//! 4. Write back the resolver's cookie instruction on whatever response results
//!
//! # Setup
//!
//! ```ignore
//! use axum::middleware;
//! use porter_api::auth::gate;
//!
//! let app = Router::new()
//!     .route("/dashboard", get(page))
//!     .layer(middleware::from_fn_with_state(state.clone(), gate))
//!     .with_state(state);
//! ```

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use porter_auth::{AccessRequest, Decision, Identity, RoleState};
use tracing::{debug, warn};

use crate::auth::cookies::{append_cookies, credentials_from_headers};
use crate::state::AppState;

/// Role state for the gate; store failures gate like a missing role
pub async fn role_state(state: &AppState, identity: &Identity) -> RoleState {
    match state.store.get_profile(&identity.id).await {
        Ok(Some(profile)) => match profile.selected_role {
            Some(role) => RoleState::Selected(role),
            None => RoleState::Missing,
        },
        Ok(None) => RoleState::Missing,
        Err(e) => {
            warn!(user_id = %identity.id, error = %e, "profile lookup failed, gating as role-less");
            RoleState::Unavailable
        }
    }
}

/// Access gate
pub async fn gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();

    let creds = credentials_from_headers(request.headers());
    let session = state.resolver.resolve(creds).await;

    let role = match &session.identity {
        Some(identity) if state.policy.needs_role_state(&path) => {
            role_state(&state, identity).await
        }
        _ => RoleState::Missing,
    };

    let decision = state.policy.decide(&AccessRequest {
        authenticated: session.is_authenticated(),
        path: &path,
        role,
    });

    let mut response = match decision {
        Decision::Allow => {
            if let Some(identity) = session.identity.clone() {
                request.extensions_mut().insert(identity);
            }
            next.run(request).await
        }
        Decision::Redirect { to, reason } => {
            debug!(
                path = %path,
                to = %to,
                reason = reason.as_str(),
                user_id = session.identity.as_ref().map(|i| i.id.as_str()),
                "gate redirect"
            );
            Redirect::temporary(&to).into_response()
        }
    };

    append_cookies(
        response.headers_mut(),
        state.cookies.for_action(&session.credentials),
    );
    response
}
