//! Sign-in callback and sign-out
//!
//! Both endpoints answer with `303 See Other` and never with a body: the
//! browser is always sent somewhere it can render.

use axum::{
    Router,
    extract::{RawQuery, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use porter_auth::{CallbackParams, CallbackRedirect};
use tracing::debug;

use crate::audit::AuditAction;
use crate::auth::{CODE_VERIFIER_COOKIE, OptionalIdentity, append_cookies, read_cookie};
use crate::state::AppState;

/// Auth routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/callback", get(callback))
        .route("/sign-out", post(sign_out))
}

/// Query parameters never fail the callback; unparseable input means no parameters
fn parse_params(query: Option<&str>) -> CallbackParams {
    query
        .and_then(|q| match serde_urlencoded::from_str(q) {
            Ok(params) => Some(params),
            Err(e) => {
                debug!(error = %e, "unparseable callback query");
                None
            }
        })
        .unwrap_or_default()
}

/// Identity provider redirect target
///
/// GET /auth/callback?code=&error=&error_code=&error_description=&redirect_to=
async fn callback(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let params = parse_params(query.as_deref());
    let verifier = read_cookie(&headers, CODE_VERIFIER_COOKIE);

    let outcome = state.bootstrap.handle(&params, verifier.as_deref()).await;

    match (&outcome.redirect, &outcome.session) {
        (CallbackRedirect::SignIn { message }, _) => {
            crate::audit_fail!(AuditAction::CallbackFailure, message.as_str(), "sign-in callback failed");
        }
        (_, Some(_)) => {
            crate::audit!(
                AuditAction::CallbackSuccess,
                user_id = outcome.user_id.as_deref(),
                already_bootstrapped = outcome.report.already_bootstrapped,
                provisioning_failed = outcome.report.has_failures(),
                "sign-in callback completed"
            );
        }
        (_, None) => {
            crate::audit!(AuditAction::CallbackSkipped, "callback without code");
        }
    }

    let location = outcome.redirect.location(state.paths());
    let mut response = Redirect::to(&location).into_response();

    let mut cookies = Vec::new();
    if let Some(session) = &outcome.session {
        cookies.extend(state.cookies.new_session(session));
    }
    if verifier.is_some() {
        cookies.push(state.cookies.clear(CODE_VERIFIER_COOKIE));
    }
    append_cookies(response.headers_mut(), cookies);

    response
}

/// Clear the session and return to sign-in
///
/// POST /auth/sign-out
async fn sign_out(State(state): State<AppState>, identity: OptionalIdentity) -> Response {
    if let Some(identity) = identity.identity() {
        crate::audit!(AuditAction::SignOut, user_id = %identity.id, "signed out");
    }

    let mut response = Redirect::to(&state.paths().sign_in).into_response();
    append_cookies(response.headers_mut(), state.cookies.clear_session());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params() {
        let params = parse_params(Some("code=abc123&redirect_to=%2Fdashboard%2Fjobs"));
        assert_eq!(params.code(), Some("abc123"));
        assert_eq!(params.redirect_to.as_deref(), Some("/dashboard/jobs"));

        let params = parse_params(Some("error=access_denied&error_description=User+cancelled"));
        assert_eq!(params.error_message(), Some("User cancelled"));

        assert!(parse_params(None).code().is_none());
    }

    #[test]
    fn test_parse_params_duplicate_keys() {
        // Duplicates are a parse error; treated as no parameters
        let params = parse_params(Some("code=a&code=b"));
        assert!(params.code().is_none());
    }
}
