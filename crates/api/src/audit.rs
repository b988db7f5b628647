//! Audit logging
//!
//! Records security-relevant events under the `audit` tracing target.
//!
//! # What gets logged
//!
//! - Sign-in callbacks (success, provider error, exchange failure)
//! - Role selection and worker profile provisioning
//! - Sign-out
//! - With `server.audit_logging`, a span per request carrying method, path and
//!   client IP, plus a warning for every 4xx/5xx
//!
//! # Example log entry
//!
//! ```json
//! {
//!   "timestamp": "2026-03-02T10:30:00Z",
//!   "level": "INFO",
//!   "target": "audit",
//!   "action": "role.select",
//!   "user_id": "8d0c...",
//!   "role": "worker",
//!   "status": "success"
//! }
//! ```

use axum::{body::Body, extract::Request, middleware::Next, response::Response};
use tracing::{Instrument, warn};

/// Audit event action types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    /// Code exchanged and identity bootstrapped
    CallbackSuccess,
    /// Provider error or failed exchange
    CallbackFailure,
    /// Callback without a code; plain redirect
    CallbackSkipped,
    /// Role selected
    RoleSelect,
    /// Worker profile provisioned
    WorkerProfile,
    /// Session cookies cleared
    SignOut,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CallbackSuccess => "auth.callback.success",
            Self::CallbackFailure => "auth.callback.failure",
            Self::CallbackSkipped => "auth.callback.skipped",
            Self::RoleSelect => "role.select",
            Self::WorkerProfile => "role.worker_profile",
            Self::SignOut => "auth.sign_out",
        }
    }
}

/// Log an audit event (call from handlers for business-level events)
#[macro_export]
macro_rules! audit {
    ($action:expr, $($field:tt)*) => {
        tracing::info!(
            target: "audit",
            action = $action.as_str(),
            status = "success",
            $($field)*
        )
    };
}

/// Log a failed audit event
#[macro_export]
macro_rules! audit_fail {
    ($action:expr, $reason:expr, $($field:tt)*) => {
        tracing::warn!(
            target: "audit",
            action = $action.as_str(),
            status = "failure",
            reason = $reason,
            $($field)*
        )
    };
}

fn client_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| {
            request
                .headers()
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware that adds audit context to all requests
pub async fn audit_layer(request: Request<Body>, next: Next) -> Response {
    let span = tracing::info_span!(
        target: "audit",
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        client_ip = %client_ip(&request),
    );

    async move {
        let response = next.run(request).await;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            warn!(
                target: "audit",
                status = %status.as_u16(),
                "request_completed"
            );
        }

        response
    }
    .instrument(span)
    .await
}

pub use audit;
pub use audit_fail;
