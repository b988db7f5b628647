//! Role routes
//!
//! Role selection, worker profile provisioning and the caller's profile
//! summary. Identity comes from the gate; `AuthIdentity` answers anonymous
//! callers with 401 before any body is parsed.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use porter_auth::{ProfileSummary, RoleName, WorkerProfile, WorkerProfileDraft};
use serde::{Deserialize, Serialize};

use crate::audit::AuditAction;
use crate::auth::AuthIdentity;
use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Role routes (nested under `/api/v1`)
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/roles/select", post(select_role))
        .route("/roles/worker-profile", post(create_worker_profile))
        .route("/profile", get(profile))
}

/// Role selection request
#[derive(Debug, Deserialize)]
pub struct SelectRoleRequest {
    #[serde(default)]
    pub role: String,
}

/// Role selection response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRoleResponse {
    pub success: bool,
    pub role: RoleName,
    pub needs_worker_profile: bool,
}

/// Worker profile response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerProfileResponse {
    pub created: bool,
    pub profile: WorkerProfile,
}

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// Select the caller's active role
///
/// POST /api/v1/roles/select
async fn select_role(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
    payload: std::result::Result<Json<SelectRoleRequest>, JsonRejection>,
) -> Result<Json<SelectRoleResponse>> {
    let req = body(payload).map_err(|e| match e {
        ApiError::BadRequest(message) => ApiError::InvalidRole(message),
        other => other,
    })?;

    let selection = match state.roles.select_role(Some(&identity), &req.role).await {
        Ok(selection) => selection,
        Err(e) => {
            let reason = e.to_string();
            crate::audit_fail!(
                AuditAction::RoleSelect,
                reason.as_str(),
                user_id = %identity.id,
                requested = %req.role,
                "role selection failed"
            );
            return Err(ApiError::from_role_selection(e));
        }
    };

    crate::audit!(
        AuditAction::RoleSelect,
        user_id = %identity.id,
        role = %selection.role,
        needs_worker_profile = selection.needs_worker_profile,
        "role selected"
    );

    Ok(Json(SelectRoleResponse {
        success: true,
        role: selection.role,
        needs_worker_profile: selection.needs_worker_profile,
    }))
}

/// Create the caller's worker profile
///
/// POST /api/v1/roles/worker-profile
///
/// 201 when created, 200 when it already existed (returned unchanged).
async fn create_worker_profile(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
    payload: std::result::Result<Json<WorkerProfileDraft>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let draft = body(payload)?;

    let provisioned = state
        .roles
        .provision_worker_profile(Some(&identity), draft)
        .await
        .inspect_err(|e| {
            let reason = e.to_string();
            crate::audit_fail!(
                AuditAction::WorkerProfile,
                reason.as_str(),
                user_id = %identity.id,
                "worker profile provisioning failed"
            );
        })?;

    crate::audit!(
        AuditAction::WorkerProfile,
        user_id = %identity.id,
        created = provisioned.created,
        "worker profile provisioned"
    );

    let status = if provisioned.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(WorkerProfileResponse {
            created: provisioned.created,
            profile: provisioned.profile,
        }),
    ))
}

/// The caller's profile, grants and role-profile presence
///
/// GET /api/v1/profile
async fn profile(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
) -> Result<Json<ProfileSummary>> {
    let summary = state.roles.summary(Some(&identity)).await?;
    Ok(Json(summary))
}
