//! Role switching
//!
//! Lets an authenticated identity operate as a customer or a worker. The
//! first selection of a role grants it; later selections only flip
//! `Profile.selected_role`. Every call is safe to repeat.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{AuthError, Result};
use crate::identity::Identity;
use crate::profile::{EnsureRow, Ensured, NewProfile, Profile, WorkerProfile, WorkerProfileDraft};
use crate::roles::RoleName;
use crate::store::ProfileStore;

/// Result of a role selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSelection {
    /// Role now selected
    pub role: RoleName,
    /// Worker selected but no worker profile yet
    pub needs_worker_profile: bool,
}

/// Result of worker profile provisioning
#[derive(Debug, Clone)]
pub struct WorkerProvisioning {
    /// The stored worker profile
    pub profile: WorkerProfile,
    /// Whether this call created it
    pub created: bool,
}

/// Profile plus role state, for display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    /// Identity ID
    pub id: String,
    /// Email from the identity provider
    pub email: String,
    /// Stored profile (absent before bootstrap)
    pub profile: Option<Profile>,
    /// Granted roles
    pub granted_roles: Vec<RoleName>,
    /// Worker profile exists
    pub has_worker_profile: bool,
    /// Customer profile exists
    pub has_customer_profile: bool,
}

/// Changes and provisions roles for an identity
#[derive(Clone)]
pub struct RoleSwitchService {
    store: Arc<dyn ProfileStore>,
}

fn require(identity: Option<&Identity>) -> Result<&Identity> {
    identity.ok_or(AuthError::Unauthenticated)
}

impl RoleSwitchService {
    /// Create a service over the given store
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    /// Select `role` for the caller, granting it on first use
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` without an identity
    /// - `InvalidInput` for a name other than `worker` or `customer`
    /// - `InvalidRole` when the role is missing from the catalog
    /// - `DatabaseError` (retryable) when the store fails
    pub async fn select_role(
        &self,
        identity: Option<&Identity>,
        role: &str,
    ) -> Result<RoleSelection> {
        let identity = require(identity)?;
        let role = RoleName::parse(role).ok_or_else(|| {
            AuthError::invalid_input(format!(
                "role must be 'worker' or 'customer', got '{}'",
                role
            ))
        })?;
        let user_id = identity.id.as_str();

        if self.store.get_role_assignment(user_id, role).await?.is_none() {
            if !self.store.role_in_catalog(role).await? {
                return Err(AuthError::InvalidRole(role.to_string()));
            }
            let granted = self
                .store
                .ensure_exists(&EnsureRow::RoleAssignment {
                    user_id: user_id.to_string(),
                    role,
                })
                .await?;
            if granted == Ensured::Created {
                info!(user_id, %role, "role granted on first selection");
            }
        }

        self.store
            .set_selected_role(&NewProfile::from_identity(identity), role)
            .await?;

        let needs_worker_profile = match role {
            RoleName::Worker => match self.store.get_worker_profile(user_id).await {
                Ok(profile) => profile.is_none(),
                Err(e) => {
                    warn!(user_id, error = %e, "worker profile lookup failed");
                    true
                }
            },
            RoleName::Customer => {
                let row = EnsureRow::CustomerProfile {
                    user_id: user_id.to_string(),
                };
                if let Err(e) = self.store.ensure_exists(&row).await {
                    warn!(user_id, error = %e, "customer profile self-heal failed");
                }
                false
            }
        };

        debug!(user_id, %role, needs_worker_profile, "role selected");
        Ok(RoleSelection {
            role,
            needs_worker_profile,
        })
    }

    /// Create the caller's worker profile if it does not exist yet
    ///
    /// An existing profile is returned unchanged.
    pub async fn provision_worker_profile(
        &self,
        identity: Option<&Identity>,
        draft: WorkerProfileDraft,
    ) -> Result<WorkerProvisioning> {
        let identity = require(identity)?;
        let user_id = identity.id.as_str();

        if self
            .store
            .get_role_assignment(user_id, RoleName::Worker)
            .await?
            .is_none()
        {
            return Err(AuthError::RoleNotGranted(RoleName::Worker.to_string()));
        }

        draft.validate().map_err(AuthError::InvalidInput)?;

        let ensured = self
            .store
            .ensure_exists(&EnsureRow::WorkerProfile {
                user_id: user_id.to_string(),
                draft,
            })
            .await?;

        let profile = self
            .store
            .get_worker_profile(user_id)
            .await?
            .ok_or_else(|| AuthError::database("worker profile missing after insert"))?;

        info!(user_id, outcome = ?ensured, "worker profile provisioned");
        Ok(WorkerProvisioning {
            profile,
            created: ensured == Ensured::Created,
        })
    }

    /// Profile, grants and role-profile presence for the caller
    pub async fn summary(&self, identity: Option<&Identity>) -> Result<ProfileSummary> {
        let identity = require(identity)?;
        let user_id = identity.id.as_str();

        let profile = self.store.get_profile(user_id).await?;
        let granted_roles = self
            .store
            .list_role_assignments(user_id)
            .await?
            .into_iter()
            .map(|a| a.role)
            .collect();
        let has_worker_profile = self.store.get_worker_profile(user_id).await?.is_some();
        let has_customer_profile = self.store.get_customer_profile(user_id).await?.is_some();

        Ok(ProfileSummary {
            id: identity.id.clone(),
            email: identity.email.clone(),
            profile,
            granted_roles,
            has_worker_profile,
            has_customer_profile,
        })
    }
}
